// Transport module: named byte-stream channels behind one abstraction
pub mod error;
pub mod traits;
pub mod fifo;
pub mod memory;

pub use error::*;
pub use traits::*;
pub use fifo::*;
pub use memory::*;
