// Core module: channel naming, wire records and framing (NO I/O dependencies)
pub mod types;
pub mod protocol;
pub mod framing;

pub use types::*;
pub use protocol::*;
pub use framing::*;
