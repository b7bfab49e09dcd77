// broker: session/group directories, routing and the dispatch loop of the chat server
pub mod config;
pub mod error;
pub mod session;
pub mod group;
pub mod router;
pub mod dispatcher;

pub use config::*;
pub use error::*;
pub use session::*;
pub use group::*;
pub use router::*;
pub use dispatcher::*;

// Re-export protocol and transport so embedders need a single dependency
pub use im_core as protocol;
pub use im_transport as transport;
