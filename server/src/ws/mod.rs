pub mod actor;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod registry;

pub use connection::{ConnectionHandle, SendError};
pub use registry::ConnectionRegistry;
