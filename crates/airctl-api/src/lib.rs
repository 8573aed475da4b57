// airctl-api: MQTT transport with auto-reconnect, per-channel fan-out and offline queueing.

pub mod connection;
pub mod error;
pub mod link;
pub mod queue;
pub mod registry;
pub mod transport;

pub use connection::{ConnectionState, TransportConnection};
pub use error::Error;
pub use link::{EventSource, Link, LinkOp, MemoryLink};
pub use queue::{PublishQueue, QueuedMessage};
pub use registry::{HandlerError, HandlerId, MessageHandler, TopicRegistry};
pub use transport::{TlsMode, TransportConfig};
