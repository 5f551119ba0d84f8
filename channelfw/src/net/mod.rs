//! Connections and how they are established.

mod acceptor;
mod connect;
mod connection;
mod secure;
mod vc;

pub use acceptor::Acceptor;
pub use connect::{connect_callback, ConnectCompletedCallback, ConnectRequestContext};
pub(crate) use connection::{ConnectionCore, PendingGuard, RequestState};
pub use connection::ConnectionContext;
pub use secure::SecureSessionContext;
pub use vc::VirtualConnection;
