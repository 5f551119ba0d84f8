//! Channelfw is the buffered I/O layer of a transport channel stack.
//!
//! Protocol layers above it (TLS, HTTP, ...) never touch sockets directly.
//! They obtain a [`ConnectionContext`], hand buffer arrays to its read and
//! write sides and issue requests. A request either completes inline on the
//! calling thread or is parked in a readiness driver and completed later by
//! a callback on the worker pool; the caller learns which through
//! [`IoOutcome`]. Timeouts follow the legacy integer vocabulary, including
//! the two values that cancel the outstanding request instead of waiting.

#![warn(missing_docs, unreachable_pub)]

#[macro_use]
mod macros;

mod builder;
mod channel;
mod driver;
mod utils;

pub mod buf;
pub mod io;
pub mod net;
pub mod worker;

pub use builder::{ChannelBuilder, ChannelConfig};
pub use channel::Channel;
pub use io::{
    read_callback, write_callback, IoOutcome, ReadCompletedCallback, ReadRequestContext,
    RequestContext, Timeout, WriteAmount, WriteCompletedCallback, WriteRequestContext,
};
pub use net::{
    connect_callback, Acceptor, ConnectCompletedCallback, ConnectRequestContext,
    ConnectionContext, VirtualConnection,
};
