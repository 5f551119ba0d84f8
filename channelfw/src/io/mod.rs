//! Read and write request contexts.
//!
//! Every request either completes inline on the calling thread or is parked
//! in the driver and completed later on the worker pool. Synchronous calls
//! hide the difference by blocking; asynchronous calls report it through
//! [`IoOutcome`].

mod timeout;
pub(crate) use timeout::timed_out;
pub use timeout::{Timeout, ABORT_TIMEOUT, IMMED_TIMEOUT, NO_TIMEOUT, USE_CHANNEL_TIMEOUT};

mod outcome;
pub use outcome::IoOutcome;

mod request;
pub use request::RequestContext;

mod read;
pub use read::{read_callback, JitBuffer, ReadCompletedCallback, ReadRequestContext};

mod write;
pub use write::{
    write_callback, WriteAmount, WriteCompletedCallback, WriteRequestContext, WRITE_ALL_DATA,
};
