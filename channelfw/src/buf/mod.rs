//! Buffers and buffer arrays.
//!
//! A [`ByteBuffer`] is a fixed-size byte region with a position and a limit.
//! Request contexts read into and write out of arrays of them, so a single
//! logical transfer may span several discontiguous regions. The free
//! functions in this module operate on such arrays.

mod byte_buffer;
pub use byte_buffer::ByteBuffer;

mod buffer_array;
pub(crate) use buffer_array::advance_leading;
pub use buffer_array::{
    array_to_bytes, array_to_int, array_to_string, array_to_string_builder, buffer_range_to_bytes,
    buffer_to_bytes, buffer_to_int, buffer_to_string, bytes_to_int, clear_buffer_array,
    expand_buffer_array, expand_buffer_array_with, flip_buffer_array, leading_buffers,
    leading_buffers_mut, length_of, put_byte_array_value, put_string_value, release_buffer_array,
    total_capacity, BufferArray,
};

mod error;
pub use error::{BufferError, NumberFormatError};
