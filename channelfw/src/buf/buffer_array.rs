//! Operations over an ordered array of buffers.
//!
//! A slot holding `None` ends the meaningful part of the array for every
//! operation that goes through [`leading_buffers`]: lengths, conversions to
//! bytes and strings, integer parsing. Slots after the first `None` are never
//! looked at by those. Capacity, flip, clear, release and the scatter writes
//! visit every occupied slot instead.

use super::{BufferError, ByteBuffer, NumberFormatError};

/// An ordered sequence of buffers, not necessarily all populated.
pub type BufferArray = Vec<Option<ByteBuffer>>;

/// Buffers up to, not including, the first empty slot.
#[inline]
pub fn leading_buffers(array: &[Option<ByteBuffer>]) -> impl Iterator<Item = &ByteBuffer> {
    array.iter().map_while(Option::as_ref)
}

/// Mutable form of [`leading_buffers`].
#[inline]
pub fn leading_buffers_mut(
    array: &mut [Option<ByteBuffer>],
) -> impl Iterator<Item = &mut ByteBuffer> {
    array.iter_mut().map_while(Option::as_mut)
}

/// Bytes in `[0, limit)` of `buf`. `None` when that window is empty.
pub fn buffer_to_bytes(buf: &ByteBuffer) -> Option<Vec<u8>> {
    let filled = buf.filled();
    if filled.is_empty() {
        return None;
    }
    Some(filled.to_vec())
}

/// Bytes in `[position, limit)` of `buf`. `None` when that window is empty
/// or does not fit inside the buffer.
pub fn buffer_range_to_bytes(buf: &ByteBuffer, position: usize, limit: usize) -> Option<Vec<u8>> {
    if limit <= position {
        return None;
    }
    buf.window(position, limit).map(<[u8]>::to_vec)
}

/// Concatenation of `[0, limit)` of every leading buffer. `None` when the
/// total is zero.
pub fn array_to_bytes(array: &[Option<ByteBuffer>]) -> Option<Vec<u8>> {
    let size: usize = leading_buffers(array).map(ByteBuffer::limit).sum();
    if size == 0 {
        return None;
    }
    let mut output = Vec::with_capacity(size);
    for buf in leading_buffers(array) {
        output.extend_from_slice(buf.filled());
    }
    Some(output)
}

/// [`buffer_to_bytes`] decoded as UTF-8. Invalid sequences are replaced.
pub fn buffer_to_string(buf: &ByteBuffer) -> Option<String> {
    buffer_to_bytes(buf).map(decode)
}

/// [`array_to_bytes`] decoded as UTF-8. Invalid sequences are replaced.
pub fn array_to_string(array: &[Option<ByteBuffer>]) -> Option<String> {
    array_to_bytes(array).map(decode)
}

/// Like [`array_to_string`] but an array without content yields an empty
/// string instead of `None`.
pub fn array_to_string_builder(array: &[Option<ByteBuffer>]) -> String {
    array_to_string(array).unwrap_or_default()
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Parse a decimal `i32`.
///
/// ASCII spaces and tabs around the number are ignored. Content that is
/// empty after trimming yields `-1`. A single leading `-` is accepted.
/// Whitespace inside the content ends the number and makes whatever follows
/// an error.
pub fn bytes_to_int(bytes: &[u8]) -> Result<i32, NumberFormatError> {
    let content = trim(bytes);
    if content.is_empty() {
        return Ok(-1);
    }

    let negative = content[0] == b'-';
    let digits_start = usize::from(negative);
    let mut value: i32 = 0;
    let mut index = digits_start;
    while index < content.len() {
        let byte = content[index];
        match byte {
            b'0'..=b'9' => {
                let digit = i32::from(byte - b'0');
                value = value
                    .checked_mul(10)
                    .and_then(|v| {
                        if negative {
                            v.checked_sub(digit)
                        } else {
                            v.checked_add(digit)
                        }
                    })
                    .ok_or(NumberFormatError::Overflow)?;
            }
            b' ' | b'\t' => break,
            _ => return Err(NumberFormatError::InvalidDigit { byte, index }),
        }
        index += 1;
    }

    if index == digits_start {
        // a dash with no digits behind it
        return Err(NumberFormatError::InvalidDigit {
            byte: content[0],
            index: 0,
        });
    }
    if index < content.len() {
        return Err(NumberFormatError::TrailingContent {
            remaining: content.len() - index,
        });
    }
    Ok(value)
}

/// [`bytes_to_int`] over [`buffer_to_bytes`]. No content yields `-1`.
pub fn buffer_to_int(buf: &ByteBuffer) -> Result<i32, NumberFormatError> {
    match buffer_to_bytes(buf) {
        Some(bytes) => bytes_to_int(&bytes),
        None => Ok(-1),
    }
}

/// [`bytes_to_int`] over [`array_to_bytes`]. No content yields `-1`.
pub fn array_to_int(array: &[Option<ByteBuffer>]) -> Result<i32, NumberFormatError> {
    match array_to_bytes(array) {
        Some(bytes) => bytes_to_int(&bytes),
        None => Ok(-1),
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let is_blank = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_blank(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_blank(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Sum of `remaining()` over the leading buffers.
pub fn length_of(array: &[Option<ByteBuffer>]) -> usize {
    leading_buffers(array).map(ByteBuffer::remaining).sum()
}

/// Sum of `capacity()` over every occupied slot, including those after an
/// empty one.
pub fn total_capacity(array: &[Option<ByteBuffer>]) -> usize {
    array.iter().flatten().map(ByteBuffer::capacity).sum()
}

/// Release every buffer and empty its slot.
pub fn release_buffer_array(array: &mut [Option<ByteBuffer>]) {
    for slot in array.iter_mut() {
        if let Some(buf) = slot.take() {
            buf.release();
        }
    }
}

/// Flip every occupied slot.
pub fn flip_buffer_array(array: &mut [Option<ByteBuffer>]) {
    for buf in array.iter_mut().flatten() {
        buf.flip();
    }
}

/// Clear every occupied slot.
pub fn clear_buffer_array(array: &mut [Option<ByteBuffer>]) {
    for buf in array.iter_mut().flatten() {
        buf.clear();
    }
}

/// Scatter `value` over the occupied slots in order.
///
/// Each buffer takes as much as its remaining space allows. A buffer the
/// value overflows is flipped; the buffer receiving the tail is flipped only
/// when `flip_last` is set. Buffers with no space left are skipped.
///
/// The write is all-or-nothing: if the aggregate capacity, or the aggregate
/// remaining space, is smaller than `value`, no buffer is touched.
pub fn put_byte_array_value(
    array: &mut [Option<ByteBuffer>],
    value: &[u8],
    flip_last: bool,
) -> Result<(), BufferError> {
    let needed = value.len();
    let capacity = total_capacity(array);
    if capacity < needed {
        return Err(BufferError::InsufficientCapacity {
            needed,
            available: capacity,
        });
    }
    let space: usize = array.iter().flatten().map(ByteBuffer::remaining).sum();
    if space < needed {
        return Err(BufferError::InsufficientCapacity {
            needed,
            available: space,
        });
    }

    let mut rest = value;
    for buf in array.iter_mut().flatten() {
        if rest.is_empty() {
            break;
        }
        let avail = buf.remaining();
        if avail == 0 {
            continue;
        }
        if avail >= rest.len() {
            buf.put_slice(rest);
            if flip_last {
                buf.flip();
            }
            rest = &[];
        } else {
            let (head, tail) = rest.split_at(avail);
            buf.put_slice(head);
            buf.flip();
            rest = tail;
        }
    }
    Ok(())
}

/// [`put_byte_array_value`] with the UTF-8 bytes of `value`. `None` writes
/// nothing.
pub fn put_string_value(
    array: &mut [Option<ByteBuffer>],
    value: Option<&str>,
    flip_last: bool,
) -> Result<(), BufferError> {
    match value {
        Some(value) => put_byte_array_value(array, value.as_bytes(), flip_last),
        None => Ok(()),
    }
}

/// Concatenate two arrays, keeping order. If either side is `None` the other
/// is returned as is.
pub fn expand_buffer_array(
    old: Option<BufferArray>,
    new: Option<BufferArray>,
) -> Option<BufferArray> {
    match (old, new) {
        (None, None) => None,
        (Some(old), None) => Some(old),
        (None, Some(new)) => Some(new),
        (Some(mut old), Some(new)) => {
            old.extend(new);
            Some(old)
        }
    }
}

/// Append one buffer. A `None` buffer returns `old` unchanged.
pub fn expand_buffer_array_with(
    old: Option<BufferArray>,
    buf: Option<ByteBuffer>,
) -> Option<BufferArray> {
    match (old, buf) {
        (old, None) => old,
        (None, Some(buf)) => Some(vec![Some(buf)]),
        (Some(mut old), Some(buf)) => {
            old.push(Some(buf));
            Some(old)
        }
    }
}

/// Move positions forward by `n` bytes in total, filling leading buffers in
/// order. Used after a vectored transfer over their remaining windows.
pub(crate) fn advance_leading(array: &mut [Option<ByteBuffer>], mut n: usize) {
    for buf in leading_buffers_mut(array) {
        if n == 0 {
            break;
        }
        let step = n.min(buf.remaining());
        buf.advance_position(step);
        n -= step;
    }
    debug_assert_eq!(n, 0, "advanced past the leading buffers");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(data: &[u8]) -> Option<ByteBuffer> {
        Some(ByteBuffer::wrap(data.to_vec()))
    }

    #[test]
    fn no_content_is_none() {
        assert_eq!(array_to_bytes(&[]), None);
        assert_eq!(array_to_bytes(&[None, filled(b"abc")]), None);
        assert_eq!(array_to_bytes(&[Some(ByteBuffer::allocate(0))]), None);
        assert_eq!(buffer_to_bytes(&ByteBuffer::wrap(Vec::new())), None);
        assert_eq!(buffer_range_to_bytes(&ByteBuffer::allocate(4), 2, 2), None);
        assert_eq!(buffer_range_to_bytes(&ByteBuffer::allocate(4), 2, 9), None);
    }

    #[test]
    fn conversions_keep_cursors() {
        let mut buf = ByteBuffer::allocate(8);
        buf.put_slice(b"abcdef");
        buf.flip();
        buf.set_position(2);

        assert_eq!(buffer_to_bytes(&buf).unwrap(), b"abcdef");
        assert_eq!(buffer_range_to_bytes(&buf, 1, 4).unwrap(), b"bcd");
        assert_eq!(buf.position(), 2);
        assert_eq!(buf.limit(), 6);
    }

    #[test]
    fn array_conversion_stops_at_empty_slot() {
        let array = vec![filled(b"ab"), filled(b"cd"), None, filled(b"ef")];
        assert_eq!(array_to_bytes(&array).unwrap(), b"abcd");
        assert_eq!(array_to_string(&array).unwrap(), "abcd");
    }

    #[test]
    fn string_conventions() {
        assert_eq!(array_to_string(&[None]), None);
        assert_eq!(array_to_string_builder(&[None]), "");
        assert_eq!(buffer_to_string(&ByteBuffer::wrap(b"hi".to_vec())).unwrap(), "hi");
    }

    #[test]
    fn parse_int() {
        assert_eq!(bytes_to_int(b"  42  "), Ok(42));
        assert_eq!(bytes_to_int(b"\t42"), Ok(42));
        assert_eq!(bytes_to_int(b"-7"), Ok(-7));
        assert_eq!(bytes_to_int(b""), Ok(-1));
        assert_eq!(bytes_to_int(b" \t "), Ok(-1));
        assert_eq!(bytes_to_int(b"-2147483648"), Ok(i32::MIN));
        assert_eq!(bytes_to_int(b"2147483648"), Err(NumberFormatError::Overflow));
        assert_eq!(
            bytes_to_int(b"12a"),
            Err(NumberFormatError::InvalidDigit { byte: b'a', index: 2 })
        );
        assert_eq!(
            bytes_to_int(b"x12"),
            Err(NumberFormatError::InvalidDigit { byte: b'x', index: 0 })
        );
        assert_eq!(
            bytes_to_int(b"1-2"),
            Err(NumberFormatError::InvalidDigit { byte: b'-', index: 1 })
        );
        assert_eq!(
            bytes_to_int(b"12 34"),
            Err(NumberFormatError::TrailingContent { remaining: 3 })
        );
        assert!(matches!(
            bytes_to_int(b"-"),
            Err(NumberFormatError::InvalidDigit { byte: b'-', .. })
        ));
    }

    #[test]
    fn parse_int_from_buffers() {
        assert_eq!(buffer_to_int(&ByteBuffer::wrap(b" 8080 ".to_vec())), Ok(8080));
        assert_eq!(buffer_to_int(&ByteBuffer::wrap(Vec::new())), Ok(-1));
        assert_eq!(array_to_int(&[filled(b"1"), filled(b"23"), None]), Ok(123));
        assert_eq!(array_to_int(&[None, filled(b"9")]), Ok(-1));
    }

    #[test]
    fn length_and_capacity_differ_on_empty_slot() {
        let mut first = ByteBuffer::allocate(10);
        first.set_position(4);
        let array = vec![Some(first), None, Some(ByteBuffer::allocate(7))];

        assert_eq!(length_of(&array), 6);
        assert_eq!(total_capacity(&array), 17);
    }

    #[test]
    fn bulk_ops_skip_empty_slots() {
        let mut array = vec![filled(b"abc"), None, filled(b"de")];
        for buf in array.iter_mut().flatten() {
            buf.set_position(1);
        }

        flip_buffer_array(&mut array);
        assert_eq!(array[0].as_ref().unwrap().limit(), 1);
        assert_eq!(array[2].as_ref().unwrap().limit(), 1);

        clear_buffer_array(&mut array);
        assert_eq!(array[0].as_ref().unwrap().limit(), 3);
        assert_eq!(array[2].as_ref().unwrap().limit(), 2);

        release_buffer_array(&mut array);
        assert!(array.iter().all(Option::is_none));
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn scatter_write() {
        let mut array = vec![
            Some(ByteBuffer::allocate(4)),
            Some(ByteBuffer::allocate(4)),
        ];
        put_byte_array_value(&mut array, b"abcdefg", true).unwrap();

        let a = array[0].as_ref().unwrap();
        let b = array[1].as_ref().unwrap();
        assert_eq!(a.as_slice(), b"abcd");
        assert_eq!(a.position(), 0);
        assert_eq!(b.as_slice(), b"efg");
        assert_eq!(b.position(), 0);
    }

    #[test]
    fn scatter_write_without_flip_last() {
        let mut array = vec![
            Some(ByteBuffer::allocate(2)),
            None,
            Some(ByteBuffer::allocate(4)),
        ];
        put_string_value(&mut array, Some("xyz"), false).unwrap();

        assert_eq!(array[0].as_ref().unwrap().as_slice(), b"xy");
        let last = array[2].as_ref().unwrap();
        assert_eq!(last.position(), 1);
        assert_eq!(&last.filled()[..1], b"z");

        put_string_value(&mut array, None, true).unwrap();
        assert_eq!(array[2].as_ref().unwrap().position(), 1);
    }

    #[test]
    fn scatter_write_is_all_or_nothing() {
        let mut array = vec![Some(ByteBuffer::allocate(2)), Some(ByteBuffer::allocate(2))];
        let before = array.clone();
        assert_eq!(
            put_byte_array_value(&mut array, b"12345", true),
            Err(BufferError::InsufficientCapacity {
                needed: 5,
                available: 4
            })
        );
        assert_eq!(array, before);

        // enough capacity, not enough space left
        array[0].as_mut().unwrap().set_position(2);
        let before = array.clone();
        assert_eq!(
            put_byte_array_value(&mut array, b"123", true),
            Err(BufferError::InsufficientCapacity {
                needed: 3,
                available: 2
            })
        );
        assert_eq!(array, before);
    }

    #[test]
    fn round_trip_through_cleared_array() {
        let source = vec![filled(b"hello "), filled(b"world")];
        let bytes = array_to_bytes(&source).unwrap();

        let mut target = vec![Some(ByteBuffer::allocate(6)), Some(ByteBuffer::allocate(5))];
        clear_buffer_array(&mut target);
        put_byte_array_value(&mut target, &bytes, true).unwrap();
        assert_eq!(array_to_bytes(&target).unwrap(), bytes);
    }

    #[test]
    fn expand() {
        assert_eq!(expand_buffer_array(None, None), None);

        let one = vec![filled(b"1")];
        assert_eq!(expand_buffer_array(Some(one.clone()), None), Some(one.clone()));
        assert_eq!(expand_buffer_array(None, Some(one.clone())), Some(one.clone()));

        let joined = expand_buffer_array(Some(one.clone()), Some(vec![None, filled(b"2")])).unwrap();
        assert_eq!(joined.len(), 3);
        assert!(joined[1].is_none());
        assert_eq!(joined[2].as_ref().unwrap().as_slice(), b"2");

        assert_eq!(expand_buffer_array_with(Some(one.clone()), None), Some(one.clone()));
        assert_eq!(expand_buffer_array_with(None, None), None);
        let grown = expand_buffer_array_with(Some(one), Some(ByteBuffer::allocate(1))).unwrap();
        assert_eq!(grown.len(), 2);
    }

    #[test]
    fn advance_spreads_over_leading() {
        let mut array: BufferArray = vec![
            Some(ByteBuffer::allocate(2)),
            Some(ByteBuffer::allocate(3)),
            None,
            Some(ByteBuffer::allocate(4)),
        ];
        advance_leading(&mut array, 4);
        assert_eq!(array[0].as_ref().unwrap().position(), 2);
        assert_eq!(array[1].as_ref().unwrap().position(), 2);
        assert_eq!(array[3].as_ref().unwrap().position(), 0);
    }
}
