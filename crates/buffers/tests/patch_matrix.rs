//! Reader/Writer patching matrix: the insert/remove/overwrite sequences the
//! incremental re-encoder performs on a shared buffer.

use ion_tree_buffers::{BufferError, Reader, Writer};

#[test]
fn grow_header_in_place_keeps_payload() {
    // list header 0xb2 followed by two 1-byte ints, then a trailing value
    let mut w = Writer::from_vec(vec![0xb2, 0x20, 0x20, 0x11]);
    // header grows from 1 to 2 bytes: open one byte at the header start
    w.set_position(0).unwrap();
    w.insert(1).unwrap();
    w.buf(&[0xbe, 0x82]).unwrap();
    assert_eq!(w.position(), 2);
    assert_eq!(w.uint8, [0xbe, 0x82, 0x20, 0x20, 0x11]);
}

#[test]
fn shrink_header_in_place_keeps_payload() {
    let mut w = Writer::from_vec(vec![0xbe, 0x82, 0x20, 0x20]);
    w.set_position(0).unwrap();
    w.remove(1).unwrap();
    w.buf(&[0xb2]).unwrap();
    assert_eq!(w.into_inner(), vec![0xb2, 0x20, 0x20]);
}

#[test]
fn sequential_inserts_thread_offsets() {
    let mut w = Writer::default();
    for chunk in [&[0x21u8, 0x01][..], &[0x21, 0x02], &[0x21, 0x03]] {
        let at = w.uint8.len();
        w.set_position(at).unwrap();
        w.insert_buf(chunk).unwrap();
    }
    let data = w.into_inner();
    let mut r = Reader::new(&data);
    let mut seen = Vec::new();
    while r.has_remaining() {
        assert_eq!(r.try_u8(), Ok(0x21));
        seen.push(r.try_uint(1).unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn out_of_range_cursor_is_reported() {
    let mut w = Writer::from_vec(vec![1, 2, 3]);
    assert_eq!(
        w.set_position(4),
        Err(BufferError::OutOfBounds { position: 4, len: 3 })
    );
    assert_eq!(w.position(), 0);
}

#[test]
fn reader_region_matrix() {
    let data = [0x00, 0x81, 0x82, 0x83, 0x00];
    for (start, end, expected) in [(1usize, 4usize, 3usize), (0, 5, 5), (2, 2, 0), (4, 10, 1)] {
        let mut r = Reader::from_slice(&data, start, end);
        let mut n = 0;
        while r.has_remaining() {
            r.try_u8().unwrap();
            n += 1;
        }
        assert_eq!(n, expected, "region {start}..{end}");
        assert_eq!(r.try_u8(), Err(BufferError::EndOfBuffer));
    }
}

#[test]
fn error_display_matrix() {
    assert_eq!(BufferError::EndOfBuffer.to_string(), "end of buffer");
    assert_eq!(
        BufferError::OutOfBounds { position: 9, len: 3 }.to_string(),
        "offset 9 out of bounds for buffer of 3 bytes"
    );
}
