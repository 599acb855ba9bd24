//! Length-prefixed JSON framing shared by both ends of a replica connection:
//! a 4-byte big-endian length prefix followed by that many bytes of
//! `serde_json`-encoded payload. Simple and self-describing, matching the
//! "no chunked transfer decoding beyond what streaming bodies require"
//! posture the frontend's own HTTP parser takes (§6) — this transport has
//! no streaming requirement at all, so a whole-message frame is enough.

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

pub const FRAME_HEADER_LEN: usize = 4;

pub fn encode<T: Serialize>(value: &T, out: &mut BytesMut) -> serde_json::Result<()> {
    let body = serde_json::to_vec(value)?;
    out.put_u32(body.len() as u32);
    out.put_slice(&body);
    Ok(())
}

/// Pops one complete frame's payload off the front of `buf`, if one has
/// fully arrived. Leaves `buf` untouched (and returns `Ok(None)`) when only
/// a partial frame is buffered so far.
pub fn try_decode<T: DeserializeOwned>(buf: &mut BytesMut) -> serde_json::Result<Option<T>> {
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(None);
    }
    let len = u32::from_be_bytes(buf[..FRAME_HEADER_LEN].try_into().unwrap()) as usize;
    if buf.len() < FRAME_HEADER_LEN + len {
        return Ok(None);
    }
    buf.advance(FRAME_HEADER_LEN);
    let body = buf.split_to(len);
    let value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let mut buf = BytesMut::new();
        encode(&("hello", 42u32), &mut buf).unwrap();
        let (s, n): (String, u32) = try_decode(&mut buf).unwrap().unwrap();
        assert_eq!(s, "hello");
        assert_eq!(n, 42);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_yields_none() {
        let mut buf = BytesMut::new();
        encode(&"hello", &mut buf).unwrap();
        let mut partial = buf.split_to(buf.len() - 1);
        assert!(try_decode::<String>(&mut partial).unwrap().is_none());
    }
}
