//! # Wire Framing
//!
//! Every message exchanged with the remote endpoint travels as one record:
//!
//! ```text
//! +-----------------------+------+-----------------+
//! | length (ASCII digits) | 0x00 | payload (bytes) |
//! +-----------------------+------+-----------------+
//! ```
//!
//! The length is the decimal text of the payload size, there is no trailing terminator.
//! A stream may hold several concatenated records, the client sends exactly one and reads
//! exactly one.
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Byte separating the length prefix from the payload.
pub const SEPARATOR: u8 = 0x00;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed frame length prefix '{0}'")]
    Malformed(String),
    #[error("Truncated frame: expected {expected} payload bytes, got {available}")]
    Truncated { expected: usize, available: usize },
    #[error("Truncated frame: no separator after the length prefix")]
    MissingSeparator,
}

/// Frames `payload` as a single record.
pub fn encode_record(payload: &[u8]) -> Bytes {
    let length = payload.len().to_string();

    let mut record = BytesMut::with_capacity(length.len() + 1 + payload.len());
    record.put_slice(length.as_bytes());
    record.put_u8(SEPARATOR);
    record.put_slice(payload);
    record.freeze()
}

/// Reads one record from the front of `src` and returns its payload.
///
/// On success `src` is advanced past the record, leaving any following records in place.
/// On failure `src` is left untouched.
pub fn decode_record(src: &mut Bytes) -> Result<Bytes, FrameError> {
    let Some(separator) = src.iter().position(|b| *b == SEPARATOR) else {
        // Only digits so far means the prefix was cut short.
        if src.iter().all(u8::is_ascii_digit) {
            return Err(FrameError::MissingSeparator);
        }
        return Err(malformed(src));
    };

    let prefix = &src[..separator];
    if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
        return Err(malformed(prefix));
    }

    let expected: usize = std::str::from_utf8(prefix)
        .ok()
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| malformed(prefix))?;

    let available = src.len() - separator - 1;
    if available < expected {
        return Err(FrameError::Truncated {
            expected,
            available,
        });
    }

    src.advance(separator + 1);
    Ok(src.split_to(expected))
}

fn malformed(prefix: &[u8]) -> FrameError {
    FrameError::Malformed(String::from_utf8_lossy(prefix).into_owned())
}
