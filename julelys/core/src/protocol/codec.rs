//! Request Codec
//!
//! Requests are bare JSON objects with no length prefix. Clients write one
//! object and then wait for the reply without closing their write side, so
//! the decoder has to recognise a complete object on its own: it parses what
//! has arrived and treats "input ended early" as "need more data".
//!
//! # Security
//!
//! - The request size limit is checked on every push, before parsing
//! - Bytes after the first complete object are ignored

use serde::Serialize;
use serde_json::{Deserializer, Value};
use thiserror::Error;

use super::Request;

/// Default request size limit (64 KiB)
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Errors decoding a request or encoding a response
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The request grew past the size limit
    #[error("request too large: {size} bytes (max: {limit})")]
    TooLarge {
        /// Bytes received so far
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// The peer closed before sending anything
    #[error("empty request")]
    Empty,

    /// The peer closed mid-object
    #[error("connection closed before the request was complete")]
    Incomplete,

    /// The bytes are not a valid request
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),
}

/// Accumulates bytes until they hold one complete request
#[derive(Debug)]
pub struct RequestDecoder {
    buffer: Vec<u8>,
    limit: usize,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_SIZE)
    }
}

impl RequestDecoder {
    /// Decoder rejecting requests larger than `limit` bytes
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit.min(4096)),
            limit,
        }
    }

    /// Bytes buffered so far
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    /// Append received bytes
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TooLarge`] once the buffer exceeds the limit.
    pub fn push(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let size = self.buffer.len() + data.len();
        if size > self.limit {
            return Err(ProtocolError::TooLarge {
                size,
                limit: self.limit,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Try to decode the buffered request
    ///
    /// Returns:
    /// - `Ok(Some(request))` once a full object has arrived
    /// - `Ok(None)` if more data is needed
    /// - `Err(_)` if the bytes can never form a valid request
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] for invalid JSON or a JSON value
    /// that is not a request.
    pub fn decode(&self) -> Result<Option<Request>, ProtocolError> {
        let mut stream = Deserializer::from_slice(&self.buffer).into_iter::<Value>();
        match stream.next() {
            None => Ok(None),
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(value)) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Decode after the peer closed its write side
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Empty`] if nothing arrived,
    /// [`ProtocolError::Incomplete`] for a truncated object, or
    /// [`ProtocolError::Malformed`].
    pub fn finish(&self) -> Result<Request, ProtocolError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::Empty);
        }
        self.decode()?.ok_or(ProtocolError::Incomplete)
    }
}

/// Serialize a response body
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
pub fn encode_response<T: Serialize>(response: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CommandKind;

    #[test]
    fn test_decode_complete_request() {
        let mut decoder = RequestDecoder::default();
        decoder.push(br#"{"cmd":"getStatus"}"#).unwrap();
        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.cmd, CommandKind::GetStatus);
    }

    #[test]
    fn test_decode_partial_request() {
        let mut decoder = RequestDecoder::default();
        decoder.push(br#"{"cmd":"runSeq"#).unwrap();
        assert!(decoder.decode().unwrap().is_none());

        decoder.push(br#"uences","names":["Twist"]}"#).unwrap();
        let request = decoder.decode().unwrap().unwrap();
        assert_eq!(request.names, Some(vec!["Twist".to_string()]));
    }

    #[test]
    fn test_decode_empty_needs_more() {
        let decoder = RequestDecoder::default();
        assert!(decoder.decode().unwrap().is_none());
        assert!(matches!(decoder.finish(), Err(ProtocolError::Empty)));
    }

    #[test]
    fn test_truncated_at_eof() {
        let mut decoder = RequestDecoder::default();
        decoder.push(br#"{"cmd":"#).unwrap();
        assert!(matches!(decoder.finish(), Err(ProtocolError::Incomplete)));
    }

    #[test]
    fn test_malformed_json() {
        let mut decoder = RequestDecoder::default();
        decoder.push(b"not json").unwrap();
        assert!(matches!(decoder.decode(), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_unknown_command() {
        let mut decoder = RequestDecoder::default();
        decoder.push(br#"{"cmd":"reboot"}"#).unwrap();
        let err = decoder.decode().unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn test_missing_cmd() {
        let mut decoder = RequestDecoder::default();
        decoder.push(br#"{"names":[]}"#).unwrap();
        assert!(matches!(decoder.decode(), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_size_limit() {
        let mut decoder = RequestDecoder::new(16);
        decoder.push(b"{\"cmd\":").unwrap();
        let err = decoder.push(b"\"getSequences\"}").unwrap_err();
        assert!(matches!(err, ProtocolError::TooLarge { size: 22, limit: 16 }));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut decoder = RequestDecoder::default();
        decoder.push(b"{\"cmd\":\"turnOff\"}\n{garbage").unwrap();
        assert_eq!(decoder.decode().unwrap().unwrap().cmd, CommandKind::TurnOff);
    }
}
