// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Framing for requests and replies that carry binary attachments.
//!
//! Packet layout (all integers big-endian):
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || JSON_LEN(4) || PAYLOAD_COUNT(4) ||
//! JSON || (LEN(8) || BYTES)* || CHECKSUM(32)``
//!
//! * JSON is a request envelope (`{method, params}`) or a reply result tree
//! * CHECKSUM = blake3-256 over HEADER (first 16 bytes) || BODY

use std::io::Read;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Reply, TransportError};

/// Protocol magic constant "DUAL".
pub const MAGIC: [u8; 4] = *b"DUAL";
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_LEN: usize = 16;
/// Trailing checksum length in bytes.
pub const CHECKSUM_LEN: usize = 32;
/// Upper bound for a single binary attachment.
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 31;
/// Upper bound for the number of attachments in one packet.
pub const MAX_PAYLOAD_COUNT: u32 = 64;

/// Request body: RPC method name plus parameter tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    /// Method name (e.g. "listScenes").
    pub method: String,
    /// Method parameters (`null` when the method takes none).
    pub params: Value,
}

/// Decoded packet contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    /// Encoded JSON segment.
    pub json: Vec<u8>,
    /// Binary attachments.
    pub payloads: Vec<Vec<u8>>,
}

impl Packet {
    fn header(&self) -> Result<[u8; HEADER_LEN], TransportError> {
        let json_len = u32::try_from(self.json.len())
            .map_err(|_| protocol("json segment exceeds u32 length"))?;
        let count = u32::try_from(self.payloads.len())
            .ok()
            .filter(|count| *count <= MAX_PAYLOAD_COUNT)
            .ok_or_else(|| protocol("too many payloads"))?;
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&json_len.to_be_bytes());
        header[12..16].copy_from_slice(&count.to_be_bytes());
        Ok(header)
    }

    /// Encode into a full packet byte vector.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let header = self.header()?;
        let body_len: usize = self.json.len()
            + self
                .payloads
                .iter()
                .map(|payload| 8 + payload.len())
                .sum::<usize>();
        let mut out = Vec::with_capacity(HEADER_LEN + body_len + CHECKSUM_LEN);
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.json);
        for payload in &self.payloads {
            if payload.len() as u64 > MAX_PAYLOAD_BYTES {
                return Err(protocol("payload exceeds maximum size"));
            }
            out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
            out.extend_from_slice(payload);
        }
        let checksum = blake3::hash(&out);
        out.extend_from_slice(checksum.as_bytes());
        Ok(out)
    }

    /// Decode a packet from a byte slice, returning it and the bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), TransportError> {
        let mut cursor = bytes;
        let packet = Self::read_from(&mut cursor).map_err(|err| match err {
            TransportError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                protocol("incomplete packet")
            }
            TransportError::Closed => protocol("incomplete packet"),
            other => other,
        })?;
        Ok((packet, bytes.len() - cursor.len()))
    }

    /// Read exactly one packet from a stream.
    ///
    /// Returns [`TransportError::Closed`] when the stream ends before the first
    /// header byte; a stream that ends mid-packet is an I/O error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, TransportError> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0usize;
        while filled < HEADER_LEN {
            let n = reader.read(&mut header[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Err(TransportError::Closed);
                }
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("truncated packet header: read {filled} of {HEADER_LEN} bytes"),
                )
                .into());
            }
            filled += n;
        }
        if header[0..4] != MAGIC {
            return Err(protocol("bad magic"));
        }
        let version = u16::from_be_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(protocol(format!("unsupported version {version}")));
        }
        let json_len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
        let count = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
        if count > MAX_PAYLOAD_COUNT {
            return Err(protocol(format!("payload count {count} exceeds limit")));
        }

        let mut hasher = Hasher::new();
        hasher.update(&header);

        let mut json = vec![0u8; json_len as usize];
        reader.read_exact(&mut json)?;
        hasher.update(&json);

        let mut payloads = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut len_bytes = [0u8; 8];
            reader.read_exact(&mut len_bytes)?;
            hasher.update(&len_bytes);
            let len = u64::from_be_bytes(len_bytes);
            if len > MAX_PAYLOAD_BYTES {
                return Err(protocol(format!("payload of {len} bytes exceeds limit")));
            }
            let len = usize::try_from(len).map_err(|_| protocol("payload too large"))?;
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;
            hasher.update(&payload);
            payloads.push(payload);
        }

        let mut checksum = [0u8; CHECKSUM_LEN];
        reader.read_exact(&mut checksum)?;
        if hasher.finalize().as_bytes() != &checksum {
            return Err(protocol("checksum mismatch"));
        }
        Ok(Self { json, payloads })
    }
}

/// Encode a request packet.
pub fn encode_request(method: &str, params: &Value) -> Result<Vec<u8>, TransportError> {
    let envelope = RequestEnvelope {
        method: method.to_owned(),
        params: params.clone(),
    };
    Packet {
        json: serde_json::to_vec(&envelope)?,
        payloads: Vec::new(),
    }
    .encode()
}

/// Decode a request packet into (envelope, bytes consumed).
pub fn decode_request(bytes: &[u8]) -> Result<(RequestEnvelope, usize), TransportError> {
    let (packet, used) = Packet::decode(bytes)?;
    if !packet.payloads.is_empty() {
        return Err(protocol("requests carry no binary payloads"));
    }
    Ok((serde_json::from_slice(&packet.json)?, used))
}

/// Encode a reply packet.
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, TransportError> {
    Packet {
        json: serde_json::to_vec(&reply.result)?,
        payloads: reply.payloads.clone(),
    }
    .encode()
}

/// Decode a reply packet into (reply, bytes consumed).
pub fn decode_reply(bytes: &[u8]) -> Result<(Reply, usize), TransportError> {
    let (packet, used) = Packet::decode(bytes)?;
    Ok((packet.into_reply()?, used))
}

impl Packet {
    /// Interpret the packet as a reply.
    pub fn into_reply(self) -> Result<Reply, TransportError> {
        Ok(Reply {
            result: serde_json::from_slice(&self.json)?,
            payloads: self.payloads,
        })
    }
}

fn protocol(message: impl Into<String>) -> TransportError {
    TransportError::Protocol(message.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reply_with_payloads_survives_framing() {
        let reply = Reply {
            result: json!({ "ok": true }),
            payloads: vec![vec![0xAB; 300], Vec::new()],
        };
        let bytes = encode_reply(&reply).unwrap();
        let (decoded, used) = decode_reply(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(decoded, reply);
    }

    #[test]
    fn header_layout_is_big_endian() {
        let bytes = encode_request("listScenes", &Value::Null).unwrap();
        assert_eq!(&bytes[0..4], b"DUAL");
        assert_eq!(&bytes[4..6], &[0x00, 0x01]);
        let json_len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(bytes.len(), HEADER_LEN + json_len + CHECKSUM_LEN);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn flipped_body_byte_fails_checksum() {
        let mut bytes = encode_request("download", &json!({ "filename": "a" })).unwrap();
        bytes[HEADER_LEN + 2] ^= 0x01;
        match decode_request(&bytes) {
            Err(TransportError::Protocol(msg)) => assert!(msg.contains("checksum")),
            other => panic!("expected checksum failure, got {other:?}"),
        }
    }

    #[test]
    fn truncated_packet_is_incomplete() {
        let bytes = encode_request("download", &json!({})).unwrap();
        match decode_request(&bytes[..bytes.len() - 1]) {
            Err(TransportError::Protocol(msg)) => assert_eq!(msg, "incomplete packet"),
            other => panic!("expected incomplete packet, got {other:?}"),
        }
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = encode_request("download", &json!({})).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_request(&bytes),
            Err(TransportError::Protocol(msg)) if msg == "bad magic"
        ));
    }

    #[test]
    fn empty_stream_reports_closed() {
        let mut empty: &[u8] = &[];
        assert!(matches!(
            Packet::read_from(&mut empty),
            Err(TransportError::Closed)
        ));
    }
}
