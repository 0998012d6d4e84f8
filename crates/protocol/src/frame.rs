use thiserror::Error;

use crate::Message;

/// Every frame opens with two sync bytes.
pub const SYNC: [u8; 2] = [0xAA, 0xAA];

const CTRL_WRITE: u8 = 0x01;
const CTRL_QUEUED: u8 = 0x02;

/// A framed command or response.
///
/// Layout on the wire: sync (2 bytes), a length byte covering id + ctrl +
/// params, the id byte, the ctrl byte (bit 0 = write, bit 1 = queued), the
/// params, and a checksum byte that is the two's complement of the payload
/// sum, so that the payload plus checksum sums to zero mod 256.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub id: u8,
    pub write: bool,
    pub queued: bool,
    pub params: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame shorter than the fixed header")]
    TooShort,
    #[error("missing sync bytes")]
    BadSync,
    #[error("length byte promises {expected} payload bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    BadChecksum { expected: u8, found: u8 },
}

pub(crate) fn checksum(payload: &[u8]) -> u8 {
    0u8.wrapping_sub(payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)))
}

impl Frame {
    pub fn from_message(msg: &Message, queued: bool) -> Frame {
        Frame {
            id: msg.id as u8,
            write: msg.write,
            queued,
            params: msg.params.clone(),
        }
    }

    fn ctrl(&self) -> u8 {
        let mut ctrl = 0;
        if self.write {
            ctrl |= CTRL_WRITE;
        }
        if self.queued {
            ctrl |= CTRL_QUEUED;
        }
        ctrl
    }

    pub fn encode(&self) -> Vec<u8> {
        // The length byte covers id + ctrl + params, so params are capped
        // at 253 bytes. Nothing in the command set comes close.
        debug_assert!(self.params.len() <= 253);

        let mut buf = Vec::with_capacity(self.params.len() + 6);
        buf.extend_from_slice(&SYNC);
        buf.push(self.params.len() as u8 + 2);
        buf.push(self.id);
        buf.push(self.ctrl());
        buf.extend_from_slice(&self.params);
        buf.push(checksum(&buf[3..]));
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Frame, FrameError> {
        if buf.len() < 4 {
            return Err(FrameError::TooShort);
        }
        if buf[..2] != SYNC {
            return Err(FrameError::BadSync);
        }
        let len = buf[2] as usize;
        if len < 2 {
            return Err(FrameError::TooShort);
        }
        // Payload plus the trailing checksum byte.
        if buf.len() < 3 + len + 1 {
            return Err(FrameError::Truncated {
                expected: len,
                got: buf.len().saturating_sub(4),
            });
        }

        let payload = &buf[3..3 + len];
        let expected = checksum(payload);
        let found = buf[3 + len];
        if expected != found {
            return Err(FrameError::BadChecksum { expected, found });
        }

        let ctrl = payload[1];
        Ok(Frame {
            id: payload[0],
            write: ctrl & CTRL_WRITE != 0,
            queued: ctrl & CTRL_QUEUED != 0,
            params: payload[2..].to_vec(),
        })
    }
}
