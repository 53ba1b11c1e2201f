//! # Packet
//!
//! ```text
//! 0       2   3   4   5                         (BYTE)
//! +-------+---+---+---+-------------------------+
//! | csum  |seq|ack|len|   payload (len bytes)   |
//! +-------+---+---+---+-------------------------+
//! ```
//!
//! `csum` is big-endian. The channel may hand over a fixed-size frame longer
//! than `5 + len`; trailing bytes are ignored.
//!
//! # Invariants
//!
//! - Data packets carry `seq` and `ack == 0`; acks carry `ack` and `seq == 0`.
//!   A packet with both nonzero is corrupted, so acks are never piggybacked.
//! - `seq` and `ack` are below `MAX_SEQ`
//! - `len <= packet capacity - HEADER_LEN`

pub mod checksum;
pub mod packet;

use std::fmt;

pub const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    SeqAndAckBothSet,
    PayloadTooLarge { len: usize },
    OutOfSequenceSpace { value: u8 },
    ChecksumMismatch { declared: u16, computed: u16 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodingError {
    Decoding { field: &'static str },
    Corrupted(Corruption),
}

#[derive(Debug, PartialEq, Eq)]
pub enum EncodingError {
    PayloadTooLarge { len: usize, max: usize },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::SeqAndAckBothSet => write!(f, "both seq and ack are set"),
            Corruption::PayloadTooLarge { len } => write!(f, "payload of {} bytes is too large", len),
            Corruption::OutOfSequenceSpace { value } => {
                write!(f, "{} is outside the sequence space", value)
            }
            Corruption::ChecksumMismatch { declared, computed } => write!(
                f,
                "checksum mismatch: declared {:#06x}, computed {:#06x}",
                declared, computed
            ),
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodingError::Decoding { field } => write!(f, "truncated at field `{}`", field),
            DecodingError::Corrupted(corruption) => write!(f, "corrupted packet: {}", corruption),
        }
    }
}

impl std::error::Error for DecodingError {}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::PayloadTooLarge { len, max } => {
                write!(f, "payload of {} bytes exceeds the limit of {}", len, max)
            }
        }
    }
}

impl std::error::Error for EncodingError {}
