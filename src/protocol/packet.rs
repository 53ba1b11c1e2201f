use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::utils::Seq;

use super::{checksum::checksum, Corruption, DecodingError, EncodingError, HEADER_LEN};

/// A packet that passed every integrity check, or one about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    checksum: u16,
    seq: Seq,
    ack: Seq,
    payload: Vec<u8>,
}

pub struct PacketBuilder {
    pub seq: Seq,
    pub ack: Seq,
    pub payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn build(self) -> Result<Packet, EncodingError> {
        if self.payload.len() > u8::MAX as usize {
            return Err(EncodingError::PayloadTooLarge {
                len: self.payload.len(),
                max: u8::MAX as usize,
            });
        }
        let checksum = checksum(
            self.seq.to_u8(),
            self.ack.to_u8(),
            self.payload.len() as u8,
            &self.payload,
        );
        let this = Packet {
            checksum,
            seq: self.seq,
            ack: self.ack,
            payload: self.payload,
        };
        this.check_rep();
        Ok(this)
    }
}

impl Packet {
    fn check_rep(&self) {
        assert!(self.payload.len() <= u8::MAX as usize);
    }

    /// A data packet for `seq`.
    ///
    /// # Panics
    ///
    /// If `payload` does not fit the one-byte `payload_size` field.
    #[must_use]
    pub fn data(seq: Seq, payload: Vec<u8>) -> Self {
        assert!(
            payload.len() <= u8::MAX as usize,
            "payload of {} bytes does not fit in a packet",
            payload.len()
        );
        let checksum = checksum(seq.to_u8(), 0, payload.len() as u8, &payload);
        let this = Packet {
            checksum,
            seq,
            ack: Seq::zero(),
            payload,
        };
        this.check_rep();
        this
    }

    /// A pure acknowledgment of `ack`.
    #[must_use]
    pub fn ack(ack: Seq) -> Self {
        let checksum = checksum(0, ack.to_u8(), 0, &[]);
        Packet {
            checksum,
            seq: Seq::zero(),
            ack,
            payload: Vec::new(),
        }
    }

    /// Parses and verifies a packet.
    ///
    /// `buf` may be longer than the packet; trailing bytes are ignored.
    pub fn decode(buf: &[u8], max_payload_len: usize) -> Result<Self, DecodingError> {
        let mut rdr = Cursor::new(buf);
        let declared = rdr
            .read_u16::<BigEndian>()
            .map_err(|_e| DecodingError::Decoding { field: "checksum" })?;
        let seq = rdr
            .read_u8()
            .map_err(|_e| DecodingError::Decoding { field: "seq" })?;
        let ack = rdr
            .read_u8()
            .map_err(|_e| DecodingError::Decoding { field: "ack" })?;
        let payload_size = rdr
            .read_u8()
            .map_err(|_e| DecodingError::Decoding { field: "payload_size" })?;

        if seq != 0 && ack != 0 {
            return Err(DecodingError::Corrupted(Corruption::SeqAndAckBothSet));
        }
        if payload_size as usize > max_payload_len {
            return Err(DecodingError::Corrupted(Corruption::PayloadTooLarge {
                len: payload_size as usize,
            }));
        }

        let mut payload = vec![0; payload_size as usize];
        rdr.read_exact(&mut payload)
            .map_err(|_e| DecodingError::Decoding { field: "payload" })?;

        let computed = checksum(seq, ack, payload_size, &payload);
        if computed != declared {
            return Err(DecodingError::Corrupted(Corruption::ChecksumMismatch {
                declared,
                computed,
            }));
        }

        let out_of_space = |value| DecodingError::Corrupted(Corruption::OutOfSequenceSpace { value });
        let seq = Seq::from_u8(seq).ok_or_else(|| out_of_space(seq))?;
        let ack = Seq::from_u8(ack).ok_or_else(|| out_of_space(ack))?;

        let this = Packet {
            checksum: declared,
            seq,
            ack,
            payload,
        };
        this.check_rep();
        Ok(this)
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.write_u16::<BigEndian>(self.checksum).unwrap();
        buf.write_u8(self.seq.to_u8()).unwrap();
        buf.write_u8(self.ack.to_u8()).unwrap();
        buf.write_u8(self.payload.len() as u8).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        buf.extend_from_slice(&self.payload);
        buf
    }

    #[must_use]
    #[inline]
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    #[must_use]
    #[inline]
    pub fn seq(&self) -> Seq {
        self.seq
    }

    #[must_use]
    #[inline]
    pub fn ack_seq(&self) -> Seq {
        self.ack
    }

    #[must_use]
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Whether `buf` fails to decode as a packet.
#[must_use]
pub fn is_corrupted(buf: &[u8], max_payload_len: usize) -> bool {
    Packet::decode(buf, max_payload_len).is_err()
}
