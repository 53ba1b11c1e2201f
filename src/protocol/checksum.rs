use byteorder::{BigEndian, ByteOrder};

/// 16-bit ones'-complement checksum over the header fields and payload.
///
/// The sum is seeded with `seq` and `ack` as one big-endian word, then
/// `payload_size` as the high byte of a word. The payload is summed as
/// big-endian words; an odd trailing byte is the high byte of a final word.
///
/// Like every ones'-complement sum it cannot see reordered 16-bit words or a
/// word flipping between `0x0000` and `0xffff`.
#[must_use]
pub fn checksum(seq: u8, ack: u8, payload_size: u8, payload: &[u8]) -> u16 {
    let mut sum: u32 = ((seq as u32) << 8) + ack as u32;
    sum += (payload_size as u32) << 8;

    let mut words = payload.chunks_exact(2);
    for word in &mut words {
        sum += BigEndian::read_u16(word) as u32;
    }
    if let [last] = words.remainder() {
        sum += (*last as u32) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum >> 16) + (sum & 0xffff);
    }
    !(sum as u16)
}
