mod receiver;
mod sender;

use std::{
    fmt,
    time::{Duration, Instant},
};

pub use receiver::*;
pub use sender::*;

use crate::{
    protocol::HEADER_LEN,
    utils::{PhysicalTimer, MAX_SEQ},
};

pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);
pub const DEFAULT_PACKET_CAPACITY: usize = 128;

/// What the sender needs from the layers around it.
pub trait SenderIo: PhysicalTimer {
    fn deliver_to_network(&mut self, packet: Vec<u8>);
    fn now(&self) -> Instant;
}

/// What the receiver needs from the layers around it.
pub trait ReceiverIo {
    fn deliver_to_network(&mut self, packet: Vec<u8>);
    fn deliver_to_application(&mut self, message: Vec<u8>);
}

pub struct Builder {
    pub window_size: usize,
    pub timeout: Duration,
    /// Bytes per packet on the channel, header included.
    pub packet_capacity: usize,
}

impl Builder {
    pub fn build(self) -> Result<(Sender, Receiver), BuildError> {
        let sender = SenderBuilder {
            window_size: self.window_size,
            timeout: self.timeout,
            packet_capacity: self.packet_capacity,
        }
        .build()?;
        let receiver = ReceiverBuilder {
            window_size: self.window_size,
            packet_capacity: self.packet_capacity,
        }
        .build()?;
        Ok((sender, receiver))
    }

    pub fn default() -> Self {
        Builder {
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_TIMEOUT,
            packet_capacity: DEFAULT_PACKET_CAPACITY,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BuildError {
    ZeroWindow,
    WindowTooLarge { window_size: usize, max: usize },
    ZeroTimeout,
    PacketCapacityTooSmall { packet_capacity: usize },
    PacketCapacityTooLarge { packet_capacity: usize },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::ZeroWindow => write!(f, "window size must be positive"),
            BuildError::WindowTooLarge { window_size, max } => write!(
                f,
                "window size {} exceeds half the sequence space ({})",
                window_size, max
            ),
            BuildError::ZeroTimeout => write!(f, "retransmission timeout must be positive"),
            BuildError::PacketCapacityTooSmall { packet_capacity } => write!(
                f,
                "packet capacity {} leaves no room for a payload",
                packet_capacity
            ),
            BuildError::PacketCapacityTooLarge { packet_capacity } => write!(
                f,
                "packet capacity {} needs a payload_size above 255",
                packet_capacity
            ),
        }
    }
}

impl std::error::Error for BuildError {}

/// Checks the settings both roles share and returns the payload limit.
fn max_payload_len(window_size: usize, packet_capacity: usize) -> Result<usize, BuildError> {
    if window_size == 0 {
        return Err(BuildError::ZeroWindow);
    }
    let max = MAX_SEQ as usize / 2;
    if window_size > max {
        return Err(BuildError::WindowTooLarge { window_size, max });
    }
    if packet_capacity <= HEADER_LEN {
        return Err(BuildError::PacketCapacityTooSmall { packet_capacity });
    }
    let max_payload_len = packet_capacity - HEADER_LEN;
    if max_payload_len > u8::MAX as usize {
        return Err(BuildError::PacketCapacityTooLarge { packet_capacity });
    }
    Ok(max_payload_len)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use crate::{
        protocol::{packet::Packet, HEADER_LEN},
        test_util::Recorder,
    };

    use super::*;

    const CAPACITY: usize = 32;
    const MAX_PAYLOAD_LEN: usize = CAPACITY - HEADER_LEN;

    fn pair() -> (Sender, Receiver) {
        Builder {
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_TIMEOUT,
            packet_capacity: CAPACITY,
        }
        .build()
        .unwrap()
    }

    fn message(len: usize, salt: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31) ^ salt).collect()
    }

    #[rstest]
    #[case(0, Err(BuildError::ZeroWindow))]
    #[case(1, Ok(()))]
    #[case(16, Ok(()))]
    #[case(17, Err(BuildError::WindowTooLarge { window_size: 17, max: 16 }))]
    fn window_size_bounds(#[case] window_size: usize, #[case] expected: Result<(), BuildError>) {
        let result = Builder {
            window_size,
            ..Builder::default()
        }
        .build()
        .map(|_| ());
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case(5, Err(BuildError::PacketCapacityTooSmall { packet_capacity: 5 }))]
    #[case(6, Ok(()))]
    #[case(260, Ok(()))]
    #[case(261, Err(BuildError::PacketCapacityTooLarge { packet_capacity: 261 }))]
    fn packet_capacity_bounds(
        #[case] packet_capacity: usize,
        #[case] expected: Result<(), BuildError>,
    ) {
        let result = Builder {
            packet_capacity,
            ..Builder::default()
        }
        .build()
        .map(|_| ());
        assert_eq!(result, expected);
    }

    #[test]
    fn zero_timeout() {
        let result = Builder {
            timeout: Duration::ZERO,
            ..Builder::default()
        }
        .build()
        .map(|_| ());
        assert_eq!(result, Err(BuildError::ZeroTimeout));
    }

    #[test]
    fn no_loss_three_and_a_half_packets() {
        let (mut sender, mut receiver) = pair();
        let mut sender_io = Recorder::new();
        let mut receiver_io = Recorder::new();

        let input = message(MAX_PAYLOAD_LEN * 7 / 2, 0x5a);
        sender.on_message_from_application(&mut sender_io, &input);

        let packets = sender_io.take_network();
        assert_eq!(packets.len(), 4);
        let seqs: Vec<u8> = packets
            .iter()
            .map(|p| Packet::decode(p, MAX_PAYLOAD_LEN).unwrap().seq().to_u8())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);

        for packet in packets {
            receiver.on_packet_from_network(&mut receiver_io, &packet);
        }
        assert_eq!(receiver_io.application.concat(), input);

        for ack in receiver_io.take_network() {
            sender.on_packet_from_network(&mut sender_io, &ack);
        }
        assert_eq!(sender.stat().outstanding, 0);
        assert!(sender_io.timer.is_none());
        assert!(sender_io.network.is_empty());
    }

    #[test]
    fn lost_packet_is_retransmitted_on_timeout() {
        let (mut sender, mut receiver) = pair();
        let mut sender_io = Recorder::new();
        let mut receiver_io = Recorder::new();

        let messages: Vec<Vec<u8>> = (0..5).map(|i| message(MAX_PAYLOAD_LEN, i)).collect();
        for m in &messages {
            sender.on_message_from_application(&mut sender_io, m);
            sender_io.advance(Duration::from_millis(10));
        }

        let packets = sender_io.take_network();
        assert_eq!(packets.len(), 5);
        for (i, packet) in packets.iter().enumerate() {
            if i != 1 {
                receiver.on_packet_from_network(&mut receiver_io, packet);
            }
        }
        assert_eq!(receiver_io.application, vec![messages[0].clone()]);

        for ack in receiver_io.take_network() {
            sender.on_packet_from_network(&mut sender_io, &ack);
        }
        assert_eq!(sender.stat().outstanding, 4);

        // only seq 1 is still unacknowledged
        sender_io.fire_timer();
        sender.on_timer_fired(&mut sender_io);
        let retransmitted = sender_io.take_network();
        assert_eq!(retransmitted.len(), 1);
        assert_eq!(retransmitted[0], packets[1]);

        receiver.on_packet_from_network(&mut receiver_io, &retransmitted[0]);
        assert_eq!(receiver_io.application, messages);

        for ack in receiver_io.take_network() {
            sender.on_packet_from_network(&mut sender_io, &ack);
        }
        let stat = sender.stat();
        assert_eq!(stat.outstanding, 0);
        assert_eq!(stat.retransmissions, 1);
        assert!(sender_io.timer.is_none());
    }

    #[test]
    fn lost_ack_of_buffered_packet_is_reacked() {
        let (mut sender, mut receiver) = pair();
        let mut sender_io = Recorder::new();
        let mut receiver_io = Recorder::new();

        for i in 0..3 {
            sender.on_message_from_application(&mut sender_io, &message(4, i));
        }
        let packets = sender_io.take_network();

        // seq 0 lost, seq 1 buffered but its ack lost
        receiver.on_packet_from_network(&mut receiver_io, &packets[1]);
        assert!(receiver_io.application.is_empty());
        receiver_io.take_network();

        receiver.on_packet_from_network(&mut receiver_io, &packets[1]);
        let reacks = receiver_io.take_network();
        assert_eq!(reacks, vec![Packet::ack(packets_seq(&packets[1])).to_bytes()]);
        assert!(receiver_io.application.is_empty());
        assert_eq!(receiver.stat().duplicates, 1);

        receiver.on_packet_from_network(&mut receiver_io, &packets[0]);
        receiver.on_packet_from_network(&mut receiver_io, &packets[2]);
        assert_eq!(
            receiver_io.application,
            vec![message(4, 0), message(4, 1), message(4, 2)]
        );
    }

    fn packets_seq(bytes: &[u8]) -> crate::utils::Seq {
        Packet::decode(bytes, MAX_PAYLOAD_LEN).unwrap().seq()
    }

    #[test]
    fn duplicates_of_delivered_packets_are_not_redelivered() {
        let (mut sender, mut receiver) = pair();
        let mut sender_io = Recorder::new();
        let mut receiver_io = Recorder::new();

        sender.on_message_from_application(&mut sender_io, &message(MAX_PAYLOAD_LEN * 2, 1));
        let packets = sender_io.take_network();
        for packet in packets.iter().chain(packets.iter()).chain(packets.iter().rev()) {
            receiver.on_packet_from_network(&mut receiver_io, packet);
        }

        assert_eq!(receiver_io.application.len(), 2);
        assert_eq!(receiver_io.take_network().len(), 6);
        assert_eq!(receiver.stat().duplicates, 4);
    }

    #[test]
    fn sequence_numbers_wrap_around() {
        let (mut sender, mut receiver) = pair();
        let mut sender_io = Recorder::new();
        let mut receiver_io = Recorder::new();

        let input = message(MAX_PAYLOAD_LEN * 3 * crate::utils::MAX_SEQ as usize, 9);
        sender.on_message_from_application(&mut sender_io, &input);
        loop {
            let packets = sender_io.take_network();
            if packets.is_empty() {
                break;
            }
            // deliver each batch backwards to exercise buffering across the wrap
            for packet in packets.iter().rev() {
                receiver.on_packet_from_network(&mut receiver_io, packet);
            }
            for ack in receiver_io.take_network() {
                sender.on_packet_from_network(&mut sender_io, &ack);
            }
        }

        assert_eq!(receiver_io.application.concat(), input);
        assert_eq!(sender.stat().pending, 0);
        assert_eq!(sender.stat().outstanding, 0);
    }
}
