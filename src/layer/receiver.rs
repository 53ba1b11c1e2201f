use tracing::{debug, info, trace};

use crate::{
    protocol::packet::Packet,
    utils::{in_window, Seq, MAX_SEQ},
};

use super::{max_payload_len, BuildError, ReceiverIo};

enum RecvSlot {
    Empty,
    Received(Vec<u8>),
}

/// Receiving half of a selective-repeat connection.
///
/// Buffers up to `window_size` packets past a gap and hands payloads to the
/// application strictly in sequence order.
pub struct Receiver {
    wnd: Vec<RecvSlot>,
    frame_expected: Seq,
    too_far: Seq, // exclusive

    // stat
    stat: LocalStat,

    // const
    window_size: usize,
    max_payload_len: usize,
}

pub struct ReceiverBuilder {
    pub window_size: usize,
    pub packet_capacity: usize,
}

impl ReceiverBuilder {
    pub fn build(self) -> Result<Receiver, BuildError> {
        let max_payload_len = max_payload_len(self.window_size, self.packet_capacity)?;
        let this = Receiver {
            wnd: (0..MAX_SEQ).map(|_| RecvSlot::Empty).collect(),
            frame_expected: Seq::zero(),
            too_far: Seq::zero().add_usize(self.window_size),
            stat: LocalStat::default(),
            window_size: self.window_size,
            max_payload_len,
        };
        info!(
            window_size = this.window_size,
            max_payload_len, "receiver initializing"
        );
        this.check_rep();
        Ok(this)
    }
}

/// Where an arriving sequence number falls relative to the receive window.
enum Location {
    InRecvWindow,
    /// Already delivered; the sender may have missed our ack.
    TooLate,
    OutOfWindow,
}

impl Receiver {
    fn check_rep(&self) {
        assert_eq!(self.too_far.sub(self.frame_expected), self.window_size);
        assert!(matches!(
            self.wnd[self.frame_expected.index()],
            RecvSlot::Empty
        ));
        for (i, slot) in self.wnd.iter().enumerate() {
            let seq = Seq::from_u8(i as u8).unwrap();
            if let RecvSlot::Received(_) = slot {
                assert!(in_window(self.frame_expected, self.too_far, seq));
            }
        }
    }

    #[must_use]
    pub fn stat(&self) -> ReceiverStat {
        ReceiverStat {
            packets: self.stat.packets,
            delivered: self.stat.delivered,
            buffered_out_of_order: self.stat.buffered_out_of_order,
            duplicates: self.stat.duplicates,
            out_of_window: self.stat.out_of_window,
            corrupted: self.stat.corrupted,
            buffered: self.buffered(),
            frame_expected: self.frame_expected,
        }
    }

    #[must_use]
    #[inline]
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    fn buffered(&self) -> usize {
        self.wnd
            .iter()
            .filter(|slot| matches!(slot, RecvSlot::Received(_)))
            .count()
    }

    fn location(&self, seq: Seq) -> Location {
        if in_window(self.frame_expected, self.too_far, seq) {
            Location::InRecvWindow
        } else if in_window(
            self.frame_expected.sub_usize(self.window_size),
            self.frame_expected,
            seq,
        ) {
            Location::TooLate
        } else {
            Location::OutOfWindow
        }
    }

    pub fn on_packet_from_network(&mut self, io: &mut impl ReceiverIo, bytes: &[u8]) {
        let packet = match Packet::decode(bytes, self.max_payload_len) {
            Ok(x) => x,
            Err(e) => {
                self.stat.corrupted += 1;
                debug!(error = %e, "dropping packet");
                return;
            }
        };
        self.stat.packets += 1;
        let seq = packet.seq();
        let ack = Packet::ack(seq).to_bytes();

        match self.location(seq) {
            Location::InRecvWindow => {
                let slot = &mut self.wnd[seq.index()];
                if let RecvSlot::Empty = slot {
                    *slot = RecvSlot::Received(packet.into_payload());
                    if seq != self.frame_expected {
                        self.stat.buffered_out_of_order += 1;
                    }
                    io.deliver_to_network(ack);
                    debug!(%seq, "accepted");
                    self.slide(io);
                } else {
                    // buffered already, the ack got lost
                    self.stat.duplicates += 1;
                    io.deliver_to_network(ack);
                    trace!(%seq, "duplicate of buffered packet");
                }
            }
            Location::TooLate => {
                self.stat.duplicates += 1;
                io.deliver_to_network(ack);
                trace!(%seq, frame_expected = %self.frame_expected, "duplicate of delivered packet");
            }
            Location::OutOfWindow => {
                self.stat.out_of_window += 1;
                trace!(%seq, frame_expected = %self.frame_expected, "out of window");
            }
        }
        self.check_rep();
    }

    /// Releases everything still buffered.
    pub fn finalize(self) -> ReceiverStat {
        let stat = self.stat();
        info!(
            buffered = stat.buffered,
            delivered = stat.delivered,
            "receiver finalizing"
        );
        stat
    }

    /// Delivers the contiguous run of received slots at the base of the window.
    fn slide(&mut self, io: &mut impl ReceiverIo) {
        loop {
            let slot = &mut self.wnd[self.frame_expected.index()];
            let message = match std::mem::replace(slot, RecvSlot::Empty) {
                RecvSlot::Received(x) => x,
                RecvSlot::Empty => break,
            };
            debug!(seq = %self.frame_expected, len = message.len(), "delivered");
            io.deliver_to_application(message);
            self.stat.delivered += 1;
            self.frame_expected.increment();
            self.too_far.increment();
        }
    }
}

#[derive(Default)]
struct LocalStat {
    packets: u64,
    delivered: u64,
    buffered_out_of_order: u64,
    duplicates: u64,
    out_of_window: u64,
    corrupted: u64,
}

#[derive(Debug, Clone)]
pub struct ReceiverStat {
    pub packets: u64,
    pub delivered: u64,
    pub buffered_out_of_order: u64,
    pub duplicates: u64,
    pub out_of_window: u64,
    pub corrupted: u64,
    pub buffered: usize,
    pub frame_expected: Seq,
}
