use std::{collections::VecDeque, time::Duration};

use tracing::{debug, info, trace, warn};

use crate::{
    protocol::packet::Packet,
    utils::{in_window, Seq, TimerLedger, MAX_SEQ},
};

use super::{max_payload_len, BuildError, SenderIo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Unacked,
    Acked,
}

struct Slot {
    state: SlotState,
    packet: Option<Packet>,
}

/// Sending half of a selective-repeat connection.
///
/// Messages are cut into packets and queued; at most `window_size` packets
/// are in flight, each with its own retransmission deadline.
pub struct Sender {
    // modified by `drain`
    pending: VecDeque<Vec<u8>>,
    wnd: Vec<Slot>,
    next_seq_to_send: Seq, // exclusive

    // modified by acks
    ack_expected: Seq,
    timers: TimerLedger,

    // stat
    stat: LocalStat,

    // const
    window_size: usize,
    max_payload_len: usize,
}

pub struct SenderBuilder {
    pub window_size: usize,
    pub timeout: Duration,
    pub packet_capacity: usize,
}

impl SenderBuilder {
    pub fn build(self) -> Result<Sender, BuildError> {
        let max_payload_len = max_payload_len(self.window_size, self.packet_capacity)?;
        if self.timeout.is_zero() {
            return Err(BuildError::ZeroTimeout);
        }
        let this = Sender {
            pending: VecDeque::new(),
            wnd: (0..MAX_SEQ)
                .map(|_| Slot {
                    state: SlotState::Empty,
                    packet: None,
                })
                .collect(),
            next_seq_to_send: Seq::zero(),
            ack_expected: Seq::zero(),
            timers: TimerLedger::new(self.timeout),
            stat: LocalStat::default(),
            window_size: self.window_size,
            max_payload_len,
        };
        info!(
            window_size = this.window_size,
            timeout_ms = self.timeout.as_millis() as u64,
            max_payload_len,
            "sender initializing"
        );
        this.check_rep();
        Ok(this)
    }
}

impl Sender {
    fn check_rep(&self) {
        let outstanding = self.outstanding();
        assert!(outstanding <= self.window_size);
        let mut unacked = 0;
        for (i, slot) in self.wnd.iter().enumerate() {
            let seq = Seq::from_u8(i as u8).unwrap();
            if in_window(self.ack_expected, self.next_seq_to_send, seq) {
                assert_ne!(slot.state, SlotState::Empty);
                assert!(slot.packet.is_some());
            } else {
                assert_eq!(slot.state, SlotState::Empty);
            }
            if slot.state == SlotState::Unacked {
                unacked += 1;
                assert!(self.timers.contains(seq));
            }
        }
        assert_eq!(unacked, self.timers.len());
        if outstanding > 0 {
            assert_ne!(self.wnd[self.ack_expected.index()].state, SlotState::Acked);
        }
    }

    #[must_use]
    pub fn stat(&self) -> SenderStat {
        SenderStat {
            messages: self.stat.messages,
            packets_sent: self.stat.packets_sent,
            retransmissions: self.stat.retransmissions,
            acks_accepted: self.stat.acks_accepted,
            acks_ignored: self.stat.acks_ignored,
            corrupted: self.stat.corrupted,
            pending: self.pending.len(),
            outstanding: self.outstanding(),
            next_seq_to_send: self.next_seq_to_send,
            ack_expected: self.ack_expected,
        }
    }

    #[must_use]
    #[inline]
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    #[must_use]
    pub fn slot_state(&self, seq: Seq) -> SlotState {
        self.wnd[seq.index()].state
    }

    /// Whether anything is still queued or unacknowledged.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.outstanding() == 0
    }

    #[must_use]
    #[inline]
    fn outstanding(&self) -> usize {
        self.next_seq_to_send.sub(self.ack_expected)
    }

    pub fn on_message_from_application(&mut self, io: &mut impl SenderIo, message: &[u8]) {
        self.stat.messages += 1;
        let before = self.pending.len();
        self.pending.extend(
            message
                .chunks(self.max_payload_len)
                .map(|chunk| chunk.to_vec()),
        );
        debug!(
            len = message.len(),
            packets = self.pending.len() - before,
            "message queued"
        );
        self.drain(io);
        self.check_rep();
    }

    pub fn on_packet_from_network(&mut self, io: &mut impl SenderIo, bytes: &[u8]) {
        let packet = match Packet::decode(bytes, self.max_payload_len) {
            Ok(x) => x,
            Err(e) => {
                self.stat.corrupted += 1;
                debug!(error = %e, "dropping ack");
                return;
            }
        };
        let ack = packet.ack_seq();

        if in_window(self.ack_expected, self.next_seq_to_send, ack)
            && self.wnd[ack.index()].state == SlotState::Unacked
        {
            self.wnd[ack.index()].state = SlotState::Acked;
            self.timers.cancel(ack);
            self.stat.acks_accepted += 1;
            debug!(%ack, "ack accepted");

            // a gap below `ack` keeps the window where it is
            if ack == self.ack_expected {
                self.slide();
            }
            let now = io.now();
            self.timers.sync(io, now);
        } else {
            self.stat.acks_ignored += 1;
            trace!(
                %ack,
                ack_expected = %self.ack_expected,
                next_seq_to_send = %self.next_seq_to_send,
                "ack ignored"
            );
        }

        self.drain(io);
        self.check_rep();
    }

    pub fn on_timer_fired(&mut self, io: &mut impl SenderIo) {
        let seq = match self.timers.expire() {
            Some(x) => x,
            None => {
                warn!("timer fired with no packet awaiting an ack");
                return;
            }
        };
        let now = io.now();

        let slot = &self.wnd[seq.index()];
        match (&slot.packet, slot.state) {
            (Some(packet), SlotState::Unacked) => {
                io.deliver_to_network(packet.to_bytes());
                self.stat.retransmissions += 1;
                self.timers.schedule(seq, now);
                debug!(%seq, "retransmitted");
            }
            (_, state) => {
                warn!(%seq, ?state, "expired timer for a packet not awaiting an ack");
            }
        }

        self.timers.sync(io, now);
        self.check_rep();
    }

    /// Releases everything still buffered.
    pub fn finalize(self) -> SenderStat {
        let stat = self.stat();
        info!(
            pending = stat.pending,
            outstanding = stat.outstanding,
            retransmissions = stat.retransmissions,
            "sender finalizing"
        );
        stat
    }

    /// Moves pending packets into the window while it has room.
    fn drain(&mut self, io: &mut impl SenderIo) {
        let now = io.now();
        while self.outstanding() < self.window_size {
            let payload = match self.pending.pop_front() {
                Some(x) => x,
                None => break,
            };
            let seq = self.next_seq_to_send;
            let packet = Packet::data(seq, payload);
            io.deliver_to_network(packet.to_bytes());
            debug!(%seq, len = packet.payload().len(), "sent");

            let slot = &mut self.wnd[seq.index()];
            slot.state = SlotState::Unacked;
            slot.packet = Some(packet);
            self.timers.schedule(seq, now);
            self.next_seq_to_send.increment();
            self.stat.packets_sent += 1;
        }
        self.timers.sync(io, now);
    }

    /// Frees the contiguous run of acked slots at the base of the window.
    fn slide(&mut self) {
        while self.outstanding() > 0 {
            let slot = &mut self.wnd[self.ack_expected.index()];
            if slot.state != SlotState::Acked {
                break;
            }
            slot.state = SlotState::Empty;
            slot.packet = None;
            self.ack_expected.increment();
        }
        debug!(ack_expected = %self.ack_expected, "window slid");
    }
}

#[derive(Default)]
struct LocalStat {
    messages: u64,
    packets_sent: u64,
    retransmissions: u64,
    acks_accepted: u64,
    acks_ignored: u64,
    corrupted: u64,
}

#[derive(Debug, Clone)]
pub struct SenderStat {
    pub messages: u64,
    pub packets_sent: u64,
    pub retransmissions: u64,
    pub acks_accepted: u64,
    pub acks_ignored: u64,
    pub corrupted: u64,
    pub pending: usize,
    pub outstanding: usize,
    pub next_seq_to_send: Seq,
    pub ack_expected: Seq,
}
