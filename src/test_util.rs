use std::time::{Duration, Instant};

use crate::{
    layer::{ReceiverIo, SenderIo},
    utils::PhysicalTimer,
};

/// Records everything an engine hands to its collaborators.
///
/// The clock only moves when a test moves it.
pub struct Recorder {
    pub now: Instant,
    pub network: Vec<Vec<u8>>,
    pub application: Vec<Vec<u8>>,
    /// Start instant and duration of the running timer.
    pub timer: Option<(Instant, Duration)>,
    pub timer_starts: usize,
    pub timer_stops: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            now: Instant::now(),
            network: Vec::new(),
            application: Vec::new(),
            timer: None,
            timer_starts: 0,
            timer_stops: 0,
        }
    }

    pub fn advance(&mut self, d: Duration) {
        self.now += d;
    }

    pub fn take_network(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.network)
    }

    pub fn timer_remaining(&self) -> Option<Duration> {
        self.timer
            .map(|(started, timeout)| (started + timeout).saturating_duration_since(self.now))
    }

    /// Moves the clock to the running timer's expiry and clears it.
    pub fn fire_timer(&mut self) {
        let (started, timeout) = self.timer.take().expect("no timer running");
        self.now = self.now.max(started + timeout);
    }
}

impl PhysicalTimer for Recorder {
    fn start_timer(&mut self, timeout: Duration) {
        assert!(self.timer.is_none(), "timer started while running");
        self.timer = Some((self.now, timeout));
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        assert!(self.timer.is_some(), "timer stopped while idle");
        self.timer = None;
        self.timer_stops += 1;
    }
}

impl SenderIo for Recorder {
    fn deliver_to_network(&mut self, packet: Vec<u8>) {
        self.network.push(packet);
    }

    fn now(&self) -> Instant {
        self.now
    }
}

impl ReceiverIo for Recorder {
    fn deliver_to_network(&mut self, packet: Vec<u8>) {
        self.network.push(packet);
    }

    fn deliver_to_application(&mut self, message: Vec<u8>) {
        self.application.push(message);
    }
}
