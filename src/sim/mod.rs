//! A discrete-event driver for one sender and one receiver.
//!
//! The clock is virtual: events run in timestamp order and time jumps from
//! one to the next, so a run with thousands of timeouts takes milliseconds.

mod channel;

use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, Instant},
};

pub use channel::*;
use tracing::{debug, info, warn};

use crate::{
    layer::{self, BuildError, Builder, Receiver, ReceiverIo, Sender, SenderIo},
    utils::PhysicalTimer,
};

pub struct SimConfig {
    pub seed: u64,
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    /// Keep `max_delay` under twice `min_delay`. A packet or ack that stays
    /// in flight while the sender cycles through the sequence space is
    /// indistinguishable from a fresh one.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Spacing between messages handed to the sender.
    pub message_interval: Duration,
    /// Give up once the virtual clock passes this.
    pub max_virtual_time: Duration,
    pub builder: Builder,
}

impl SimConfig {
    pub fn build(self) -> Result<Simulation, SimConfigError> {
        for (name, value) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("duplicate_rate", self.duplicate_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimConfigError::Rate { name, value });
            }
        }
        if self.min_delay > self.max_delay {
            return Err(SimConfigError::DelayRange);
        }
        if self.max_delay >= self.min_delay * 2 {
            warn!(
                min_delay_ms = self.min_delay.as_millis() as u64,
                max_delay_ms = self.max_delay.as_millis() as u64,
                "stale packets may alias fresh sequence numbers"
            );
        }
        let (sender, receiver) = self.builder.build().map_err(SimConfigError::Build)?;
        let channel = ChannelBuilder {
            seed: self.seed,
            loss_rate: self.loss_rate,
            corrupt_rate: self.corrupt_rate,
            duplicate_rate: self.duplicate_rate,
            min_delay: self.min_delay,
            max_delay: self.max_delay,
        }
        .build();
        Ok(Simulation {
            sender,
            receiver,
            world: World {
                epoch: Instant::now(),
                clock: Duration::ZERO,
                events: BTreeMap::new(),
                next_order: 0,
                channel,
                timer: None,
                next_generation: 0,
                delivered: Vec::new(),
            },
            message_interval: self.message_interval,
            max_virtual_time: self.max_virtual_time,
        })
    }

    pub fn default() -> Self {
        SimConfig {
            seed: 0,
            loss_rate: 0.15,
            corrupt_rate: 0.15,
            duplicate_rate: 0.05,
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(35),
            message_interval: Duration::from_millis(100),
            max_virtual_time: Duration::from_secs(24 * 60 * 60),
            builder: Builder::default(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum SimConfigError {
    Rate { name: &'static str, value: f64 },
    DelayRange,
    Build(BuildError),
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::Rate { name, value } => {
                write!(f, "{} must lie in [0, 1], got {}", name, value)
            }
            SimConfigError::DelayRange => write!(f, "min_delay exceeds max_delay"),
            SimConfigError::Build(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SimConfigError {}

enum Event {
    MessageFromApplication(Vec<u8>),
    PacketToReceiver(Vec<u8>),
    PacketToSender(Vec<u8>),
    SenderTimer { generation: u64 },
}

struct World {
    epoch: Instant,
    clock: Duration,
    // ties broken by scheduling order
    events: BTreeMap<(Duration, u64), Event>,
    next_order: u64,
    channel: Channel,
    // generation of the running sender timer; stopped timers leave stale events behind
    timer: Option<u64>,
    next_generation: u64,
    delivered: Vec<Vec<u8>>,
}

impl World {
    fn schedule(&mut self, after: Duration, event: Event) {
        self.events.insert((self.clock + after, self.next_order), event);
        self.next_order += 1;
    }

    fn send(&mut self, packet: Vec<u8>, to_receiver: bool) {
        for (delay, copy) in self.channel.transmit(packet) {
            let event = if to_receiver {
                Event::PacketToReceiver(copy)
            } else {
                Event::PacketToSender(copy)
            };
            self.schedule(delay, event);
        }
    }
}

struct SenderSide<'a>(&'a mut World);

impl PhysicalTimer for SenderSide<'_> {
    fn start_timer(&mut self, timeout: Duration) {
        if self.0.timer.is_some() {
            warn!("sender timer restarted while running");
        }
        let generation = self.0.next_generation;
        self.0.next_generation += 1;
        self.0.timer = Some(generation);
        self.0.schedule(timeout, Event::SenderTimer { generation });
    }

    fn stop_timer(&mut self) {
        self.0.timer = None;
    }
}

impl SenderIo for SenderSide<'_> {
    fn deliver_to_network(&mut self, packet: Vec<u8>) {
        self.0.send(packet, true);
    }

    fn now(&self) -> Instant {
        self.0.epoch + self.0.clock
    }
}

struct ReceiverSide<'a>(&'a mut World);

impl ReceiverIo for ReceiverSide<'_> {
    fn deliver_to_network(&mut self, packet: Vec<u8>) {
        self.0.send(packet, false);
    }

    fn deliver_to_application(&mut self, message: Vec<u8>) {
        self.0.delivered.push(message);
    }
}

pub struct Simulation {
    sender: Sender,
    receiver: Receiver,
    world: World,
    message_interval: Duration,
    max_virtual_time: Duration,
}

pub struct Report {
    /// Payloads in the order the receiver handed them up.
    pub delivered: Vec<Vec<u8>>,
    /// Whether the sender ended with nothing queued or unacknowledged.
    pub completed: bool,
    pub elapsed: Duration,
    pub sender: layer::SenderStat,
    pub receiver: layer::ReceiverStat,
    pub channel: ChannelStat,
}

impl Simulation {
    /// Feeds `messages` to the sender and runs until the network goes quiet.
    pub fn run(mut self, messages: Vec<Vec<u8>>) -> Report {
        for (i, message) in messages.into_iter().enumerate() {
            self.world.schedule(
                self.message_interval * i as u32,
                Event::MessageFromApplication(message),
            );
        }

        while let Some(((at, _), event)) = self.world.events.pop_first() {
            if let Event::SenderTimer { generation } = event {
                if self.world.timer != Some(generation) {
                    continue;
                }
                self.world.timer = None;
            }
            if at > self.max_virtual_time {
                warn!(elapsed_ms = at.as_millis() as u64, "virtual time limit reached");
                break;
            }
            self.world.clock = at;

            match event {
                Event::MessageFromApplication(message) => {
                    debug!(len = message.len(), "message from application");
                    self.sender
                        .on_message_from_application(&mut SenderSide(&mut self.world), &message);
                }
                Event::PacketToReceiver(packet) => {
                    self.receiver
                        .on_packet_from_network(&mut ReceiverSide(&mut self.world), &packet);
                }
                Event::PacketToSender(packet) => {
                    self.sender
                        .on_packet_from_network(&mut SenderSide(&mut self.world), &packet);
                }
                Event::SenderTimer { .. } => {
                    self.sender.on_timer_fired(&mut SenderSide(&mut self.world));
                }
            }
        }

        let completed = self.sender.is_idle();
        let report = Report {
            delivered: self.world.delivered,
            completed,
            elapsed: self.world.clock,
            sender: self.sender.finalize(),
            receiver: self.receiver.finalize(),
            channel: self.world.channel.stat(),
        };
        info!(
            completed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            delivered = report.delivered.len(),
            "simulation finished"
        );
        report
    }
}
