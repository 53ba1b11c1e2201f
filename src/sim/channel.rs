use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::trace;

/// An unreliable link: every packet may be lost, damaged, duplicated, and
/// is delayed by a random amount, which reorders packets.
pub struct Channel {
    rng: StdRng,
    loss_rate: f64,
    corrupt_rate: f64,
    duplicate_rate: f64,
    min_delay: Duration,
    max_delay: Duration,
    stat: ChannelStat,
}

pub struct ChannelBuilder {
    pub seed: u64,
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub duplicate_rate: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ChannelBuilder {
    #[must_use]
    pub fn build(self) -> Channel {
        let this = Channel {
            rng: StdRng::seed_from_u64(self.seed),
            loss_rate: self.loss_rate,
            corrupt_rate: self.corrupt_rate,
            duplicate_rate: self.duplicate_rate,
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            stat: ChannelStat::default(),
        };
        this.check_rep();
        this
    }
}

impl Channel {
    fn check_rep(&self) {
        for rate in [self.loss_rate, self.corrupt_rate, self.duplicate_rate] {
            assert!((0.0..=1.0).contains(&rate));
        }
        assert!(self.min_delay <= self.max_delay);
    }

    #[must_use]
    pub fn stat(&self) -> ChannelStat {
        self.stat.clone()
    }

    /// Decides the fate of `packet`: zero, one or two copies, each with the
    /// delay after which it arrives.
    pub fn transmit(&mut self, packet: Vec<u8>) -> Vec<(Duration, Vec<u8>)> {
        self.stat.packets += 1;
        if self.rng.gen_bool(self.loss_rate) {
            self.stat.lost += 1;
            trace!(len = packet.len(), "lost");
            return Vec::new();
        }

        let mut copies = vec![packet];
        if self.rng.gen_bool(self.duplicate_rate) {
            self.stat.duplicated += 1;
            copies.push(copies[0].clone());
        }

        copies
            .into_iter()
            .map(|mut copy| {
                if !copy.is_empty() && self.rng.gen_bool(self.corrupt_rate) {
                    let i = self.rng.gen_range(0..copy.len());
                    copy[i] ^= 1 << self.rng.gen_range(0..8);
                    self.stat.corrupted += 1;
                    trace!(byte = i, "corrupted");
                }
                (self.delay(), copy)
            })
            .collect()
    }

    fn delay(&mut self) -> Duration {
        let min = self.min_delay.as_nanos() as u64;
        let max = self.max_delay.as_nanos() as u64;
        Duration::from_nanos(self.rng.gen_range(min..=max))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelStat {
    pub packets: u64,
    pub lost: u64,
    pub corrupted: u64,
    pub duplicated: u64,
}
