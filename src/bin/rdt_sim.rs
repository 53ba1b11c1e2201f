use std::{process, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rdt::{layer::Builder, sim::SimConfig};

const SEED: u64 = 0x5eed;
const MESSAGES: usize = 500;
const MAX_MESSAGE_LEN: usize = 1024;
const LOSS_RATE: f64 = 0.15;
const CORRUPT_RATE: f64 = 0.15;
const DUPLICATE_RATE: f64 = 0.05;
const MESSAGE_INTERVAL_MS: u64 = 100;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // messages
    let mut rng = StdRng::seed_from_u64(SEED);
    let messages: Vec<Vec<u8>> = (0..MESSAGES)
        .map(|_| {
            let len = rng.gen_range(1..=MAX_MESSAGE_LEN);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect();
    let expected = messages.concat();

    // simulation
    let simulation = match (SimConfig {
        seed: SEED,
        loss_rate: LOSS_RATE,
        corrupt_rate: CORRUPT_RATE,
        duplicate_rate: DUPLICATE_RATE,
        message_interval: Duration::from_millis(MESSAGE_INTERVAL_MS),
        builder: Builder::default(),
        ..SimConfig::default()
    })
    .build()
    {
        Ok(x) => x,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            process::exit(2);
        }
    };
    let report = simulation.run(messages);

    // stat
    println!("{:#?}", report.channel);
    println!("{:#?}", report.sender);
    println!("{:#?}", report.receiver);
    println!("virtual time: {:?}", report.elapsed);

    let delivered = report.delivered.concat();
    if !report.completed || delivered != expected {
        eprintln!(
            "transfer failed: {} of {} bytes delivered",
            delivered.len(),
            expected.len()
        );
        process::exit(1);
    }
    println!("{} bytes delivered intact", delivered.len());
}
