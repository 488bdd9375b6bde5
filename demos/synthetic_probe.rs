//! Probe the synthetic motion source without any network I/O.
//!
//! Runs the orbit generator for a short burst, prints the samples as a
//! table, and hex-dumps the wire encoding of the first one. Useful for
//! eyeballing amplitude/frequency settings before pointing the companion
//! at a real engine.
//!
//! Usage:
//!   cargo run --example synthetic_probe
//!   cargo run --example synthetic_probe -- --hz 10 --seconds 2

use std::sync::mpsc;
use std::time::Duration;

use locusq_companion::sources::{SyntheticConfig, SyntheticSource};
use locusq_companion::streaming::PosePacket;
use locusq_companion::{MotionSample, MotionSource};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut hz: u32 = 10;
    let mut seconds: u64 = 2;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--hz" if i + 1 < args.len() => {
                i += 1;
                hz = args[i].parse().unwrap_or(hz);
            }
            "--seconds" if i + 1 < args.len() => {
                i += 1;
                seconds = args[i].parse().unwrap_or(seconds);
            }
            _ => {
                eprintln!("Usage: synthetic_probe [--hz <RATE>] [--seconds <SECS>]");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let config = SyntheticConfig::default();
    println!(
        "Synthetic orbit: yaw ±{}° @ {} Hz, pitch ±{}°, roll ±{}°",
        config.yaw_amplitude_deg,
        config.yaw_frequency_hz,
        config.pitch_amplitude_deg,
        config.roll_amplitude_deg
    );
    println!("Sampling {} Hz for {} s\n", hz, seconds);

    // Collect samples through the same callback seam the pipeline uses
    let (tx, rx) = mpsc::channel::<MotionSample>();
    let mut source = SyntheticSource::new(config, hz);
    source
        .start(Box::new(move |sample| {
            let _ = tx.send(sample);
        }))
        .expect("synthetic source failed to start");

    std::thread::sleep(Duration::from_secs(seconds));
    source.stop();

    let samples: Vec<MotionSample> = rx.try_iter().collect();

    println!("  #   quat (x, y, z, w)                      rate rad/s (r, p, y)");
    println!("  --- -------------------------------------- ---------------------");
    for (i, sample) in samples.iter().enumerate() {
        let rate = sample.angular_rate.unwrap_or([0.0; 3]);
        println!(
            "  {:>3} ({:+.4}, {:+.4}, {:+.4}, {:+.4})  ({:+.3}, {:+.3}, {:+.3})",
            i, sample.quat.x, sample.quat.y, sample.quat.z, sample.quat.w, rate[0], rate[1], rate[2]
        );
    }
    println!("\n{} samples collected", samples.len());

    if let Some(first) = samples.first() {
        let packet = PosePacket::v2(
            first.quat,
            first.timestamp_ms,
            1,
            first.angular_rate,
            first.location,
        );
        let encoded = packet.encode();
        println!("\nFirst sample as wire packet ({} bytes):", encoded.len());
        for chunk in encoded.chunks(16) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            println!("  {}", hex.join(" "));
        }
    }
}
