//! LocusQ companion daemon
//!
//! Streams head-pose telemetry over UDP to a LocusQ spatial audio engine,
//! from either a serial head tracker or a built-in synthetic orbit
//! generator.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic head orbit to a local engine, until Ctrl-C
//! locusq-companion
//!
//! # 30 seconds of synthetic motion to another machine
//! locusq-companion --host 192.168.1.40 --seconds 30
//!
//! # Live head tracker on a serial port
//! locusq-companion --mode device --serial-port /dev/ttyUSB0
//! ```

use std::env;
use std::process;
use std::str::FromStr;

use locusq_companion::CompanionApp;
use locusq_companion::config::{AppConfig, SourceMode};

fn main() {
    let args: Vec<String> = env::args().collect();
    let overrides = match parse_args(&args) {
        Ok(Some(overrides)) => overrides,
        Ok(None) => {
            print_usage(&args[0]);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(&args[0]);
            process::exit(2);
        }
    };

    let default_filter = if overrides.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match build_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    // Validation failures are configuration mistakes, not runtime faults
    let mut app = match CompanionApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = app.install_signal_handler() {
        log::error!("{}", e);
        process::exit(1);
    }

    if let Err(e) = app.run() {
        log::error!("{}", e);
        process::exit(1);
    }
}

/// Command line overrides, applied on top of the config file (if any)
#[derive(Default)]
struct CliOverrides {
    config_path: Option<String>,
    mode: Option<SourceMode>,
    host: Option<String>,
    port: Option<u16>,
    hz: Option<u32>,
    seconds: Option<u64>,
    wire_version: Option<u32>,
    serial_port: Option<String>,
    baud: Option<u32>,
    yaw_amplitude: Option<f64>,
    pitch_amplitude: Option<f64>,
    roll_amplitude: Option<f64>,
    yaw_frequency: Option<f64>,
    jitter_deg: Option<f64>,
    seed: Option<u64>,
    verbose: bool,
}

/// Parse the command line. `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<CliOverrides>, String> {
    let mut overrides = CliOverrides::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                overrides.config_path = Some(take_value(args, &mut i, "--config")?.to_string());
            }
            "--mode" | "-m" => {
                let value = take_value(args, &mut i, "--mode")?;
                overrides.mode = Some(match value {
                    "synthetic" => SourceMode::Synthetic,
                    "device" => SourceMode::Device,
                    _ => {
                        return Err(format!(
                            "Invalid mode: {} (use synthetic or device)",
                            value
                        ));
                    }
                });
            }
            "--host" => {
                overrides.host = Some(take_value(args, &mut i, "--host")?.to_string());
            }
            "--port" | "-p" => {
                overrides.port = Some(parse_value(args, &mut i, "--port")?);
            }
            "--hz" => {
                overrides.hz = Some(parse_value(args, &mut i, "--hz")?);
            }
            "--seconds" | "-s" => {
                overrides.seconds = Some(parse_value(args, &mut i, "--seconds")?);
            }
            "--wire-version" => {
                overrides.wire_version = Some(parse_value(args, &mut i, "--wire-version")?);
            }
            "--serial-port" => {
                overrides.serial_port = Some(take_value(args, &mut i, "--serial-port")?.to_string());
            }
            "--baud" => {
                overrides.baud = Some(parse_value(args, &mut i, "--baud")?);
            }
            "--yaw-amplitude" => {
                overrides.yaw_amplitude = Some(parse_value(args, &mut i, "--yaw-amplitude")?);
            }
            "--pitch-amplitude" => {
                overrides.pitch_amplitude = Some(parse_value(args, &mut i, "--pitch-amplitude")?);
            }
            "--roll-amplitude" => {
                overrides.roll_amplitude = Some(parse_value(args, &mut i, "--roll-amplitude")?);
            }
            "--yaw-frequency" => {
                overrides.yaw_frequency = Some(parse_value(args, &mut i, "--yaw-frequency")?);
            }
            "--jitter-deg" => {
                overrides.jitter_deg = Some(parse_value(args, &mut i, "--jitter-deg")?);
            }
            "--seed" => {
                overrides.seed = Some(parse_value(args, &mut i, "--seed")?);
            }
            "--verbose" | "-v" => {
                overrides.verbose = true;
            }
            "--help" | "-h" => {
                return Ok(None);
            }
            _ => {
                return Err(format!("Unknown argument: {}", args[i]));
            }
        }
        i += 1;
    }

    Ok(Some(overrides))
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    if *i >= args.len() {
        return Err(format!("Missing value for {}", flag));
    }
    Ok(&args[*i])
}

fn parse_value<T: FromStr>(args: &[String], i: &mut usize, flag: &str) -> Result<T, String> {
    let raw = take_value(args, i, flag)?;
    raw.parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, raw))
}

/// Load the config file (or defaults) and apply CLI overrides on top
fn build_config(overrides: &CliOverrides) -> Result<AppConfig, String> {
    let mut config = match &overrides.config_path {
        Some(path) => AppConfig::from_file(path)
            .map_err(|e| format!("cannot load config {}: {}", path, e))?,
        None => AppConfig::default(),
    };

    if let Some(mode) = overrides.mode {
        config.telemetry.mode = mode;
    }
    if let Some(host) = &overrides.host {
        config.telemetry.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.telemetry.port = port;
    }
    if let Some(hz) = overrides.hz {
        config.telemetry.hz = hz;
    }
    if let Some(seconds) = overrides.seconds {
        config.telemetry.seconds = seconds;
    }
    if let Some(wire_version) = overrides.wire_version {
        config.telemetry.wire_version = wire_version;
    }
    if let Some(serial_port) = &overrides.serial_port {
        config.device.serial_port = serial_port.clone();
    }
    if let Some(baud) = overrides.baud {
        config.device.baud = baud;
    }
    if let Some(yaw) = overrides.yaw_amplitude {
        config.synthetic.yaw_amplitude_deg = yaw;
    }
    if let Some(pitch) = overrides.pitch_amplitude {
        config.synthetic.pitch_amplitude_deg = pitch;
    }
    if let Some(roll) = overrides.roll_amplitude {
        config.synthetic.roll_amplitude_deg = roll;
    }
    if let Some(freq) = overrides.yaw_frequency {
        config.synthetic.yaw_frequency_hz = freq;
    }
    if let Some(jitter) = overrides.jitter_deg {
        config.synthetic.jitter_stddev_deg = jitter;
    }
    if let Some(seed) = overrides.seed {
        config.synthetic.seed = seed;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Usage: {} [OPTIONS]

Stream head-pose telemetry to a LocusQ audio engine over UDP.

OPTIONS:
    -c, --config <FILE>          TOML configuration file (flags override it)
    -m, --mode <MODE>            Motion source: synthetic or device (default: synthetic)
        --host <ADDR>            Destination IPv4 address (default: 127.0.0.1)
    -p, --port <PORT>            Destination UDP port (default: 19765)
        --hz <RATE>              Samples per second (default: 60)
    -s, --seconds <SECS>         Run duration, 0 = until Ctrl-C (default: 0)
        --wire-version <N>       Pose packet layout, 1 or 2 (default: 2)
        --serial-port <PATH>     Head-tracker serial device (default: /dev/ttyUSB0)
        --baud <RATE>            Serial baud rate (default: 115200)
        --yaw-amplitude <DEG>    Synthetic yaw swing (default: 35)
        --pitch-amplitude <DEG>  Synthetic pitch swing (default: 10)
        --roll-amplitude <DEG>   Synthetic roll swing (default: 5)
        --yaw-frequency <HZ>     Synthetic orbit frequency (default: 0.25)
        --jitter-deg <STDDEV>    Gaussian angle jitter stddev (default: 0)
        --seed <SEED>            Jitter RNG seed (default: 0)
    -v, --verbose                Debug-level logging
    -h, --help                   Show this help message

EXAMPLES:
    # Synthetic head orbit to a local engine for 30 seconds
    {} --seconds 30

    # Live head tracker, streaming to another machine
    {} --mode device --serial-port /dev/ttyUSB0 --host 192.168.1.40
"#,
        program, program, program
    );
}
