//! Companion runtime
//!
//! Owns the wiring for one streaming session: stop signal, motion source,
//! UDP sender, and the telemetry pipeline. The supervision loop sleeps in
//! short slices so both the duration budget and the stop token stay
//! responsive while the source thread does the real work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::pipeline::{PipelineStats, TelemetryPipeline};
use crate::sources::create_source;
use crate::streaming::UdpPoseSender;

/// Wake interval of the supervision loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between periodic throughput log lines
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured `seconds` budget elapsed
    DurationComplete,
    /// The stop token was raised (Ctrl-C or programmatic)
    SignalStop,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::DurationComplete => "duration_complete",
            StopReason::SignalStop => "signal_stop",
        }
    }
}

/// Final accounting for one streaming session
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reason: StopReason,
    pub stats: PipelineStats,
    pub elapsed: Duration,
}

/// One configured companion process.
///
/// `run` streams until done; the stop token can be raised from a signal
/// handler or any other thread.
pub struct CompanionApp {
    config: AppConfig,
    stop: Arc<AtomicBool>,
}

impl CompanionApp {
    /// Validate the configuration and build an idle app
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared stop token.
    ///
    /// Raising it ends `run` at the next poll and aborts any in-flight
    /// send retry sequence.
    pub fn stop_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Route Ctrl-C into the stop token. Call at most once per process.
    pub fn install_signal_handler(&self) -> Result<()> {
        let stop = Arc::clone(&self.stop);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            stop.store(true, Ordering::SeqCst);
        })
        .map_err(|e| Error::Config(format!("cannot install Ctrl-C handler: {}", e)))
    }

    /// Stream until the duration budget elapses or the stop token rises.
    pub fn run(&mut self) -> Result<RunReport> {
        let telemetry = self.config.telemetry.clone();
        let wire_version = self.config.wire_version()?;

        info!(
            "companion_start mode={} host={} port={} hz={} seconds={} wire_version={}",
            telemetry.mode.as_str(),
            telemetry.host,
            telemetry.port,
            telemetry.hz,
            telemetry.seconds,
            wire_version.as_u32()
        );

        let source = create_source(&self.config);
        let sender = UdpPoseSender::new(&telemetry.host, telemetry.port, Arc::clone(&self.stop))?;
        let mut pipeline = TelemetryPipeline::new(source, sender, wire_version);
        pipeline.start()?;

        let started = Instant::now();
        let deadline =
            (telemetry.seconds > 0).then(|| started + Duration::from_secs(telemetry.seconds));
        match telemetry.seconds {
            0 => info!("streaming until stopped (Ctrl-C)"),
            secs => info!("streaming for {} seconds", secs),
        }

        let mut last_report = Instant::now();
        let reason = loop {
            if self.stop.load(Ordering::Relaxed) {
                break StopReason::SignalStop;
            }
            if let Some(end) = deadline
                && Instant::now() >= end
            {
                break StopReason::DurationComplete;
            }

            drain_failures(&pipeline);

            if last_report.elapsed() >= STATS_INTERVAL {
                let stats = pipeline.stats();
                let elapsed = started.elapsed().as_secs_f64();
                info!(
                    "streaming: {} packets ({:.1} Hz), {} send errors, {:.0}s elapsed",
                    stats.packets_sent,
                    stats.packets_sent as f64 / elapsed,
                    stats.send_errors,
                    elapsed
                );
                last_report = Instant::now();
            }

            thread::sleep(POLL_INTERVAL);
        };

        pipeline.stop();
        drain_failures(&pipeline);

        let stats = pipeline.stats();
        let elapsed = started.elapsed();
        if reason == StopReason::SignalStop {
            info!(
                "companion_shutdown reason=signal packets_sent={}",
                stats.packets_sent
            );
        }
        info!(
            "companion_done mode={} packets_sent={} send_errors={} reason={}",
            telemetry.mode.as_str(),
            stats.packets_sent,
            stats.send_errors,
            reason.as_str()
        );

        Ok(RunReport {
            reason,
            stats,
            elapsed,
        })
    }
}

/// Consume queued send-failure events.
///
/// Each failure was already logged at send time; this keeps the side
/// channel from filling and replays the detail at debug level.
fn drain_failures(pipeline: &TelemetryPipeline) {
    while let Ok(failure) = pipeline.failures().try_recv() {
        debug!(
            "send failure recorded seq={}: {}",
            failure.sequence, failure.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceMode;
    use std::net::UdpSocket;

    fn loopback_config(port: u16, seconds: u64) -> AppConfig {
        let mut config = AppConfig::default();
        config.telemetry.mode = SourceMode::Synthetic;
        config.telemetry.host = "127.0.0.1".to_string();
        config.telemetry.port = port;
        config.telemetry.hz = 50;
        config.telemetry.seconds = seconds;
        config
    }

    #[test]
    fn test_stop_reason_strings() {
        assert_eq!(StopReason::DurationComplete.as_str(), "duration_complete");
        assert_eq!(StopReason::SignalStop.as_str(), "signal_stop");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.telemetry.hz = 0;
        assert!(CompanionApp::new(config).is_err());
    }

    #[test]
    fn test_run_ends_on_duration() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut app = CompanionApp::new(loopback_config(port, 1)).unwrap();
        let report = app.run().unwrap();

        assert_eq!(report.reason, StopReason::DurationComplete);
        assert!(
            report.stats.packets_sent > 10,
            "expected a ~1s burst of packets, got {}",
            report.stats.packets_sent
        );
        assert!(report.elapsed >= Duration::from_secs(1));
    }

    #[test]
    fn test_run_ends_on_stop_token() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut app = CompanionApp::new(loopback_config(port, 0)).unwrap();
        let stop = app.stop_token();
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            stop.store(true, Ordering::SeqCst);
        });

        let report = app.run().unwrap();
        raiser.join().unwrap();

        assert_eq!(report.reason, StopReason::SignalStop);
        assert!(report.stats.packets_sent > 0);
    }
}
