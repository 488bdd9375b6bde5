//! Telemetry pipeline
//!
//! Glues a motion source to the UDP sender: every sample becomes exactly
//! one pose packet, stamped with the next sequence number, in arrival
//! order. Send failures after startup never kill the stream; they are
//! counted and surfaced on a bounded side channel for whoever wants to
//! watch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};

use crate::core::source::{MotionSource, SampleCallback};
use crate::core::types::MotionSample;
use crate::error::Result;
use crate::streaming::packet::{PosePacket, WireVersion};
use crate::streaming::udp_sender::UdpPoseSender;

/// First sequence number assigned to a packet
pub const FIRST_SEQUENCE: u32 = 1;

/// Side-channel capacity; overflow drops events, counters stay exact
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// One non-fatal send failure, as seen by the side channel
#[derive(Debug, Clone)]
pub struct SendFailure {
    /// Sequence number of the packet that failed
    pub sequence: u32,
    /// Rendered send error
    pub error: String,
}

/// Monotonic packet numbering with 32-bit wraparound.
///
/// Starts at [`FIRST_SEQUENCE`] and wraps through 0 at the u32 boundary;
/// receivers treat a large backwards jump as a stream restart.
struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    fn new() -> Self {
        Self {
            next: FIRST_SEQUENCE,
        }
    }

    fn next(&mut self) -> u32 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        seq
    }
}

/// Counters shared between the sampling thread and the run loop
#[derive(Default)]
struct Counters {
    packets_sent: AtomicU64,
    send_errors: AtomicU64,
}

/// Point-in-time pipeline statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub packets_sent: u64,
    pub send_errors: u64,
}

/// Build the outgoing packet for one sample.
///
/// v1 has no room for angular rate or location, so those fields drop; v2
/// carries them with the rate-present flag tracking the sample's option.
fn build_packet(version: WireVersion, sample: &MotionSample, sequence: u32) -> PosePacket {
    match version {
        WireVersion::V1 => PosePacket::v1(sample.quat, sample.timestamp_ms, sequence),
        WireVersion::V2 => PosePacket::v2(
            sample.quat,
            sample.timestamp_ms,
            sequence,
            sample.angular_rate,
            sample.location,
        ),
    }
}

/// Motion source → wire format → UDP sender.
pub struct TelemetryPipeline {
    source: Box<dyn MotionSource>,
    sender: Arc<UdpPoseSender>,
    wire_version: WireVersion,
    counters: Arc<Counters>,
    failure_tx: Sender<SendFailure>,
    failure_rx: Receiver<SendFailure>,
}

impl TelemetryPipeline {
    pub fn new(
        source: Box<dyn MotionSource>,
        sender: UdpPoseSender,
        wire_version: WireVersion,
    ) -> Self {
        let (failure_tx, failure_rx) = bounded(FAILURE_CHANNEL_CAPACITY);
        Self {
            source,
            sender: Arc::new(sender),
            wire_version,
            counters: Arc::new(Counters::default()),
            failure_tx,
            failure_rx,
        }
    }

    /// Start the source and begin streaming.
    ///
    /// A source that cannot start is fatal and propagates; everything after
    /// this point is best-effort.
    pub fn start(&mut self) -> Result<()> {
        let sender = Arc::clone(&self.sender);
        let counters = Arc::clone(&self.counters);
        let failure_tx = self.failure_tx.clone();
        let wire_version = self.wire_version;
        let mut sequence = SequenceCounter::new();

        let callback: SampleCallback = Box::new(move |sample| {
            let seq = sequence.next();
            let packet = build_packet(wire_version, &sample, seq);
            let encoded = packet.encode();

            match sender.send(&encoded) {
                Ok(()) => {
                    counters.packets_sent.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "packet seq={} ts_ms={} q=[{:.6},{:.6},{:.6},{:.6}] bytes={}",
                        seq,
                        sample.timestamp_ms,
                        sample.quat.x,
                        sample.quat.y,
                        sample.quat.z,
                        sample.quat.w,
                        encoded.len()
                    );
                }
                Err(e) => {
                    counters.send_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("send failed for packet seq={}: {}", seq, e);
                    // Drop the event rather than block the sampling thread
                    // when nobody is draining the channel
                    let _ = failure_tx.try_send(SendFailure {
                        sequence: seq,
                        error: e.to_string(),
                    });
                }
            }
        });

        self.source.start(callback)
    }

    /// Stop sampling. Idempotent; no packets are produced after return.
    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// Name of the underlying motion source
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// True while the source is delivering samples
    pub fn is_active(&self) -> bool {
        self.source.is_active()
    }

    /// Destination the sender is bound to
    pub fn dest(&self) -> std::net::SocketAddrV4 {
        self.sender.dest()
    }

    /// Receiver end of the send-failure side channel
    pub fn failures(&self) -> &Receiver<SendFailure> {
        &self.failure_rx
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            packets_sent: self.counters.packets_sent.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Quaternion, SensorLocation};
    use crate::error::Error;
    use std::net::UdpSocket;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Source that delivers a fixed set of samples synchronously in start()
    struct ScriptedSource {
        samples: Vec<MotionSample>,
        started: bool,
    }

    impl ScriptedSource {
        fn new(samples: Vec<MotionSample>) -> Self {
            Self {
                samples,
                started: false,
            }
        }
    }

    impl MotionSource for ScriptedSource {
        fn start(&mut self, mut callback: SampleCallback) -> Result<()> {
            self.started = true;
            for sample in self.samples.drain(..) {
                callback(sample);
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.started = false;
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_active(&self) -> bool {
            self.started
        }
    }

    /// Source whose hardware is always absent
    struct UnavailableSource;

    impl MotionSource for UnavailableSource {
        fn start(&mut self, _callback: SampleCallback) -> Result<()> {
            Err(Error::SourceUnavailable {
                reason: "no motion hardware".to_string(),
            })
        }

        fn stop(&mut self) {}

        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn is_active(&self) -> bool {
            false
        }
    }

    fn stop_token() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    fn sample_at(ts: u64) -> MotionSample {
        MotionSample {
            quat: Quaternion::identity(),
            timestamp_ms: ts,
            angular_rate: Some([0.1, 0.2, 0.3]),
            location: SensorLocation::LeftEar,
        }
    }

    #[test]
    fn test_sequence_counter_starts_at_one_and_wraps() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);

        counter.next = u32::MAX;
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), 0, "sequence must wrap to 0, not saturate");
        assert_eq!(counter.next(), 1);
    }

    #[test]
    fn test_build_packet_version_mapping() {
        let sample = sample_at(777);

        match build_packet(WireVersion::V1, &sample, 5) {
            PosePacket::V1(p) => {
                assert_eq!(p.sequence, 5);
                assert_eq!(p.timestamp_ms, 777);
            }
            other => panic!("expected v1, got {:?}", other),
        }

        match build_packet(WireVersion::V2, &sample, 6) {
            PosePacket::V2(p) => {
                assert!(p.has_angular_rate());
                assert_eq!(p.sensor_location(), SensorLocation::LeftEar);
                assert_eq!(p.angular_rate, [0.1, 0.2, 0.3]);
            }
            other => panic!("expected v2, got {:?}", other),
        }

        let mut bare = sample_at(778);
        bare.angular_rate = None;
        match build_packet(WireVersion::V2, &bare, 7) {
            PosePacket::V2(p) => {
                assert!(!p.has_angular_rate());
                assert_eq!(p.angular_rate, [0.0; 3]);
            }
            other => panic!("expected v2, got {:?}", other),
        }
    }

    #[test]
    fn test_packets_arrive_in_order_with_sequential_numbers() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let samples: Vec<_> = (0..3).map(|i| sample_at(1000 + i)).collect();
        let source = Box::new(ScriptedSource::new(samples));
        let sender = UdpPoseSender::new("127.0.0.1", port, stop_token()).unwrap();
        let mut pipeline = TelemetryPipeline::new(source, sender, WireVersion::V2);

        pipeline.start().unwrap();

        let mut buf = [0u8; 64];
        for expected_seq in 1..=3u32 {
            let (len, _) = receiver.recv_from(&mut buf).unwrap();
            let packet = PosePacket::decode(&buf[..len]).unwrap();
            assert_eq!(packet.sequence(), expected_seq);
            assert_eq!(packet.version(), 2);
        }

        let stats = pipeline.stats();
        assert_eq!(stats.packets_sent, 3);
        assert_eq!(stats.send_errors, 0);
        pipeline.stop();
    }

    #[test]
    fn test_send_failures_are_nonfatal_and_reported() {
        let mut sender = UdpPoseSender::new("127.0.0.1", 19765, stop_token()).unwrap();
        sender.close();

        let samples: Vec<_> = (0..5).map(|i| sample_at(i)).collect();
        let source = Box::new(ScriptedSource::new(samples));
        let mut pipeline = TelemetryPipeline::new(source, sender, WireVersion::V1);

        // All sends fail, but start() itself must succeed
        pipeline.start().unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.send_errors, 5);

        let failures: Vec<_> = pipeline.failures().try_iter().collect();
        assert_eq!(failures.len(), 5);
        assert_eq!(failures[0].sequence, 1, "failed packets keep their numbers");
        assert_eq!(failures[4].sequence, 5);
    }

    #[test]
    fn test_failure_channel_overflow_drops_events_not_counts() {
        let mut sender = UdpPoseSender::new("127.0.0.1", 19765, stop_token()).unwrap();
        sender.close();

        let samples: Vec<_> = (0..200).map(|i| sample_at(i)).collect();
        let source = Box::new(ScriptedSource::new(samples));
        let mut pipeline = TelemetryPipeline::new(source, sender, WireVersion::V2);
        pipeline.start().unwrap();

        assert_eq!(pipeline.stats().send_errors, 200, "every failure is counted");
        let drained = pipeline.failures().try_iter().count();
        assert_eq!(
            drained, FAILURE_CHANNEL_CAPACITY,
            "side channel holds at most its capacity"
        );
    }

    #[test]
    fn test_unavailable_source_is_fatal() {
        let sender = UdpPoseSender::new("127.0.0.1", 19765, stop_token()).unwrap();
        let mut pipeline =
            TelemetryPipeline::new(Box::new(UnavailableSource), sender, WireVersion::V2);

        let err = pipeline.start().unwrap_err();
        assert!(
            matches!(err, Error::SourceUnavailable { .. }),
            "got {:?}",
            err
        );
    }
}
