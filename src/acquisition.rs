use std::fmt;

use crate::profile::DeviceProfile;
use crate::session::DeviceSession;
use crate::trigger_config::{encode_trigger, TriggerError, TriggerSpec};
use crate::waveforms::{AcquisitionMode, TriggerSource, WaveformsApi, WaveformsError};

/// One batch of packed logic samples handed to the consumer.
///
/// The buffer is borrowed for the duration of the emit call; a consumer
/// that wants to keep the data copies it. Each sample is `unit_size` bytes
/// wide, one bit per channel, least significant bit = channel 0.
#[derive(Debug)]
pub struct LogicPacket<'a> {
    pub data: &'a [u8],
    pub unit_size: usize,
}

impl LogicPacket<'_> {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.data.len() / self.unit_size
    }

    /// Iterate the packed samples in capture order. Assumes the two-byte
    /// little-endian unit this device produces.
    pub fn samples(&self) -> impl Iterator<Item = u16> + '_ {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Session-scoped packet sink, the consumer side of an acquisition.
///
/// `begin_stream` and `end_stream` are called once each around a
/// start/stop pair; `logic_samples` any number of times in between.
pub trait LogicSink {
    fn begin_stream(&mut self);
    fn logic_samples(&mut self, packet: &LogicPacket<'_>);
    fn end_stream(&mut self);
}

/// Verdict of one pump invocation for the driving scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep invoking the pump on its period.
    Continue,
    /// No stream is running any more; the scheduler should deregister the
    /// pump.
    Stop,
    /// The configured sample limit has been reached; the caller should stop
    /// the acquisition.
    Complete,
}

/// Device-programming stage, named so a failed start can say where it died.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStage {
    AcquisitionMode,
    SampleRateDivider,
    SampleFormat,
    TriggerPosition,
    TriggerSource,
    TriggerMasks,
    Run,
}

impl fmt::Display for StartStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartStage::AcquisitionMode => "acquisition mode",
            StartStage::SampleRateDivider => "sample-rate divider",
            StartStage::SampleFormat => "sample format",
            StartStage::TriggerPosition => "trigger position",
            StartStage::TriggerSource => "trigger source",
            StartStage::TriggerMasks => "trigger masks",
            StartStage::Run => "configure-and-run",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("device must be opened before this operation")]
    NotOpen,

    #[error("no sample rate configured")]
    RateNotConfigured,

    #[error("device programming failed at the {stage} stage: {source}")]
    Device {
        stage: StartStage,
        source: WaveformsError,
    },

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("device query failed: {0}")]
    Query(#[from] WaveformsError),
}

/// Drives one device's record-mode acquisition: programs the instrument,
/// then pumps sample batches to the sink as the caller's scheduler invokes
/// [`poll`](Self::poll) on the profile's period.
pub struct Acquisition {
    streaming: bool,
    transfer: Vec<u8>,
    samples_emitted: u64,
    stream_faults: u64,
    sample_limit: Option<u64>,
}

impl Acquisition {
    pub fn new(profile: &DeviceProfile) -> Self {
        Self {
            streaming: false,
            transfer: vec![0u8; profile.transfer_buffer_bytes],
            samples_emitted: 0,
            stream_faults: 0,
            sample_limit: None,
        }
    }

    /// Stop the stream once this many samples have been delivered. Without
    /// a limit the capture only ends on an explicit [`stop`](Self::stop).
    pub fn with_sample_limit(mut self, limit: u64) -> Self {
        self.sample_limit = Some(limit);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Number of samples handed to the sink since the last start.
    pub fn samples_emitted(&self) -> u64 {
        self.samples_emitted
    }

    /// Number of polls that reported lost or corrupt samples since the last
    /// start. The stream keeps running through these; this counter is the
    /// side channel for callers that care.
    pub fn stream_faults(&self) -> u64 {
        self.stream_faults
    }

    /// Program the device and start capturing.
    ///
    /// The session must be open with a sample rate configured; neither
    /// precondition failing issues any native call. The programming
    /// sequence short-circuits on the first failing stage and performs no
    /// rollback - the device is left as the failed call left it, and the
    /// caller should close and retry. `begin_stream` has been emitted by
    /// then, so a later [`stop`](Self::stop) still closes the stream
    /// correctly.
    pub fn start(
        &mut self,
        session: &DeviceSession,
        sdk: &mut dyn WaveformsApi,
        trigger: Option<&TriggerSpec>,
        sink: &mut dyn LogicSink,
    ) -> Result<(), AcquisitionError> {
        let handle = session.handle().ok_or(AcquisitionError::NotOpen)?;
        let rate = session.samplerate();
        if rate == 0 {
            // A zero rate must never reach the divider computation.
            return Err(AcquisitionError::RateNotConfigured);
        }
        let profile = session.profile();

        log::debug!(
            "starting acquisition on device {} at {} Hz",
            session.enum_idx(),
            rate
        );
        sink.begin_stream();
        self.streaming = true;
        self.samples_emitted = 0;
        self.stream_faults = 0;

        fn stage(
            result: Result<(), WaveformsError>,
            stage: StartStage,
        ) -> Result<(), AcquisitionError> {
            result.map_err(|source| AcquisitionError::Device { stage, source })
        }

        // Record mode: keep capturing past a single buffer-full.
        stage(
            sdk.set_acquisition_mode(handle, AcquisitionMode::Record),
            StartStage::AcquisitionMode,
        )?;
        stage(
            sdk.set_divider(handle, profile.divider_for(rate)),
            StartStage::SampleRateDivider,
        )?;
        // One bit per channel, packed two-byte samples.
        stage(
            sdk.set_sample_format(handle, profile.sample_bits()),
            StartStage::SampleFormat,
        )?;
        stage(
            sdk.set_trigger_position(handle, profile.post_trigger_samples),
            StartStage::TriggerPosition,
        )?;
        stage(
            sdk.set_trigger_source(handle, TriggerSource::DetectorDigitalIn),
            StartStage::TriggerSource,
        )?;
        let masks = encode_trigger(trigger, profile.logic_channels)?;
        stage(
            sdk.set_trigger_masks(handle, masks),
            StartStage::TriggerMasks,
        )?;
        stage(sdk.configure(handle, true, true), StartStage::Run)?;

        Ok(())
    }

    /// End the stream.
    ///
    /// No-op when no stream is running, so stopping twice (or stopping
    /// after a session was closed without a stop) is harmless. Does not
    /// touch the device; closing the session releases it.
    pub fn stop(&mut self, sink: &mut dyn LogicSink) {
        if !self.streaming {
            log::debug!("stop with no stream running");
            return;
        }
        self.streaming = false;
        sink.end_stream();
        log::debug!("acquisition stopped after {} samples", self.samples_emitted);
    }

    /// One pump invocation: query status, pull whatever is available, emit
    /// it to the sink.
    ///
    /// Lost or corrupt samples are a non-fatal stream fault: they are
    /// reported and that invocation emits nothing, but the capture keeps
    /// running. Only an explicit [`stop`](Self::stop) - or the configured
    /// sample limit - ends the stream.
    pub fn poll(
        &mut self,
        session: &DeviceSession,
        sdk: &mut dyn WaveformsApi,
        sink: &mut dyn LogicSink,
    ) -> Result<PollOutcome, AcquisitionError> {
        if !self.streaming {
            // A scheduler tick can still be in flight after a stop.
            log::debug!("poll with no stream running");
            return Ok(PollOutcome::Stop);
        }
        let handle = session.handle().ok_or(AcquisitionError::NotOpen)?;

        let status = sdk.record_status(handle)?;
        log::trace!("record status: {} samples available", status.available);

        if status.is_faulted() {
            self.stream_faults += 1;
            log::error!(
                "stream fault: samples lost={}, samples corrupt={}",
                status.lost,
                status.corrupt
            );
            return Ok(PollOutcome::Continue);
        }

        let state = sdk.state(handle)?;
        if status.available == 0 || state.is_waiting_for_trigger() {
            log::trace!("waiting for trigger (state {:?})", state);
            return Ok(PollOutcome::Continue);
        }

        let unit = session.profile().sample_unit_bytes;
        let capacity = self.transfer.len() / unit;
        let take = if status.available > capacity {
            // The post-trigger depth is supposed to keep the device below
            // the transfer capacity; clamp rather than overrun if it ever
            // does not.
            log::warn!(
                "device reports {} samples, transfer buffer holds {}; clamping",
                status.available,
                capacity
            );
            capacity
        } else {
            status.available
        };

        let bytes = take * unit;
        sdk.read_samples(handle, &mut self.transfer[..bytes])?;
        sink.logic_samples(&LogicPacket {
            data: &self.transfer[..bytes],
            unit_size: unit,
        });
        self.samples_emitted += take as u64;

        if let Some(limit) = self.sample_limit {
            if self.samples_emitted >= limit {
                log::debug!(
                    "sample limit reached ({} of {})",
                    self.samples_emitted,
                    limit
                );
                return Ok(PollOutcome::Complete);
            }
        }

        Ok(PollOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockWaveforms, SdkCall};
    use crate::trigger_config::{TriggerMasks, TriggerMatch};
    use crate::waveforms::{AcquisitionState, RecordStatus};

    #[derive(Default)]
    struct RecordingSink {
        begins: usize,
        ends: usize,
        packets: Vec<(Vec<u8>, usize)>,
    }

    impl LogicSink for RecordingSink {
        fn begin_stream(&mut self) {
            self.begins += 1;
        }

        fn logic_samples(&mut self, packet: &LogicPacket<'_>) {
            self.packets.push((packet.data.to_vec(), packet.unit_size));
        }

        fn end_stream(&mut self) {
            self.ends += 1;
        }
    }

    fn open_session(sdk: &mut MockWaveforms, rate: u64) -> DeviceSession {
        let mut session = DeviceSession::new(0, DeviceProfile::analog_discovery2());
        session.open(sdk).unwrap();
        if rate != 0 {
            session.set_samplerate(rate).unwrap();
        }
        session
    }

    fn running(available: usize) -> (RecordStatus, AcquisitionState) {
        (
            RecordStatus {
                available,
                lost: 0,
                corrupt: 0,
            },
            AcquisitionState::Running,
        )
    }

    #[test]
    fn test_start_programs_the_device_in_order() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        let spec: TriggerSpec = TriggerSpec::when()
            .channel(3, TriggerMatch::Rising)
            .channel(5, TriggerMatch::Zero)
            .into();

        sdk.clear_calls();
        acq.start(&session, &mut sdk, Some(&spec), &mut sink).unwrap();

        assert_eq!(
            sdk.calls(),
            &[
                SdkCall::AcquisitionMode(AcquisitionMode::Record),
                SdkCall::Divider(1_000_000),
                SdkCall::SampleFormat(16),
                SdkCall::TriggerPosition(100_000),
                SdkCall::TriggerSource(TriggerSource::DetectorDigitalIn),
                SdkCall::TriggerMasks(TriggerMasks {
                    low: 32,
                    high: 0,
                    rising: 8,
                    falling: 0,
                }),
                SdkCall::Configure {
                    reconfigure: true,
                    start: true,
                },
            ]
        );
        assert_eq!(sink.begins, 1);
        assert!(acq.is_streaming());
    }

    #[test]
    fn test_start_without_rate_issues_no_native_calls() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 0);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        sdk.clear_calls();
        let err = acq.start(&session, &mut sdk, None, &mut sink).unwrap_err();
        assert!(matches!(err, AcquisitionError::RateNotConfigured));
        assert!(sdk.calls().is_empty());
        assert_eq!(sink.begins, 0);
    }

    #[test]
    fn test_start_on_closed_session_fails() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = DeviceSession::new(0, DeviceProfile::analog_discovery2());
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        let err = acq.start(&session, &mut sdk, None, &mut sink).unwrap_err();
        assert!(matches!(err, AcquisitionError::NotOpen));
        assert!(sdk.calls().is_empty());
    }

    #[test]
    fn test_start_reports_the_failing_stage() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        sdk.fail_configure = true;
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        let err = acq.start(&session, &mut sdk, None, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::Device {
                stage: StartStage::Run,
                ..
            }
        ));
    }

    #[test]
    fn test_start_short_circuits_after_a_failed_stage() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        sdk.fail_divider = true;
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        sdk.clear_calls();
        let err = acq.start(&session, &mut sdk, None, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::Device {
                stage: StartStage::SampleRateDivider,
                ..
            }
        ));
        // Nothing past the divider was programmed.
        assert_eq!(
            sdk.calls(),
            &[
                SdkCall::AcquisitionMode(AcquisitionMode::Record),
                SdkCall::Divider(1_000_000),
            ]
        );
    }

    #[test]
    fn test_poll_while_armed_emits_nothing() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        sdk.push_poll(RecordStatus::default(), AcquisitionState::Armed);
        let outcome = acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(outcome, PollOutcome::Continue);
        assert!(sink.packets.is_empty());
    }

    #[test]
    fn test_poll_with_data_but_prefilling_emits_nothing() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        let (status, _) = running(64);
        sdk.push_poll(status, AcquisitionState::Prefill);
        let outcome = acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(outcome, PollOutcome::Continue);
        assert!(sink.packets.is_empty());
    }

    #[test]
    fn test_poll_with_lost_samples_reports_fault_and_continues() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        sdk.push_poll(
            RecordStatus {
                available: 128,
                lost: 2,
                corrupt: 0,
            },
            AcquisitionState::Running,
        );
        let outcome = acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(outcome, PollOutcome::Continue);
        assert!(sink.packets.is_empty());
        assert_eq!(acq.stream_faults(), 1);
    }

    #[test]
    fn test_poll_with_data_emits_one_packet() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        let (status, state) = running(512);
        sdk.push_poll(status, state);
        let outcome = acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(outcome, PollOutcome::Continue);

        assert_eq!(sink.packets.len(), 1);
        let (data, unit_size) = &sink.packets[0];
        assert_eq!(data.len(), 1024);
        assert_eq!(*unit_size, 2);
        assert_eq!(acq.samples_emitted(), 512);
    }

    #[test]
    fn test_poll_in_done_state_still_drains_data() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        let (status, _) = running(512);
        sdk.push_poll(status, AcquisitionState::Done);
        acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(sink.packets.len(), 1);
        assert_eq!(sink.packets[0].0.len(), 1024);
    }

    #[test]
    fn test_sample_limit_completes_the_stream() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile()).with_sample_limit(600);
        acq.start(&session, &mut sdk, None, &mut sink).unwrap();

        let (status, state) = running(512);
        sdk.push_poll(status, state);
        assert_eq!(
            acq.poll(&session, &mut sdk, &mut sink).unwrap(),
            PollOutcome::Continue
        );

        let (status, state) = running(512);
        sdk.push_poll(status, state);
        assert_eq!(
            acq.poll(&session, &mut sdk, &mut sink).unwrap(),
            PollOutcome::Complete
        );
        assert_eq!(acq.samples_emitted(), 1024);
    }

    #[test]
    fn test_stream_lifecycle_notifications_are_paired() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        acq.start(&session, &mut sdk, None, &mut sink).unwrap();
        acq.stop(&mut sink);
        acq.stop(&mut sink);

        assert_eq!(sink.begins, 1);
        assert_eq!(sink.ends, 1);
        assert!(!acq.is_streaming());
    }

    #[test]
    fn test_poll_after_stop_tells_scheduler_to_deregister() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let session = open_session(&mut sdk, 100);
        let mut sink = RecordingSink::default();
        let mut acq = Acquisition::new(session.profile());

        acq.start(&session, &mut sdk, None, &mut sink).unwrap();
        acq.stop(&mut sink);

        let outcome = acq.poll(&session, &mut sdk, &mut sink).unwrap();
        assert_eq!(outcome, PollOutcome::Stop);
        assert!(sink.packets.is_empty());
    }

    #[test]
    fn test_packet_sample_iteration() {
        let data = [0x34, 0x12, 0xff, 0x00];
        let packet = LogicPacket {
            data: &data,
            unit_size: 2,
        };
        assert_eq!(packet.len(), 4);
        assert_eq!(packet.sample_count(), 2);
        let samples: Vec<u16> = packet.samples().collect();
        assert_eq!(samples, vec![0x1234, 0x00ff]);
    }
}
