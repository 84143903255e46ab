use crate::trigger_config::TriggerMasks;

/// Opaque handle to an opened device.
///
/// The handle is a capability: it is produced by [`WaveformsApi::open`] and
/// must be given back to [`WaveformsApi::close`] exactly once. It is
/// deliberately neither `Copy` nor `Clone` so a closed handle cannot be
/// smuggled back into the gateway.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle(pub(crate) i32);

/// Coarse lifecycle phase of the digital-in instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Ready,
    Config,
    Prefill,
    Armed,
    Wait,
    Triggered,
    Running,
    Done,
}

impl AcquisitionState {
    /// True while the instrument has not seen its trigger condition yet and
    /// no post-trigger data can exist.
    pub fn is_waiting_for_trigger(&self) -> bool {
        matches!(self, Self::Config | Self::Armed | Self::Prefill)
    }
}

/// Transfer counters reported by the device in record mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStatus {
    /// Samples ready to be read out.
    pub available: usize,
    /// Samples the device dropped because the host read too slowly.
    pub lost: usize,
    /// Samples the device flagged as corrupted in transfer.
    pub corrupt: usize,
}

impl RecordStatus {
    pub fn is_faulted(&self) -> bool {
        self.lost > 0 || self.corrupt > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// One buffer-full capture, then stop.
    Single,
    /// Continuous capture streaming into the record buffer.
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Free running, no trigger condition.
    None,
    /// The digital-input pattern detector.
    DetectorDigitalIn,
    /// The analog-input detector. Unused for logic capture but part of the
    /// device's source set.
    DetectorAnalogIn,
}

#[derive(Debug, thiserror::Error)]
pub enum WaveformsError {
    #[error("device {index} cannot be opened (unplugged, busy or permission denied)")]
    OpenFailed { index: usize },

    #[error("enumeration index {index} is out of range")]
    BadIndex { index: usize },

    #[error("runtime call '{call}' failed")]
    CallFailed { call: &'static str },
}

/// Narrow boundary to the WaveForms runtime.
///
/// The vendor SDK keeps process-global state and hands out raw handles, so
/// the rest of the crate talks to it only through this trait. A hardware
/// backend wraps the SDK's C API behind it; [`crate::mock::MockWaveforms`]
/// provides a scripted stand-in for tests and demos.
///
/// Enumeration indices are positional and only meaningful until the next
/// [`enumerate`](Self::enumerate) call; they must not be stored as stable
/// device identifiers.
pub trait WaveformsApi {
    /// Scan the bus and return the number of attached devices.
    fn enumerate(&mut self) -> Result<usize, WaveformsError>;

    /// User-visible model name of the device at `index`.
    fn device_name(&self, index: usize) -> Result<String, WaveformsError>;

    /// Serial number of the device at `index`.
    fn device_serial(&self, index: usize) -> Result<String, WaveformsError>;

    /// Version of the runtime. The runtime carries the device firmware, so
    /// this doubles as the de-facto device version.
    fn library_version(&self) -> String;

    /// Take exclusive ownership of the device at `index`.
    fn open(&mut self, index: usize) -> Result<DeviceHandle, WaveformsError>;

    /// Release a device. Consumes the handle; there is no way to use it
    /// afterwards.
    fn close(&mut self, handle: DeviceHandle);

    fn set_acquisition_mode(
        &mut self,
        handle: &DeviceHandle,
        mode: AcquisitionMode,
    ) -> Result<(), WaveformsError>;

    /// Program the sample-rate divider (system clock / divider = rate).
    fn set_divider(&mut self, handle: &DeviceHandle, divider: u32) -> Result<(), WaveformsError>;

    /// Sample format in bits counted from the least significant bit.
    /// The device accepts 8, 16 and 32.
    fn set_sample_format(&mut self, handle: &DeviceHandle, bits: u32)
        -> Result<(), WaveformsError>;

    /// Number of samples to keep capturing after the trigger fires.
    fn set_trigger_position(
        &mut self,
        handle: &DeviceHandle,
        post_trigger_samples: u64,
    ) -> Result<(), WaveformsError>;

    fn set_trigger_source(
        &mut self,
        handle: &DeviceHandle,
        source: TriggerSource,
    ) -> Result<(), WaveformsError>;

    /// Program the four per-channel condition masks.
    fn set_trigger_masks(
        &mut self,
        handle: &DeviceHandle,
        masks: TriggerMasks,
    ) -> Result<(), WaveformsError>;

    /// Apply the staged configuration and optionally start the instrument.
    fn configure(
        &mut self,
        handle: &DeviceHandle,
        reconfigure: bool,
        start: bool,
    ) -> Result<(), WaveformsError>;

    /// Record-mode transfer counters for the current capture.
    fn record_status(&mut self, handle: &DeviceHandle) -> Result<RecordStatus, WaveformsError>;

    /// Coarse instrument state. Reads status without side effects.
    fn state(&mut self, handle: &DeviceHandle) -> Result<AcquisitionState, WaveformsError>;

    /// Drain packed samples into `buf`. The caller sizes `buf` to exactly
    /// the number of bytes it wants; the device fills all of it.
    fn read_samples(&mut self, handle: &DeviceHandle, buf: &mut [u8])
        -> Result<(), WaveformsError>;
}
