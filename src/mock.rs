//! Scripted in-memory stand-in for the WaveForms runtime.
//!
//! Lets the whole acquisition path run without hardware attached: tests and
//! demos enqueue poll responses and afterwards inspect the exact sequence of
//! native calls the driver issued.

use std::collections::VecDeque;

use crate::trigger_config::TriggerMasks;
use crate::waveforms::{
    AcquisitionMode, AcquisitionState, DeviceHandle, RecordStatus, TriggerSource, WaveformsApi,
    WaveformsError,
};

const MOCK_LIBRARY_VERSION: &str = "3.23.4-mock";

/// Journal entry for one native call issued through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkCall {
    Open { index: usize },
    Close,
    AcquisitionMode(AcquisitionMode),
    Divider(u32),
    SampleFormat(u32),
    TriggerPosition(u64),
    TriggerSource(TriggerSource),
    TriggerMasks(TriggerMasks),
    Configure { reconfigure: bool, start: bool },
}

/// One scripted answer to a status poll.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedPoll {
    pub status: RecordStatus,
    pub state: AcquisitionState,
}

impl Default for ScriptedPoll {
    fn default() -> Self {
        Self {
            status: RecordStatus::default(),
            state: AcquisitionState::Ready,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub serial: String,
}

/// Mock implementation of [`WaveformsApi`].
///
/// Status polls are answered from a scripted queue; once the queue runs dry
/// the device reports an idle `Ready` state with nothing available. Sample
/// reads produce a deterministic counting pattern so packet contents can be
/// asserted on.
#[derive(Debug, Default)]
pub struct MockWaveforms {
    devices: Vec<MockDevice>,
    polls: VecDeque<ScriptedPoll>,
    last_poll: ScriptedPoll,
    calls: Vec<SdkCall>,
    next_sample: u16,
    /// Makes [`WaveformsApi::open`] report the device as unavailable.
    pub fail_open: bool,
    /// Makes the divider stage of device programming fail.
    pub fail_divider: bool,
    /// Makes the final configure-and-run call fail.
    pub fail_configure: bool,
}

impl MockWaveforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: &str, serial: &str) -> Self {
        self.devices.push(MockDevice {
            name: name.to_string(),
            serial: serial.to_string(),
        });
        self
    }

    /// Enqueue the answer for one future status poll.
    pub fn push_poll(&mut self, status: RecordStatus, state: AcquisitionState) {
        self.polls.push_back(ScriptedPoll { status, state });
    }

    /// Every native call issued so far, in order.
    pub fn calls(&self) -> &[SdkCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl WaveformsApi for MockWaveforms {
    fn enumerate(&mut self) -> Result<usize, WaveformsError> {
        Ok(self.devices.len())
    }

    fn device_name(&self, index: usize) -> Result<String, WaveformsError> {
        self.devices
            .get(index)
            .map(|d| d.name.clone())
            .ok_or(WaveformsError::BadIndex { index })
    }

    fn device_serial(&self, index: usize) -> Result<String, WaveformsError> {
        self.devices
            .get(index)
            .map(|d| d.serial.clone())
            .ok_or(WaveformsError::BadIndex { index })
    }

    fn library_version(&self) -> String {
        MOCK_LIBRARY_VERSION.to_string()
    }

    fn open(&mut self, index: usize) -> Result<DeviceHandle, WaveformsError> {
        self.calls.push(SdkCall::Open { index });
        if self.fail_open || index >= self.devices.len() {
            return Err(WaveformsError::OpenFailed { index });
        }
        Ok(DeviceHandle(index as i32 + 1))
    }

    fn close(&mut self, _handle: DeviceHandle) {
        self.calls.push(SdkCall::Close);
    }

    fn set_acquisition_mode(
        &mut self,
        _handle: &DeviceHandle,
        mode: AcquisitionMode,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::AcquisitionMode(mode));
        Ok(())
    }

    fn set_divider(&mut self, _handle: &DeviceHandle, divider: u32) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::Divider(divider));
        if self.fail_divider {
            return Err(WaveformsError::CallFailed {
                call: "set_divider",
            });
        }
        Ok(())
    }

    fn set_sample_format(
        &mut self,
        _handle: &DeviceHandle,
        bits: u32,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::SampleFormat(bits));
        Ok(())
    }

    fn set_trigger_position(
        &mut self,
        _handle: &DeviceHandle,
        post_trigger_samples: u64,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::TriggerPosition(post_trigger_samples));
        Ok(())
    }

    fn set_trigger_source(
        &mut self,
        _handle: &DeviceHandle,
        source: TriggerSource,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::TriggerSource(source));
        Ok(())
    }

    fn set_trigger_masks(
        &mut self,
        _handle: &DeviceHandle,
        masks: TriggerMasks,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::TriggerMasks(masks));
        Ok(())
    }

    fn configure(
        &mut self,
        _handle: &DeviceHandle,
        reconfigure: bool,
        start: bool,
    ) -> Result<(), WaveformsError> {
        self.calls.push(SdkCall::Configure { reconfigure, start });
        if self.fail_configure {
            return Err(WaveformsError::CallFailed { call: "configure" });
        }
        Ok(())
    }

    fn record_status(&mut self, _handle: &DeviceHandle) -> Result<RecordStatus, WaveformsError> {
        self.last_poll = self.polls.pop_front().unwrap_or_default();
        Ok(self.last_poll.status)
    }

    fn state(&mut self, _handle: &DeviceHandle) -> Result<AcquisitionState, WaveformsError> {
        Ok(self.last_poll.state)
    }

    fn read_samples(
        &mut self,
        _handle: &DeviceHandle,
        buf: &mut [u8],
    ) -> Result<(), WaveformsError> {
        for chunk in buf.chunks_exact_mut(2) {
            chunk.copy_from_slice(&self.next_sample.to_le_bytes());
            self.next_sample = self.next_sample.wrapping_add(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_script_plays_back_in_order() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let handle = sdk.open(0).unwrap();

        sdk.push_poll(
            RecordStatus {
                available: 4,
                lost: 0,
                corrupt: 0,
            },
            AcquisitionState::Running,
        );

        let status = sdk.record_status(&handle).unwrap();
        assert_eq!(status.available, 4);
        assert_eq!(sdk.state(&handle).unwrap(), AcquisitionState::Running);

        // Queue exhausted: idle answer.
        let status = sdk.record_status(&handle).unwrap();
        assert_eq!(status.available, 0);
        assert_eq!(sdk.state(&handle).unwrap(), AcquisitionState::Ready);
    }

    #[test]
    fn test_sample_pattern_counts_up() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN1");
        let handle = sdk.open(0).unwrap();

        let mut buf = [0u8; 8];
        sdk.read_samples(&handle, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 1, 0, 2, 0, 3, 0]);

        sdk.read_samples(&handle, &mut buf[..4]).unwrap();
        assert_eq!(&buf[..4], &[4, 0, 5, 0]);
    }
}
