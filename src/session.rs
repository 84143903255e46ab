use crate::profile::DeviceProfile;
use crate::waveforms::{DeviceHandle, WaveformsApi, WaveformsError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("device {index} is already open")]
    AlreadyOpen { index: usize },

    #[error("device {index} is unavailable: {source}")]
    DeviceUnavailable {
        index: usize,
        source: WaveformsError,
    },

    #[error("{hz} Hz is not a supported sample rate")]
    UnsupportedSamplerate { hz: u64 },
}

/// Lifecycle state of one physical device.
///
/// The native handle is stored as an `Option`, so "open" and "handle is
/// valid" are the same fact by construction: `Some` while open, `None`
/// otherwise. A session is created closed with no sample rate configured;
/// the rate is cached here and only programmed into the hardware when an
/// acquisition starts.
///
/// A session is exclusively owned by whoever manages the device's lifecycle.
/// Lifecycle transitions (open, close, start, stop) must not race each other;
/// the driver performs no locking of its own.
#[derive(Debug)]
pub struct DeviceSession {
    enum_idx: usize,
    handle: Option<DeviceHandle>,
    cur_samplerate: u64,
    profile: DeviceProfile,
}

impl DeviceSession {
    /// Fresh closed session for the device at `enum_idx` in the current
    /// enumeration pass.
    pub fn new(enum_idx: usize, profile: DeviceProfile) -> Self {
        Self {
            enum_idx,
            handle: None,
            cur_samplerate: 0,
            profile,
        }
    }

    pub fn enum_idx(&self) -> usize {
        self.enum_idx
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Currently cached sample rate in Hz, 0 when never configured.
    pub fn samplerate(&self) -> u64 {
        self.cur_samplerate
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub(crate) fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    /// Acquire the device.
    ///
    /// A session that is already open is not reopened; the existing handle
    /// stays untouched and the call fails.
    pub fn open(&mut self, sdk: &mut dyn WaveformsApi) -> Result<(), SessionError> {
        if self.handle.is_some() {
            log::error!("device {} is already open", self.enum_idx);
            return Err(SessionError::AlreadyOpen {
                index: self.enum_idx,
            });
        }

        match sdk.open(self.enum_idx) {
            Ok(handle) => {
                log::debug!("opened device {}", self.enum_idx);
                self.handle = Some(handle);
                Ok(())
            }
            Err(source) => {
                log::error!("error opening device number {}", self.enum_idx);
                Err(SessionError::DeviceUnavailable {
                    index: self.enum_idx,
                    source,
                })
            }
        }
    }

    /// Release the device. Safe to call any number of times; closing an
    /// already-closed session does nothing.
    pub fn close(&mut self, sdk: &mut dyn WaveformsApi) {
        if let Some(handle) = self.handle.take() {
            sdk.close(handle);
            log::debug!("closed device {}", self.enum_idx);
        }
    }

    /// Cache a new sample rate.
    ///
    /// The rate must be one of the profile's declared rates (zero never is).
    /// Hardware is not touched here; the divider is programmed at start.
    pub fn set_samplerate(&mut self, hz: u64) -> Result<(), SessionError> {
        if !self.profile.supports_samplerate(hz) {
            return Err(SessionError::UnsupportedSamplerate { hz });
        }
        log::debug!("set the sample rate to {} Hz", hz);
        self.cur_samplerate = hz;
        Ok(())
    }
}
