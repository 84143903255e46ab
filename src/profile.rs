use std::time::Duration;

/// Static description of a device family's digital-capture topology.
///
/// Everything the acquisition path needs to know about the hardware lives
/// here as named fields instead of scattered literals, so a future device
/// with a different channel count or buffer depth only needs a new profile.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Vendor string reported for discovered devices.
    pub vendor: &'static str,
    /// Number of digital input channels, one trigger-mask bit each.
    pub logic_channels: u16,
    /// Fixed system clock the sample-rate divider is derived from.
    pub system_clock_hz: u64,
    /// Number of samples the device keeps capturing after the trigger fires.
    pub post_trigger_samples: u64,
    /// Capacity of the host-side transfer buffer, in bytes.
    pub transfer_buffer_bytes: usize,
    /// Bytes per packed multi-channel sample.
    pub sample_unit_bytes: usize,
    /// Period at which the data pump should be invoked.
    pub poll_period: Duration,
    /// Sample rates the driver accepts, in Hz.
    pub samplerates: &'static [u64],
    /// Rate applied to freshly scanned sessions.
    pub default_samplerate: u64,
}

impl DeviceProfile {
    pub const fn analog_discovery2() -> Self {
        Self {
            vendor: "Digilent",
            logic_channels: 16,
            system_clock_hz: 100_000_000,
            post_trigger_samples: 100_000,
            transfer_buffer_bytes: 1024 * 1024,
            sample_unit_bytes: 2,
            poll_period: Duration::from_millis(100),
            samplerates: &[1, 10, 50, 100, 200],
            default_samplerate: 100,
        }
    }

    pub fn supports_samplerate(&self, hz: u64) -> bool {
        self.samplerates.contains(&hz)
    }

    /// Divider programmed into the device for the given output rate.
    ///
    /// Integer truncation: if `hz` does not evenly divide the system clock
    /// the device runs at the nearest rate the truncated divider yields, not
    /// at `hz` exactly. Callers must ensure `hz` is non-zero.
    pub fn divider_for(&self, hz: u64) -> u32 {
        (self.system_clock_hz / hz) as u32
    }

    /// Sample format in bits, one bit per logic channel.
    pub fn sample_bits(&self) -> u32 {
        (self.sample_unit_bytes * 8) as u32
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::analog_discovery2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analog_discovery2_divider() {
        let profile = DeviceProfile::analog_discovery2();
        assert_eq!(profile.divider_for(100), 1_000_000);
        assert_eq!(profile.divider_for(200), 500_000);
    }

    #[test]
    fn test_divider_truncates() {
        let profile = DeviceProfile::analog_discovery2();
        // 100 MHz / 3 Hz is not exact; the divider is truncated downwards.
        assert_eq!(profile.divider_for(3), 33_333_333);
    }

    #[test]
    fn test_samplerate_table() {
        let profile = DeviceProfile::analog_discovery2();
        assert!(profile.supports_samplerate(100));
        assert!(!profile.supports_samplerate(0));
        assert!(!profile.supports_samplerate(44_100));
    }
}
