use crate::profile::DeviceProfile;
use crate::session::{DeviceSession, SessionError};
use crate::waveforms::{WaveformsApi, WaveformsError};

/// Identity of one discovered device.
///
/// The enumeration index is positional and only valid for the scan pass
/// that produced it; rescans may hand the same index to a different unit.
/// Vendor plus serial is the only stable identity.
#[derive(Debug, Clone)]
pub struct DiscoveryDevice {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub version: String,
    pub enum_idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Digital,
}

/// Logical channel descriptor as presented to the framework.
#[derive(Debug, Clone)]
pub struct Channel {
    pub index: u16,
    pub kind: ChannelKind,
    pub enabled: bool,
    pub name: String,
}

/// Named collection of channels, fixed at enumeration time.
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl ChannelGroup {
    /// All logic channels in one group named "Logic", channels named after
    /// their index.
    pub fn logic(count: u16) -> Self {
        Self {
            name: "Logic".to_string(),
            channels: (0..count)
                .map(|index| Channel {
                    index,
                    kind: ChannelKind::Digital,
                    enabled: true,
                    name: index.to_string(),
                })
                .collect(),
        }
    }
}

/// One scan hit: the device's identity, its channel layout and a fresh
/// closed session ready to be opened.
#[derive(Debug)]
pub struct DiscoveryEntry {
    pub identity: DiscoveryDevice,
    pub logic_group: ChannelGroup,
    pub session: DeviceSession,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("device scan failed: {0}")]
    Scan(#[from] WaveformsError),

    #[error("failed to apply default configuration: {0}")]
    Defaults(#[from] SessionError),
}

pub struct DiscoveryConnector;

impl DiscoveryConnector {
    /// Scan for attached devices and build one entry per unit found.
    ///
    /// Sessions come back closed with the profile's default sample rate
    /// already cached.
    pub fn scan(sdk: &mut dyn WaveformsApi) -> Result<Vec<DiscoveryEntry>, ConnectorError> {
        let profile = DeviceProfile::analog_discovery2();

        let count = sdk.enumerate()?;
        log::debug!("scan found {} devices", count);

        let mut entries = Vec::with_capacity(count);
        for enum_idx in 0..count {
            let model = sdk.device_name(enum_idx)?;
            let serial = sdk.device_serial(enum_idx)?;
            // The runtime ships the device firmware, so its version is the
            // closest thing to a device version.
            let version = sdk.library_version();

            let mut session = DeviceSession::new(enum_idx, profile.clone());
            session.set_samplerate(profile.default_samplerate)?;

            log::debug!("found {} {} (serial {})", profile.vendor, model, serial);
            entries.push(DiscoveryEntry {
                identity: DiscoveryDevice {
                    vendor: profile.vendor.to_string(),
                    model,
                    serial,
                    version,
                    enum_idx,
                },
                logic_group: ChannelGroup::logic(profile.logic_channels),
                session,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockWaveforms;

    #[test]
    fn test_scan_builds_one_entry_per_device() {
        let mut sdk = MockWaveforms::new()
            .with_device("Analog Discovery 2", "SN-A")
            .with_device("Analog Discovery 2", "SN-B");

        let entries = DiscoveryConnector::scan(&mut sdk).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.identity.vendor, "Digilent");
        assert_eq!(first.identity.model, "Analog Discovery 2");
        assert_eq!(first.identity.serial, "SN-A");
        assert_eq!(first.identity.enum_idx, 0);
        assert_eq!(entries[1].identity.serial, "SN-B");
        assert_eq!(entries[1].identity.enum_idx, 1);
    }

    #[test]
    fn test_scanned_sessions_are_closed_with_default_rate() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN-A");

        let entries = DiscoveryConnector::scan(&mut sdk).unwrap();
        let session = &entries[0].session;
        assert!(!session.is_open());
        assert_eq!(session.samplerate(), 100);
    }

    #[test]
    fn test_logic_channel_group_layout() {
        let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "SN-A");

        let entries = DiscoveryConnector::scan(&mut sdk).unwrap();
        let group = &entries[0].logic_group;
        assert_eq!(group.name, "Logic");
        assert_eq!(group.channels.len(), 16);
        assert_eq!(group.channels[0].name, "0");
        assert_eq!(group.channels[15].name, "15");
        assert!(group
            .channels
            .iter()
            .all(|ch| ch.kind == ChannelKind::Digital && ch.enabled));
    }

    #[test]
    fn test_scan_with_no_devices() {
        let mut sdk = MockWaveforms::new();
        let entries = DiscoveryConnector::scan(&mut sdk).unwrap();
        assert!(entries.is_empty());
    }
}
