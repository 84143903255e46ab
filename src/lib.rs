//! # Discovery2 RS
//!
//! A Rust driver for the logic-analyzer side of the Digilent Analog
//! Discovery 2, built on the WaveForms runtime.
//!
//! The crate covers the full acquisition protocol: enumerating attached
//! devices, opening a session, encoding digital trigger conditions into the
//! hardware's four channel bitmasks, programming and starting a record-mode
//! capture, and pumping sample packets to a consumer until the capture is
//! stopped.
//!
//! ## Features
//!
//! - **Device discovery**: one scan pass yields identity, channel layout and
//!   a ready-to-open session per attached unit
//! - **Trigger configuration**: staged trigger specifications with a builder
//!   API, encoded into the detector's low/high/rising/falling masks
//! - **Record-mode streaming**: periodic polling with lost/corrupt-sample
//!   fault reporting and an optional sample limit
//! - **DataFrame output**: captures convert to `polars` DataFrames with a
//!   time index and per-channel bit columns
//! - **Hardware-free testing**: a scripted mock of the WaveForms runtime
//!   (feature `mock`, enabled by default)
//!
//! ## Examples
//!
//! ### Trigger encoding
//!
//! ```rust
//! use discovery2_rs::{encode_trigger, TriggerMatch, TriggerSpec};
//!
//! let spec: TriggerSpec = TriggerSpec::when()
//!     .channel(3, TriggerMatch::Rising)
//!     .channel(5, TriggerMatch::Zero)
//!     .into();
//!
//! let masks = encode_trigger(Some(&spec), 16)?;
//! assert_eq!(masks.rising, 0b1000);
//! assert_eq!(masks.low, 0b10_0000);
//! # Ok::<(), discovery2_rs::TriggerError>(())
//! ```
//!
//! ### A full capture against the mock runtime
//!
//! ```rust
//! use discovery2_rs::mock::MockWaveforms;
//! use discovery2_rs::waveforms::{AcquisitionState, RecordStatus};
//! use discovery2_rs::{Acquisition, DiscoveryConnector, LogicCapture, PollOutcome};
//!
//! let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "210321A7");
//! sdk.push_poll(RecordStatus::default(), AcquisitionState::Armed);
//! sdk.push_poll(
//!     RecordStatus { available: 256, lost: 0, corrupt: 0 },
//!     AcquisitionState::Running,
//! );
//!
//! let mut entries = DiscoveryConnector::scan(&mut sdk)?;
//! let mut entry = entries.remove(0);
//! entry.session.open(&mut sdk)?;
//! entry.session.set_samplerate(100)?;
//!
//! let mut capture = LogicCapture::new(entry.session.samplerate());
//! let mut acq = Acquisition::new(entry.session.profile());
//!
//! acq.start(&entry.session, &mut sdk, None, &mut capture)?;
//! while acq.poll(&entry.session, &mut sdk, &mut capture)? == PollOutcome::Continue {
//!     // A real caller waits out the profile's poll period between calls.
//!     if capture.sample_count() >= 256 {
//!         break;
//!     }
//! }
//! acq.stop(&mut capture);
//! entry.session.close(&mut sdk);
//!
//! assert_eq!(capture.sample_count(), 256);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod acquisition;
pub mod capture;
pub mod connector;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod profile;
pub mod session;
pub mod trigger_config;
pub mod waveforms;

// Re-export the main types for convenience
pub use trigger_config::{
    encode_trigger, ChannelMatch, TriggerError, TriggerMasks, TriggerMatch, TriggerSpec,
    TriggerStage,
};

pub use acquisition::{
    Acquisition, AcquisitionError, LogicPacket, LogicSink, PollOutcome, StartStage,
};

pub use capture::LogicCapture;

pub use connector::{
    Channel, ChannelGroup, ChannelKind, ConnectorError, DiscoveryConnector, DiscoveryDevice,
    DiscoveryEntry,
};

pub use profile::DeviceProfile;

pub use session::{DeviceSession, SessionError};

pub use waveforms::{
    AcquisitionMode, AcquisitionState, DeviceHandle, RecordStatus, TriggerSource, WaveformsApi,
    WaveformsError,
};
