use std::str::FromStr;

/// Condition applied to a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMatch {
    /// Channel must read low.
    Zero,
    /// Channel must read high.
    One,
    /// Channel must transition low to high.
    Rising,
    /// Channel must transition high to low.
    Falling,
    /// Channel must transition in either direction.
    Edge,
}

impl TriggerMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMatch::Zero => "zero",
            TriggerMatch::One => "one",
            TriggerMatch::Rising => "rising",
            TriggerMatch::Falling => "falling",
            TriggerMatch::Edge => "edge",
        }
    }

    /// Match kinds this device supports, in the order they are advertised
    /// to configuration listings.
    pub fn all() -> &'static [TriggerMatch] {
        &[
            TriggerMatch::Zero,
            TriggerMatch::One,
            TriggerMatch::Rising,
            TriggerMatch::Falling,
            TriggerMatch::Edge,
        ]
    }
}

impl FromStr for TriggerMatch {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" | "0" | "low" => Ok(TriggerMatch::Zero),
            "one" | "1" | "high" => Ok(TriggerMatch::One),
            "rising" | "r" => Ok(TriggerMatch::Rising),
            "falling" | "f" => Ok(TriggerMatch::Falling),
            "edge" | "e" => Ok(TriggerMatch::Edge),
            other => {
                log::error!("unhandled trigger match kind '{}'", other);
                Err(TriggerError::UnknownMatch(other.to_string()))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("channel index {channel} out of range, must be below {limit}")]
    ChannelOutOfRange { channel: u16, limit: u16 },

    #[error("unknown trigger match kind '{0}'")]
    UnknownMatch(String),
}

/// One (channel, condition) pair inside a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMatch {
    pub channel: u16,
    pub kind: TriggerMatch,
}

/// An unordered set of conditions that must hold simultaneously.
#[derive(Debug, Clone, Default)]
pub struct TriggerStage {
    matches: Vec<ChannelMatch>,
}

impl TriggerStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition for one channel.
    pub fn channel(mut self, channel: u16, kind: TriggerMatch) -> Self {
        self.matches.push(ChannelMatch { channel, kind });
        self
    }

    pub fn matches(&self) -> &[ChannelMatch] {
        &self.matches
    }
}

/// An ordered sequence of trigger stages.
///
/// Supplied per acquisition start and not persisted. The hardware only
/// evaluates one stage; see [`encode_trigger`] for how extra stages are
/// handled.
#[derive(Debug, Clone, Default)]
pub struct TriggerSpec {
    stages: Vec<TriggerStage>,
}

impl TriggerSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a single-stage specification.
    pub fn when() -> TriggerStage {
        TriggerStage::new()
    }

    pub fn stage(mut self, stage: TriggerStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[TriggerStage] {
        &self.stages
    }
}

impl From<TriggerStage> for TriggerSpec {
    fn from(stage: TriggerStage) -> Self {
        TriggerSpec::new().stage(stage)
    }
}

/// The four per-channel condition masks programmed into the digital-in
/// detector, bit n = channel n.
///
/// The hardware combines them as `low AND high AND (rising OR falling)`:
/// every channel flagged in any mask must satisfy its condition at the same
/// instant for the trigger to fire. Note this is not a per-channel
/// independent trigger model - flagging two channels means both must match
/// simultaneously, which silently changes semantics for users expecting
/// either channel alone to fire the trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerMasks {
    pub low: u32,
    pub high: u32,
    pub rising: u32,
    pub falling: u32,
}

impl TriggerMasks {
    /// All-zero masks, i.e. no trigger condition at all.
    pub fn is_free_running(&self) -> bool {
        self.low == 0 && self.high == 0 && self.rising == 0 && self.falling == 0
    }
}

/// Flatten a trigger specification into the device's four bitmasks.
///
/// With no specification the masks stay zero and the capture free-runs.
/// The device evaluates a single stage only; a multi-stage specification is
/// merged into the union of all stages and a warning is emitted once, since
/// the merged condition is usually not what a staged setup meant.
///
/// Channel indices at or above `channel_count` are a caller contract
/// violation and fail the whole encoding.
pub fn encode_trigger(
    spec: Option<&TriggerSpec>,
    channel_count: u16,
) -> Result<TriggerMasks, TriggerError> {
    let mut masks = TriggerMasks::default();

    let Some(spec) = spec else {
        log::trace!("no trigger configured, free-running capture");
        return Ok(masks);
    };

    if spec.stages().len() > 1 {
        log::warn!(
            "staged triggers are not supported by this device; merging {} stages into one",
            spec.stages().len()
        );
    }

    for stage in spec.stages() {
        for m in stage.matches() {
            if m.channel >= channel_count {
                return Err(TriggerError::ChannelOutOfRange {
                    channel: m.channel,
                    limit: channel_count,
                });
            }
            let bit = 1u32 << m.channel;
            match m.kind {
                TriggerMatch::Zero => masks.low |= bit,
                TriggerMatch::One => masks.high |= bit,
                TriggerMatch::Rising => masks.rising |= bit,
                TriggerMatch::Falling => masks.falling |= bit,
                TriggerMatch::Edge => {
                    masks.rising |= bit;
                    masks.falling |= bit;
                }
            }
        }
    }

    Ok(masks)
}
