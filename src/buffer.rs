use std::fmt::{Display, Formatter};

use bytes::Bytes;

use crate::caps::Caps;

/// Encoded video buffer as delivered by the host pipeline.
///
/// Timestamps are in nanoseconds; `None` stands for "not a time".
#[derive(Clone, Debug, Default)]
pub struct InputBuffer {
    pub data: Bytes,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
    /// Set for frames that depend on previous frames (non keyframes).
    pub delta_unit: bool,
}

impl InputBuffer {
    pub fn new(data: impl Into<Bytes>, pts: Option<u64>) -> Self {
        Self {
            data: data.into(),
            pts,
            ..Default::default()
        }
    }

    pub fn with_dts(mut self, dts: Option<u64>) -> Self {
        self.dts = dts;
        self
    }

    pub fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_delta_unit(mut self, delta_unit: bool) -> Self {
        self.delta_unit = delta_unit;
        self
    }

    pub fn is_keyframe(&self) -> bool {
        !self.delta_unit
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Display for InputBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "InputBuffer size: {}, pts: {:?}, dts: {:?}, duration: {:?}, keyframe: {}",
            self.data.len(),
            self.pts,
            self.dts,
            self.duration,
            self.is_keyframe()
        )
    }
}

/// Serialized, out-of-band events arriving on the element's sink side.
#[derive(Clone, Debug)]
pub enum SinkEvent {
    Caps(Caps),
    /// Stream tags; `location` is set when a source (re)opens a file.
    Tag { location: Option<String> },
    Eos,
}
