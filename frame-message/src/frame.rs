use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{attribute::Attribute, object::VideoObject};

/// Timestamps are expressed in nanoseconds.
pub const DEFAULT_TIME_BASE: (i32, i32) = (1, 1_000_000_000);

/// Frame payload: either carried inline or referenced by an external method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VideoFrameContent {
    Internal(Vec<u8>),
    External {
        method: String,
        location: Option<String>,
    },
}

impl VideoFrameContent {
    pub fn internal(data: impl Into<Vec<u8>>) -> Self {
        Self::Internal(data.into())
    }

    pub fn external(method: impl Into<String>, location: Option<String>) -> Self {
        Self::External {
            method: method.into(),
            location,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VideoFrameTransformation {
    /// Dimensions of the frame before any downstream resize.
    InitialSize { width: u64, height: u64 },
}

impl VideoFrameTransformation {
    pub fn initial_size(width: u64, height: u64) -> Self {
        Self::InitialSize { width, height }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub source_id: String,
    pub framerate: String,
    pub width: u64,
    pub height: u64,
    pub codec: Option<String>,
    pub content: VideoFrameContent,
    pub keyframe: Option<bool>,
    pub pts: u64,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
    pub time_base: (i32, i32),
    pub transformations: Vec<VideoFrameTransformation>,
    pub objects: Vec<VideoObject>,
    pub attributes: Vec<Attribute>,
}

impl VideoFrame {
    pub fn add_transformation(&mut self, transformation: VideoFrameTransformation) {
        self.transformations.push(transformation);
    }

    pub fn add_object(&mut self, object: VideoObject) {
        self.objects.push(object);
    }

    /// Replaces an attribute with the same namespace and name, if any.
    pub fn set_attribute(&mut self, attribute: Attribute) -> Option<Attribute> {
        let existing = self
            .attributes
            .iter()
            .position(|a| a.namespace == attribute.namespace && a.name == attribute.name);
        match existing {
            Some(i) => Some(std::mem::replace(&mut self.attributes[i], attribute)),
            None => {
                self.attributes.push(attribute);
                None
            }
        }
    }

    pub fn get_attribute(&self, namespace: &str, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.namespace == namespace && a.name == name)
    }
}

impl Display for VideoFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "VideoFrame source_id: {}, {}x{}, codec: {:?}, pts: {}, dts: {:?}, keyframe: {:?}, objects: {}",
            self.source_id,
            self.width,
            self.height,
            self.codec,
            self.pts,
            self.dts,
            self.keyframe,
            self.objects.len()
        )
    }
}
