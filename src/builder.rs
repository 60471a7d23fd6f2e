//! Assembles frame messages from buffer timing, negotiated parameters and
//! sidecar objects.

use std::path::Path;

use frame_message::{
    Attribute, AttributeValue, RBBox, VideoFrame, VideoFrameContent, VideoFrameTransformation,
    VideoObject, DEFAULT_NAMESPACE, DEFAULT_TIME_BASE,
};

use crate::{
    caps::FrameParams,
    sidecar::{FrameRecord, ObjectAttributeRecord, ObjectRecord},
};

pub const LOCATION_ATTRIBUTE: &str = "location";

/// Buffer timestamps in nanoseconds; `None` is "not a time".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timing {
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
}

/// Builds frame messages for one negotiated stream. Building never emits
/// anything and never mutates the builder.
pub struct FrameMessageBuilder<'a> {
    params: &'a FrameParams,
    initial_size: VideoFrameTransformation,
    location: Option<&'a Path>,
    record: Option<&'a FrameRecord>,
}

impl<'a> FrameMessageBuilder<'a> {
    pub fn new(params: &'a FrameParams, initial_size: VideoFrameTransformation) -> Self {
        Self {
            params,
            initial_size,
            location: None,
            record: None,
        }
    }

    pub fn with_location(mut self, location: Option<&'a Path>) -> Self {
        self.location = location;
        self
    }

    /// Sidecar record whose objects are attached to the frame.
    pub fn with_record(mut self, record: Option<&'a FrameRecord>) -> Self {
        self.record = record;
        self
    }

    pub fn build(
        &self,
        source_id: &str,
        timing: Timing,
        content: VideoFrameContent,
        keyframe: bool,
    ) -> VideoFrame {
        let mut frame = VideoFrame {
            source_id: source_id.to_string(),
            framerate: self.params.framerate.clone(),
            width: self.params.width as u64,
            height: self.params.height as u64,
            codec: Some(self.params.codec_name.clone()),
            content,
            keyframe: Some(keyframe),
            pts: timing.pts.unwrap_or(0),
            dts: timing.dts,
            duration: timing.duration,
            time_base: DEFAULT_TIME_BASE,
            transformations: Vec::new(),
            objects: Vec::new(),
            attributes: Vec::new(),
        };
        frame.add_transformation(self.initial_size);

        if let Some(record) = self.record {
            for object in &record.objects {
                frame.add_object(video_object(object));
            }
        }

        if let Some(location) = self.location {
            frame.set_attribute(Attribute::new(
                DEFAULT_NAMESPACE,
                LOCATION_ATTRIBUTE,
                vec![AttributeValue::string(location.to_string_lossy())],
            ));
        }

        frame
    }
}

fn video_object(record: &ObjectRecord) -> VideoObject {
    VideoObject {
        id: record.object_id,
        namespace: record.model_name.clone(),
        label: record.label.clone(),
        detection_box: RBBox {
            xc: record.bbox.xc,
            yc: record.bbox.yc,
            width: record.bbox.width,
            height: record.bbox.height,
            angle: record.bbox.angle,
        },
        confidence: record.confidence,
        attributes: record.attributes.iter().map(object_attribute).collect(),
        parent_id: record.parent_object_id,
    }
}

fn object_attribute(record: &ObjectAttributeRecord) -> Attribute {
    let value = AttributeValue::from(record.value.clone()).with_confidence(record.confidence);
    Attribute::new(record.element_name.as_str(), record.name.as_str(), vec![value])
}
