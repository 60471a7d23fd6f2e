//! The serializer element: turns buffers and sink events into envelopes.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use frame_message::{Message, VideoFrameContent, VideoFrameTransformation};

use crate::{
    buffer::{InputBuffer, SinkEvent},
    builder::{FrameMessageBuilder, Timing},
    caps::{Caps, FrameParams},
    config::{FrameType, SerializerConfig, ZEROMQ_FRAME_TYPE},
    emitter::{Envelope, MessageEmitter, OutputSink},
    error::{Result, SerializerError},
    fanout::{logical_sources, LogicalSource},
    lifecycle::{LifecycleTracker, SegmentState},
};

/// Calls must be serialized by the host; the element keeps no locks.
pub struct Serializer {
    config: SerializerConfig,
    emitter: MessageEmitter,
    /// Empty until started.
    sources: Vec<LogicalSource>,
    tracker: LifecycleTracker,
    initial_size: Option<VideoFrameTransformation>,
}

impl Serializer {
    pub fn new(config: SerializerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            emitter: MessageEmitter::new(config.shutdown_auth.clone()),
            tracker: LifecycleTracker::new(&config),
            sources: Vec::new(),
            initial_size: None,
            config,
        })
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    pub fn sources(&self) -> &[LogicalSource] {
        &self.sources
    }

    pub fn segment_state(&self) -> &SegmentState {
        self.tracker.state()
    }

    pub fn frame_params(&self) -> Option<&FrameParams> {
        self.tracker.state().current_frame_params.as_ref()
    }

    pub fn location(&self) -> Option<&Path> {
        self.tracker.state().current_location.as_deref()
    }

    pub fn is_started(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Computes the logical sources. Configuration errors keep the element
    /// stopped.
    pub fn start(&mut self) -> Result<()> {
        let sources = logical_sources(&self.config).inspect_err(|e| {
            log::error!("Serializer: failed to start: {}", e);
        })?;
        log::info!(
            "Serializer: started with {} source(s), frame type {}",
            sources.len(),
            self.config.frame_type
        );
        self.sources = sources;
        Ok(())
    }

    /// Drops runtime state. Negotiated caps survive a restart.
    pub fn stop(&mut self) {
        log::info!("Serializer: stopped");
        self.sources.clear();
        let frame_params = self.frame_params().cloned();
        self.tracker = LifecycleTracker::new(&self.config);
        if let Some(frame_params) = frame_params {
            self.tracker.set_frame_params(frame_params);
        }
    }

    pub fn set_caps(&mut self, caps: &Caps) -> Result<()> {
        let params = FrameParams::from_caps(caps, &self.config.framerate).inspect_err(|e| {
            log::error!("Serializer: {}", e);
        })?;
        log::info!("Serializer: negotiated {}", params);
        self.initial_size = Some(VideoFrameTransformation::initial_size(
            params.width as u64,
            params.height as u64,
        ));
        self.tracker.set_frame_params(params);
        Ok(())
    }

    /// Sets the location externally, without a tag event.
    pub fn set_location(&mut self, location: Option<PathBuf>) {
        self.config.location = location.clone();
        self.tracker.set_location(location);
    }

    pub fn handle_event(&mut self, event: SinkEvent, sink: &mut dyn OutputSink) -> Result<()> {
        match event {
            SinkEvent::Caps(caps) => self.set_caps(&caps),
            SinkEvent::Tag {
                location: Some(location),
            } => {
                let location = PathBuf::from(location);
                self.config.location = Some(location.clone());
                self.tracker.on_tag(location)?;
                Ok(())
            }
            SinkEvent::Tag { location: None } => Ok(()),
            SinkEvent::Eos => {
                log::info!("Serializer: got End-Of-Stream event");
                self.ensure_started()?;
                self.emitter.send_eos(&self.sources, sink)?;
                self.tracker.finish();
                self.emitter.send_shutdown(&self.sources, sink)?;
                Ok(())
            }
        }
    }

    /// Serializes one buffer for every logical source. All but the last
    /// envelope are pushed to `sink`; the last one is returned.
    pub fn transform(
        &mut self,
        buffer: &InputBuffer,
        sink: &mut dyn OutputSink,
    ) -> Result<Envelope> {
        self.ensure_started()?;
        let initial_size = self.initial_size.ok_or(SerializerError::NotNegotiated)?;
        log::debug!("Processing frame {:?} of size {}", buffer.pts, buffer.size());

        if self.tracker.check_boundary() {
            let reloaded = self.tracker.reload_sidecar();
            self.emitter.send_eos(&self.sources, sink)?;
            self.tracker.end_segment();
            reloaded?;
        }
        self.tracker.ensure_sidecar_loaded()?;

        let content = match &self.config.frame_type {
            FrameType::Embedded => VideoFrameContent::internal(buffer.data.to_vec()),
            FrameType::ZeroMq => VideoFrameContent::external(ZEROMQ_FRAME_TYPE, None),
            FrameType::Other(name) => {
                log::error!("Unsupported frame type {:?}", name);
                return Err(SerializerError::UnsupportedFrameType(name.clone()));
            }
        };
        let raw_frame = content.is_external().then(|| buffer.data.clone());

        let record = self.tracker.next_record();
        let params = self
            .tracker
            .state()
            .current_frame_params
            .as_ref()
            .ok_or(SerializerError::NotNegotiated)?;
        let timing = Timing {
            pts: buffer.pts,
            dts: buffer.dts,
            duration: buffer.duration,
        };
        let frame = FrameMessageBuilder::new(params, initial_size)
            .with_location(self.tracker.state().current_location.as_deref())
            .with_record(record.as_ref())
            .build(
                &self.sources[0].source_id,
                timing,
                content,
                buffer.is_keyframe(),
            );

        let mut envelopes = self.fan_out(Message::video_frame(frame), buffer, raw_frame)?;
        let primary = envelopes.pop().ok_or(SerializerError::NotStarted)?;
        for envelope in envelopes {
            sink.push(envelope)?;
        }
        self.tracker.frame_emitted();
        Ok(primary)
    }

    /// Encodes the frame once per logical source, in order. Nothing is
    /// returned unless every envelope was encoded.
    fn fan_out(
        &self,
        mut message: Message,
        buffer: &InputBuffer,
        raw_frame: Option<Bytes>,
    ) -> Result<Vec<Envelope>> {
        let mut envelopes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if let Some(frame) = message.as_video_frame_mut() {
                frame.source_id.clone_from(&source.source_id);
            }
            envelopes.push(
                self.emitter
                    .frame_envelope(source, &message, buffer, raw_frame.clone())?,
            );
        }
        Ok(envelopes)
    }

    fn ensure_started(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(SerializerError::NotStarted);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;
