//! Stream lifecycle: decides when a logical segment ends and owns the
//! per-segment counters.

use std::path::{Path, PathBuf};

use crate::{
    caps::FrameParams,
    config::SerializerConfig,
    error::SidecarError,
    sidecar::{sidecar_path, FrameRecord, MetadataFileReader},
};

/// Conditions that force an end-of-stream before the next frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundaryTriggers {
    pub eos_on_file_end: bool,
    pub eos_on_loop_end: bool,
    pub eos_on_frame_params_change: bool,
}

impl From<&SerializerConfig> for BoundaryTriggers {
    fn from(config: &SerializerConfig) -> Self {
        Self {
            eos_on_file_end: config.eos_on_file_end,
            eos_on_loop_end: config.eos_on_loop_end,
            eos_on_frame_params_change: config.eos_on_frame_params_change,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Snapshot {
    location: Option<PathBuf>,
    frame_params: Option<FrameParams>,
}

#[derive(Debug, Default)]
pub struct SegmentState {
    pub current_location: Option<PathBuf>,
    pub current_frame_params: Option<FrameParams>,
    /// Values seen with the previous buffer; `None` until the first buffer.
    previous: Option<Snapshot>,
    pub loop_restarted: bool,
    /// At least one frame was emitted since the last end-of-stream.
    pub stream_in_progress: bool,
    /// Number of frames built since the sidecar was last (re)loaded.
    pub frame_index: usize,
    pub sidecar_records: Option<Vec<FrameRecord>>,
    /// Location the sidecar was last loaded for.
    sidecar_location: Option<PathBuf>,
    sidecar_loaded: bool,
}

impl SegmentState {
    pub fn previous_location(&self) -> Option<&Path> {
        self.previous.as_ref()?.location.as_deref()
    }

    pub fn previous_frame_params(&self) -> Option<&FrameParams> {
        self.previous.as_ref()?.frame_params.as_ref()
    }

    /// Sidecar records not attached to any frame yet.
    pub fn unconsumed_records(&self) -> usize {
        self.sidecar_records
            .as_ref()
            .map_or(0, |records| records.len().saturating_sub(self.frame_index))
    }
}

pub struct LifecycleTracker {
    triggers: BoundaryTriggers,
    read_metadata: bool,
    state: SegmentState,
}

impl LifecycleTracker {
    pub fn new(config: &SerializerConfig) -> Self {
        Self {
            triggers: BoundaryTriggers::from(config),
            read_metadata: config.read_metadata,
            state: SegmentState {
                current_location: config.location.clone(),
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> &SegmentState {
        &self.state
    }

    pub fn set_location(&mut self, location: Option<PathBuf>) {
        self.state.current_location = location;
    }

    pub fn set_frame_params(&mut self, frame_params: FrameParams) {
        self.state.current_frame_params = Some(frame_params);
    }

    /// Evaluates the boundary triggers for the next buffer against the values
    /// seen with the previous one, then records the current values.
    ///
    /// Returns `true` when a segment boundary fires. The caller then reloads
    /// the sidecar, emits end-of-stream and calls [`Self::end_segment`].
    pub fn check_boundary(&mut self) -> bool {
        let current = Snapshot {
            location: self.state.current_location.clone(),
            frame_params: self.state.current_frame_params.clone(),
        };

        let boundary = match &self.state.previous {
            Some(previous) if self.state.stream_in_progress => {
                (self.triggers.eos_on_file_end && current.location != previous.location)
                    || (self.triggers.eos_on_frame_params_change
                        && current.frame_params != previous.frame_params)
                    || (self.triggers.eos_on_loop_end && self.state.loop_restarted)
            }
            _ => false,
        };

        if boundary {
            log::info!(
                "segment boundary: location {:?} -> {:?}, loop restarted: {}",
                self.state.previous_location(),
                current.location,
                self.state.loop_restarted
            );
        }

        self.state.previous = Some(current);
        self.state.loop_restarted = false;
        boundary
    }

    /// A tag event announced a (re)opened file.
    pub fn on_tag(&mut self, location: PathBuf) -> Result<(), SidecarError> {
        log::info!("Set location to {}", location.display());
        self.state.current_location = Some(location);
        self.state.loop_restarted = true;
        self.reload_sidecar()
    }

    /// Replaces the sidecar records with the ones for the current location
    /// and resets the frame index. A missing file leaves no records.
    ///
    /// A sidecar already loaded for the current location with no frame
    /// consumed yet is kept, e.g. a tag load followed by the file boundary.
    ///
    /// On a malformed file the state is still updated (no records) and the
    /// error is returned to the caller.
    pub fn reload_sidecar(&mut self) -> Result<(), SidecarError> {
        if self.sidecar_is_fresh() {
            return Ok(());
        }
        self.warn_unconsumed();
        self.state.frame_index = 0;
        self.state.sidecar_records = None;
        self.state.sidecar_location = self.state.current_location.clone();
        self.state.sidecar_loaded = true;

        if !self.read_metadata {
            return Ok(());
        }
        let Some(location) = &self.state.current_location else {
            return Ok(());
        };

        let path = sidecar_path(location);
        match MetadataFileReader::load(&path)? {
            Some(records) => {
                log::info!(
                    "Loaded {} frame records from {}",
                    records.len(),
                    path.display()
                );
                self.state.sidecar_records = Some(records);
            }
            None => log::warn!("JSON file {} not found", path.display()),
        }
        Ok(())
    }

    fn sidecar_is_fresh(&self) -> bool {
        self.state.sidecar_loaded
            && self.state.frame_index == 0
            && self.state.sidecar_location == self.state.current_location
    }

    /// Loads the sidecar when the location changed since the last load
    /// without a tag event, e.g. a statically configured location.
    pub fn ensure_sidecar_loaded(&mut self) -> Result<(), SidecarError> {
        if self.read_metadata && self.state.sidecar_location != self.state.current_location {
            self.reload_sidecar()?;
        }
        Ok(())
    }

    /// Record for the next frame. Advances the frame index only when a record
    /// exists at it.
    pub fn next_record(&mut self) -> Option<FrameRecord> {
        if !self.read_metadata {
            return None;
        }
        let record = self
            .state
            .sidecar_records
            .as_ref()?
            .get(self.state.frame_index)?
            .clone();
        self.state.frame_index += 1;
        Some(record)
    }

    pub fn frame_emitted(&mut self) {
        self.state.stream_in_progress = true;
    }

    pub fn end_segment(&mut self) {
        self.state.stream_in_progress = false;
    }

    /// Upstream end-of-stream.
    pub fn finish(&mut self) {
        self.warn_unconsumed();
        self.end_segment();
    }

    fn warn_unconsumed(&self) {
        let unconsumed = self.state.unconsumed_records();
        if unconsumed > 0 {
            log::warn!(
                "{} sidecar records for {:?} were not matched by any frame",
                unconsumed,
                self.state.sidecar_location
            );
        }
    }
}
