use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
};

use tokio::sync::mpsc;

use crate::{
    buffer::{InputBuffer, SinkEvent},
    caps::Caps,
    config::SerializerConfig,
    emitter::Envelope,
};

/// One step of the serialized host stream: an event or a buffer.
#[derive(Clone, Debug)]
pub enum SourceItem {
    Event(SinkEvent),
    Buffer(InputBuffer),
}

impl SourceItem {
    pub fn caps(caps: Caps) -> Self {
        Self::Event(SinkEvent::Caps(caps))
    }

    pub fn location(location: impl Into<String>) -> Self {
        Self::Event(SinkEvent::Tag {
            location: Some(location.into()),
        })
    }

    pub fn eos() -> Self {
        Self::Event(SinkEvent::Eos)
    }
}

impl Display for SourceItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceItem::Event(SinkEvent::Caps(caps)) => write!(f, "Caps {}", caps),
            SourceItem::Event(SinkEvent::Tag { location }) => write!(f, "Tag {:?}", location),
            SourceItem::Event(SinkEvent::Eos) => write!(f, "Eos"),
            SourceItem::Buffer(buffer) => write!(f, "{}", buffer),
        }
    }
}

/// Produces the serialized stream the element consumes. Runs on a blocking
/// worker thread.
pub trait BufferSource: Send {
    /// `Ok(None)` ends the stream.
    fn next_item(&mut self) -> anyhow::Result<Option<SourceItem>>;
}

impl BufferSource for std::vec::IntoIter<SourceItem> {
    fn next_item(&mut self) -> anyhow::Result<Option<SourceItem>> {
        Ok(self.next())
    }
}

/// A demuxed media file.
pub trait MediaReader: Send {
    /// Caps of the video stream being read.
    fn caps(&self) -> Caps;

    /// `Ok(None)` at end of file.
    fn read_buffer(&mut self) -> anyhow::Result<Option<InputBuffer>>;
}

/// Input configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputConfig {
    File { path: PathBuf },
}

/// Output destination
#[derive(Clone, Debug)]
pub enum OutputDest {
    /// Length-prefixed multipart dump file
    Dump { path: PathBuf },
    /// One log line per envelope
    Log,
    /// Forward envelopes to a channel
    Channel { sender: mpsc::Sender<Envelope> },
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipeConfig {
    pub inputs: Vec<InputConfig>,
    /// How many times the playlist is replayed after the first pass.
    pub loops: usize,
    pub output: OutputDest,
    pub serializer: SerializerConfig,
    /// Capacity of the channel between the element worker and the output.
    pub channel_capacity: usize,
}

impl PipeConfig {
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

    pub fn builder() -> PipeConfigBuilder {
        PipeConfigBuilder::default()
    }

    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|input| match input {
                InputConfig::File { path } => path.clone(),
            })
            .collect()
    }
}

#[derive(Default)]
pub struct PipeConfigBuilder {
    inputs: Vec<InputConfig>,
    loops: usize,
    output: Option<OutputDest>,
    serializer: Option<SerializerConfig>,
    channel_capacity: Option<usize>,
}

impl PipeConfigBuilder {
    /// Add a file to the playlist
    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(InputConfig::File { path: path.into() });
        self
    }

    pub fn loops(mut self, loops: usize) -> Self {
        self.loops = loops;
        self
    }

    pub fn serializer(mut self, config: SerializerConfig) -> Self {
        self.serializer = Some(config);
        self
    }

    pub fn dump_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(OutputDest::Dump { path: path.into() });
        self
    }

    pub fn log_output(mut self) -> Self {
        self.output = Some(OutputDest::Log);
        self
    }

    pub fn channel_output(mut self, sender: mpsc::Sender<Envelope>) -> Self {
        self.output = Some(OutputDest::Channel { sender });
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> anyhow::Result<PipeConfig> {
        let serializer = self
            .serializer
            .ok_or_else(|| anyhow::anyhow!("serializer config is required"))?;
        serializer.validate()?;
        let channel_capacity = self
            .channel_capacity
            .unwrap_or(PipeConfig::DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            anyhow::bail!("channel capacity must be positive");
        }

        Ok(PipeConfig {
            inputs: self.inputs,
            loops: self.loops,
            output: self.output.unwrap_or(OutputDest::Log),
            serializer,
            channel_capacity,
        })
    }
}
