//! Serializes a video buffer stream into frame messages, one per logical
//! source, with end-of-stream markers at segment boundaries.

pub mod buffer;
pub mod builder;
pub mod caps;
pub mod config;
pub mod element;
pub mod emitter;
pub mod error;
pub mod fanout;
pub mod lifecycle;
pub mod media;
pub mod sidecar;

pub use buffer::{InputBuffer, SinkEvent};
pub use caps::{Caps, FrameParams};
pub use config::{FrameType, SerializerConfig};
pub use element::Serializer;
pub use emitter::{ChannelSink, Envelope, OutputSink};
pub use error::{SerializerError, SidecarError};
pub use media::pipe::{Pipe, PipeStats};
pub use media::types::PipeConfig;
