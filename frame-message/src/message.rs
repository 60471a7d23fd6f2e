use serde::{Deserialize, Serialize};

use crate::frame::VideoFrame;

/// Version stamped into every serialized message.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndOfStream {
    pub source_id: String,
}

impl EndOfStream {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shutdown {
    pub auth_token: String,
}

impl Shutdown {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    VideoFrame(VideoFrame),
    EndOfStream(EndOfStream),
    Shutdown(Shutdown),
}

impl Message {
    pub fn video_frame(frame: VideoFrame) -> Self {
        Self::VideoFrame(frame)
    }

    pub fn end_of_stream(eos: EndOfStream) -> Self {
        Self::EndOfStream(eos)
    }

    pub fn shutdown(shutdown: Shutdown) -> Self {
        Self::Shutdown(shutdown)
    }

    pub fn as_video_frame(&self) -> Option<&VideoFrame> {
        match self {
            Self::VideoFrame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_video_frame_mut(&mut self) -> Option<&mut VideoFrame> {
        match self {
            Self::VideoFrame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_end_of_stream(&self) -> Option<&EndOfStream> {
        match self {
            Self::EndOfStream(eos) => Some(eos),
            _ => None,
        }
    }

    pub fn as_shutdown(&self) -> Option<&Shutdown> {
        match self {
            Self::Shutdown(shutdown) => Some(shutdown),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::VideoFrame(_) => "VideoFrame",
            Self::EndOfStream(_) => "EndOfStream",
            Self::Shutdown(_) => "Shutdown",
        }
    }
}

#[derive(Serialize)]
struct WireRef<'a> {
    version: &'a str,
    message: &'a Message,
}

#[derive(Deserialize)]
struct WireOwned {
    version: String,
    message: Message,
}

pub fn save_message_to_bytes(message: &Message) -> anyhow::Result<Vec<u8>> {
    let wire = WireRef {
        version: PROTOCOL_VERSION,
        message,
    };
    serde_json::to_vec(&wire)
        .map_err(|e| anyhow::anyhow!("serialize {} message: {}", message.kind(), e))
}

/// Decodes a payload produced by [`save_message_to_bytes`]. Payloads written
/// by a different protocol version are rejected.
pub fn load_message_from_bytes(bytes: &[u8]) -> anyhow::Result<Message> {
    let wire: WireOwned =
        serde_json::from_slice(bytes).map_err(|e| anyhow::anyhow!("deserialize message: {}", e))?;
    if wire.version != PROTOCOL_VERSION {
        anyhow::bail!(
            "protocol version mismatch: expected {}, found {}",
            PROTOCOL_VERSION,
            wire.version
        );
    }
    log::trace!("decoded {} message", wire.message.kind());
    Ok(wire.message)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;
