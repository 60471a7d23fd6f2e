//! Wire envelopes and the sink they are pushed to.

use std::fmt::{Display, Formatter};

use bytes::Bytes;
use frame_message::{save_message_to_bytes, EndOfStream, Message, Shutdown};
use tokio::sync::mpsc;

use crate::{
    buffer::InputBuffer,
    error::{Result, SerializerError},
    fanout::LogicalSource,
};

/// One multipart output message: `[topic, payload]` optionally followed by
/// the raw frame bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Envelope {
    pub segments: Vec<Bytes>,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub duration: Option<u64>,
}

impl Envelope {
    pub fn new(topic: Bytes, payload: Bytes) -> Self {
        Self {
            segments: vec![topic, payload],
            ..Default::default()
        }
    }

    pub fn topic(&self) -> &[u8] {
        self.segments.first().map(|s| &s[..]).unwrap_or_default()
    }

    pub fn payload(&self) -> &[u8] {
        self.segments.get(1).map(|s| &s[..]).unwrap_or_default()
    }

    /// Raw frame bytes of a by-reference frame.
    pub fn raw_frame(&self) -> Option<&Bytes> {
        self.segments.get(2)
    }

    pub fn decode(&self) -> anyhow::Result<Message> {
        frame_message::load_message_from_bytes(self.payload())
    }
}

impl Display for Envelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope topic: {}, segments: {}, size: {}, pts: {:?}",
            String::from_utf8_lossy(self.topic()),
            self.segments.len(),
            self.segments.iter().map(Bytes::len).sum::<usize>(),
            self.pts
        )
    }
}

/// Destination of the element's output. Pushing may block; that is the only
/// backpressure the element sees.
pub trait OutputSink {
    fn push(&mut self, envelope: Envelope) -> Result<()>;
}

impl OutputSink for Vec<Envelope> {
    fn push(&mut self, envelope: Envelope) -> Result<()> {
        Vec::push(self, envelope);
        Ok(())
    }
}

/// Feeds a bounded tokio channel from a blocking context. Must not be used
/// from inside an async task.
pub struct ChannelSink {
    sender: mpsc::Sender<Envelope>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Envelope>) -> Self {
        Self { sender }
    }
}

impl OutputSink for ChannelSink {
    fn push(&mut self, envelope: Envelope) -> Result<()> {
        self.sender
            .blocking_send(envelope)
            .map_err(|_| SerializerError::SinkClosed)
    }
}

fn encode(message: &Message) -> Result<Bytes> {
    save_message_to_bytes(message)
        .map(Bytes::from)
        .map_err(|source| SerializerError::Encode {
            kind: message.kind(),
            source,
        })
}

/// Serializes messages into envelopes.
#[derive(Clone, Debug, Default)]
pub struct MessageEmitter {
    shutdown_auth: Option<String>,
}

impl MessageEmitter {
    pub fn new(shutdown_auth: Option<String>) -> Self {
        Self { shutdown_auth }
    }

    /// Envelope of a frame message for one logical source. Timing is copied
    /// from the input buffer; `raw_frame` is appended for by-reference
    /// content.
    pub fn frame_envelope(
        &self,
        source: &LogicalSource,
        message: &Message,
        buffer: &InputBuffer,
        raw_frame: Option<Bytes>,
    ) -> Result<Envelope> {
        let mut envelope = Envelope::new(source.topic.clone(), encode(message)?);
        envelope.segments.extend(raw_frame);
        envelope.pts = buffer.pts;
        envelope.dts = buffer.dts;
        envelope.duration = buffer.duration;
        Ok(envelope)
    }

    /// Pushes one end-of-stream per logical source, in order.
    pub fn send_eos(&self, sources: &[LogicalSource], sink: &mut dyn OutputSink) -> Result<()> {
        log::info!("Sending serialized EOS message");
        for source in sources {
            let message = Message::end_of_stream(EndOfStream::new(source.source_id.as_str()));
            sink.push(Envelope::new(source.topic.clone(), encode(&message)?))?;
        }
        Ok(())
    }

    /// Pushes a shutdown message on the first source's topic when an auth
    /// token is configured. Returns whether one was sent.
    pub fn send_shutdown(
        &self,
        sources: &[LogicalSource],
        sink: &mut dyn OutputSink,
    ) -> Result<bool> {
        let (Some(auth), Some(source)) = (&self.shutdown_auth, sources.first()) else {
            return Ok(false);
        };
        log::info!("Sending serialized Shutdown message");
        let message = Message::shutdown(Shutdown::new(auth.as_str()));
        sink.push(Envelope::new(source.topic.clone(), encode(&message)?))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<LogicalSource> {
        vec![LogicalSource::new("a"), LogicalSource::new("b")]
    }

    #[test]
    fn test_eos_per_source_in_order() {
        let mut sink: Vec<Envelope> = Vec::new();
        MessageEmitter::default().send_eos(&sources(), &mut sink).unwrap();

        assert_eq!(sink.len(), 2);
        for (envelope, id) in sink.iter().zip(["a", "b"]) {
            assert_eq!(envelope.topic(), format!("{id}/").as_bytes());
            assert_eq!(envelope.segments.len(), 2);
            assert_eq!(envelope.pts, None);
            let message = envelope.decode().unwrap();
            assert_eq!(message.as_end_of_stream().unwrap().source_id, id);
        }
    }

    #[test]
    fn test_shutdown_only_with_auth() {
        let mut sink: Vec<Envelope> = Vec::new();
        let sent = MessageEmitter::default()
            .send_shutdown(&sources(), &mut sink)
            .unwrap();
        assert!(!sent);
        assert!(sink.is_empty());

        let emitter = MessageEmitter::new(Some("secret".to_string()));
        assert!(emitter.send_shutdown(&sources(), &mut sink).unwrap());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].topic(), b"a/");
        assert_eq!(sink[0].decode().unwrap().as_shutdown().unwrap().auth_token, "secret");
    }

    #[test]
    fn test_frame_envelope_timing_and_raw_segment() {
        let source = LogicalSource::new("cam");
        let message = Message::end_of_stream(EndOfStream::new("cam"));
        let buffer = InputBuffer::new(vec![9u8; 4], Some(10))
            .with_dts(Some(5))
            .with_duration(None);
        let emitter = MessageEmitter::default();

        let envelope = emitter
            .frame_envelope(&source, &message, &buffer, Some(buffer.data.clone()))
            .unwrap();
        assert_eq!(envelope.segments.len(), 3);
        assert_eq!(&envelope.raw_frame().unwrap()[..], &[9u8, 9, 9, 9]);
        assert_eq!(
            (envelope.pts, envelope.dts, envelope.duration),
            (Some(10), Some(5), None)
        );

        let envelope = emitter.frame_envelope(&source, &message, &buffer, None).unwrap();
        assert_eq!(envelope.segments.len(), 2);
        assert!(envelope.raw_frame().is_none());
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sender, mut receiver) = mpsc::channel(4);
        let worker = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(sender);
            MessageEmitter::default().send_eos(&sources(), &mut sink)
        });

        worker.await.unwrap().unwrap();
        assert_eq!(receiver.recv().await.unwrap().topic(), b"a/");
        assert_eq!(receiver.recv().await.unwrap().topic(), b"b/");
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_channel_sink_closed() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let mut sink = ChannelSink::new(sender);
        let err = sink.push(Envelope::default()).unwrap_err();
        assert!(matches!(err, SerializerError::SinkClosed));
    }
}
