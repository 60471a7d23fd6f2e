use futures::Stream;
use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};

use tokio::sync::mpsc;

use crate::emitter::{ChannelSink, Envelope};

/// Channel between the blocking element worker and the async output side.
///
/// The worker pushes through [`EnvelopeSinkSource::sink`]; the async side
/// consumes the source as a [`Stream`]. The stream ends once every sink
/// handed out and the source's own writer are dropped.
pub struct EnvelopeSinkSource {
    writer: Mutex<Option<mpsc::Sender<Envelope>>>,
    inner: Mutex<mpsc::Receiver<Envelope>>,
}

impl EnvelopeSinkSource {
    pub fn new() -> Self {
        Self::with_capacity(32)
    }

    pub fn with_capacity(buffer_size: usize) -> Self {
        let (writer, receiver) = mpsc::channel(buffer_size);
        Self {
            writer: Mutex::new(Some(writer)),
            inner: Mutex::new(receiver),
        }
    }

    /// Blocking sink feeding this source. `None` once the source is closed.
    pub fn sink(&self) -> Option<ChannelSink> {
        lock(&self.writer).as_ref().cloned().map(ChannelSink::new)
    }

    /// Drops the source's own writer. The stream ends when outstanding sinks
    /// are dropped as well.
    pub fn close_writer(&self) {
        lock(&self.writer).take();
    }

    fn poll_envelope(&self, cx: &mut Context<'_>) -> Poll<Option<Envelope>> {
        lock(&self.inner).poll_recv(cx)
    }
}

impl Default for EnvelopeSinkSource {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Stream for EnvelopeSinkSource {
    type Item = Envelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_envelope(cx)
    }
}

/// Wrapper to use `Arc<EnvelopeSinkSource>` as Stream (orphan rule workaround).
pub struct EnvelopeStream(pub Arc<EnvelopeSinkSource>);

impl Stream for EnvelopeStream {
    type Item = Envelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_envelope(cx)
    }
}

impl EnvelopeSinkSource {
    /// Returns a stream of envelopes. Use this when you have `Arc<EnvelopeSinkSource>`.
    pub fn as_stream(this: Arc<Self>) -> EnvelopeStream {
        EnvelopeStream(this)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::StreamExt;

    use super::*;
    use crate::emitter::OutputSink;

    fn envelope(topic: &'static str) -> Envelope {
        Envelope::new(Bytes::from_static(topic.as_bytes()), Bytes::new())
    }

    #[tokio::test]
    async fn test_blocking_sink_to_stream() {
        let source = Arc::new(EnvelopeSinkSource::with_capacity(2));
        let mut sink = source.sink().unwrap();
        source.close_writer();

        let worker = tokio::task::spawn_blocking(move || {
            for topic in ["a/", "b/", "c/"] {
                sink.push(envelope(topic)).unwrap();
            }
        });

        let topics: Vec<Vec<u8>> = EnvelopeSinkSource::as_stream(source)
            .map(|e| e.topic().to_vec())
            .collect()
            .await;
        worker.await.unwrap();
        assert_eq!(topics, [b"a/".to_vec(), b"b/".to_vec(), b"c/".to_vec()]);
    }

    #[test]
    fn test_stream_ends_when_writers_dropped() {
        let mut source = EnvelopeSinkSource::new();
        let mut sink = source.sink().unwrap();
        source.close_writer();
        assert!(source.sink().is_none());

        sink.push(envelope("x/")).unwrap();
        drop(sink);
        futures::executor::block_on(async {
            assert_eq!(source.next().await.unwrap().topic(), b"x/");
            assert!(source.next().await.is_none());
        });
    }
}
