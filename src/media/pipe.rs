use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    element::Serializer,
    emitter::{ChannelSink, OutputSink},
    error::SerializerError,
    media::{
        output::EnvelopeOutput,
        stream::EnvelopeSinkSource,
        types::{BufferSource, PipeConfig, SourceItem},
    },
};

/// Counters of one pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipeStats {
    pub events: usize,
    pub buffers: usize,
    /// Buffers the element refused; the stream continued without them.
    pub rejected: usize,
    /// Envelopes handed to the output.
    pub envelopes: usize,
}

/// Pipeline: runs the serializer over a buffer source and writes the
/// envelopes to the configured output.
pub struct Pipe {
    config: PipeConfig,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl Pipe {
    pub fn new(config: PipeConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Check if the pipeline has been started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    /// Check if the pipeline has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs until the source ends or the pipeline is cancelled.
    pub async fn start(&self, source: Box<dyn BufferSource>) -> anyhow::Result<PipeStats> {
        if self.started.swap(true, Ordering::Relaxed) {
            anyhow::bail!("Pipe already started");
        }
        let result = self.run(source).await;
        self.started.store(false, Ordering::Relaxed);
        result
    }

    async fn run(&self, source: Box<dyn BufferSource>) -> anyhow::Result<PipeStats> {
        let mut serializer =
            Serializer::new(self.config.serializer.clone()).context("create serializer")?;
        serializer.start().context("start serializer")?;
        log::info!(
            "Pipe: starting with {} input(s), {} loop(s), sources {:?}",
            self.config.inputs.len(),
            self.config.loops,
            serializer
                .sources()
                .iter()
                .map(|s| s.source_id.as_str())
                .collect::<Vec<_>>()
        );

        let channel = Arc::new(EnvelopeSinkSource::with_capacity(
            self.config.channel_capacity,
        ));
        let mut sink = channel
            .sink()
            .ok_or_else(|| anyhow::anyhow!("envelope channel closed"))?;
        channel.close_writer();

        let mut output = EnvelopeOutput::open(&self.config.output).await?;

        let cancel = self.cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            run_element(serializer, source, &mut sink, &cancel)
        });

        let mut stream = EnvelopeSinkSource::as_stream(channel);
        let mut envelopes = 0;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    log::info!("Pipe: cancelled");
                    break;
                }
                envelope = stream.next() => match envelope {
                    Some(envelope) => {
                        // a channel output may wait on a slow receiver
                        let written = tokio::select! {
                            result = output.write(envelope) => {
                                result?;
                                true
                            }
                            _ = self.cancel.cancelled() => false,
                        };
                        if !written {
                            log::info!("Pipe: cancelled while writing");
                            break;
                        }
                        envelopes += 1;
                    }
                    None => break,
                },
            }
        }
        // unblocks a worker waiting on a full channel
        drop(stream);

        output.finish().await?;
        let mut stats = worker.await.context("element worker panicked")??;
        stats.envelopes = envelopes;
        log::info!("Pipe: finished {:?}", stats);
        Ok(stats)
    }
}

/// Feeds the element from the source until the source ends, the output goes
/// away or the pipeline is cancelled.
fn run_element(
    mut serializer: Serializer,
    mut source: Box<dyn BufferSource>,
    sink: &mut ChannelSink,
    cancel: &CancellationToken,
) -> anyhow::Result<PipeStats> {
    let mut stats = PipeStats::default();
    while !cancel.is_cancelled() {
        let Some(item) = source.next_item()? else {
            break;
        };
        match item {
            SourceItem::Event(event) => {
                stats.events += 1;
                match serializer.handle_event(event, sink) {
                    Ok(()) => {}
                    Err(SerializerError::SinkClosed) => break,
                    Err(e @ SerializerError::Negotiation { .. }) => {
                        return Err(e).context("caps negotiation failed");
                    }
                    Err(e) => log::warn!("Pipe: event failed: {}", e),
                }
            }
            SourceItem::Buffer(buffer) => {
                stats.buffers += 1;
                let result = serializer
                    .transform(&buffer, sink)
                    .and_then(|primary| sink.push(primary));
                match result {
                    Ok(()) => {}
                    Err(SerializerError::SinkClosed) => break,
                    Err(e) => {
                        stats.rejected += 1;
                        log::error!("Pipe: buffer rejected: {}", e);
                    }
                }
            }
        }
    }
    serializer.stop();
    Ok(stats)
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod pipe_test;
