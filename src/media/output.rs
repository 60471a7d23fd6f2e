//! Where the pipeline writes envelopes.
//!
//! Dump file layout, per envelope: segment count (u32 BE), then each segment
//! as length (u32 BE) + bytes, then pts, dts and duration as u64 BE with
//! `u64::MAX` standing for "not a time".

use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
};

use crate::{emitter::Envelope, media::types::OutputDest};

const NONE_TIMESTAMP: u64 = u64::MAX;

fn length_prefix(len: usize, what: &str) -> anyhow::Result<u32> {
    u32::try_from(len).map_err(|_| anyhow::anyhow!("{} {} does not fit a dump length", what, len))
}

/// Appends one envelope. Fails without touching `buf` when a count or
/// length does not fit in u32.
pub fn encode_envelope(envelope: &Envelope, buf: &mut BytesMut) -> anyhow::Result<()> {
    let count = length_prefix(envelope.segments.len(), "segment count")?;
    let lengths = envelope
        .segments
        .iter()
        .map(|segment| length_prefix(segment.len(), "segment length"))
        .collect::<anyhow::Result<Vec<_>>>()?;

    buf.put_u32(count);
    for (segment, len) in envelope.segments.iter().zip(lengths) {
        buf.put_u32(len);
        buf.put_slice(segment);
    }
    for timestamp in [envelope.pts, envelope.dts, envelope.duration] {
        buf.put_u64(timestamp.unwrap_or(NONE_TIMESTAMP));
    }
    Ok(())
}

fn take_u32(buf: &mut Bytes) -> Option<u32> {
    (buf.remaining() >= 4).then(|| buf.get_u32())
}

fn take_u64(buf: &mut Bytes) -> Option<u64> {
    (buf.remaining() >= 8).then(|| buf.get_u64())
}

fn take_timestamp(buf: &mut Bytes) -> Option<Option<u64>> {
    take_u64(buf).map(|value| (value != NONE_TIMESTAMP).then_some(value))
}

/// Parses a whole dump back into envelopes.
pub fn decode_dump(data: impl Into<Bytes>) -> anyhow::Result<Vec<Envelope>> {
    let mut buf: Bytes = data.into();
    let mut envelopes = Vec::new();
    while buf.has_remaining() {
        let index = envelopes.len();
        let truncated = || anyhow::anyhow!("dump truncated in envelope #{}", index);

        let count = take_u32(&mut buf).ok_or_else(truncated)?;
        let mut envelope = Envelope::default();
        for _ in 0..count {
            let len = take_u32(&mut buf).ok_or_else(truncated)? as usize;
            if buf.remaining() < len {
                return Err(truncated());
            }
            envelope.segments.push(buf.split_to(len));
        }
        envelope.pts = take_timestamp(&mut buf).ok_or_else(truncated)?;
        envelope.dts = take_timestamp(&mut buf).ok_or_else(truncated)?;
        envelope.duration = take_timestamp(&mut buf).ok_or_else(truncated)?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

pub struct DumpWriter {
    path: PathBuf,
    file: BufWriter<File>,
    buf: BytesMut,
}

impl DumpWriter {
    pub async fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .await
            .with_context(|| format!("create dump file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            buf: BytesMut::with_capacity(4096),
        })
    }

    pub async fn write(&mut self, envelope: &Envelope) -> anyhow::Result<()> {
        self.buf.clear();
        encode_envelope(envelope, &mut self.buf)
            .with_context(|| format!("encode dump entry for {}", envelope))?;
        self.file
            .write_all(&self.buf)
            .await
            .with_context(|| format!("write dump file {}", self.path.display()))
    }

    pub async fn finish(mut self) -> anyhow::Result<()> {
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        Ok(())
    }
}

/// Opened output destination.
pub enum EnvelopeOutput {
    Dump(DumpWriter),
    Log,
    Channel(mpsc::Sender<Envelope>),
}

impl EnvelopeOutput {
    pub async fn open(dest: &OutputDest) -> anyhow::Result<Self> {
        Ok(match dest {
            OutputDest::Dump { path } => {
                log::info!("Output: dumping envelopes to {}", path.display());
                Self::Dump(DumpWriter::create(path).await?)
            }
            OutputDest::Log => Self::Log,
            OutputDest::Channel { sender } => Self::Channel(sender.clone()),
        })
    }

    pub async fn write(&mut self, envelope: Envelope) -> anyhow::Result<()> {
        match self {
            Self::Dump(writer) => writer.write(&envelope).await,
            Self::Log => {
                match envelope.decode() {
                    Ok(message) => log::info!("Output: {} {}", message.kind(), envelope),
                    Err(e) => log::warn!("Output: undecodable {}: {:#}", envelope, e),
                }
                Ok(())
            }
            Self::Channel(sender) => sender
                .send(envelope)
                .await
                .map_err(|_| anyhow::anyhow!("output channel closed")),
        }
    }

    pub async fn finish(self) -> anyhow::Result<()> {
        match self {
            Self::Dump(writer) => writer.finish().await,
            Self::Log | Self::Channel(_) => Ok(()),
        }
    }
}
