//! ffmpeg-backed media reader: demuxes the best video stream of a file into
//! caps and input buffers. No decoding.

use std::path::Path;

use bytes::Bytes;
use ffmpeg_next::{codec::Id, format::context::Input, media, Rational, Rescale};

use crate::{
    buffer::InputBuffer,
    caps::Caps,
    media::types::MediaReader,
};

const NANOSECONDS: Rational = Rational(1, 1_000_000_000);

/// Registers FFmpeg components. Call once at startup.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

fn caps_name(id: Id) -> Option<&'static str> {
    Some(match id {
        Id::H264 => "video/x-h264",
        Id::HEVC => "video/x-h265",
        Id::VP8 => "video/x-vp8",
        Id::VP9 => "video/x-vp9",
        Id::AV1 => "video/x-av1",
        Id::MJPEG => "image/jpeg",
        Id::PNG => "image/png",
        _ => return None,
    })
}

fn to_nanoseconds(value: Option<i64>, time_base: Rational) -> Option<u64> {
    u64::try_from(value?.rescale(time_base, NANOSECONDS)).ok()
}

pub struct FileDemuxer {
    input: Input,
    stream_index: usize,
    time_base: Rational,
    caps: Caps,
}

impl FileDemuxer {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let input = ffmpeg_next::format::input(path)
            .map_err(|e| anyhow::anyhow!("open input {}: {}", path.display(), e))?;

        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream in {}", path.display()))?;
        let parameters = stream.parameters();
        let id = parameters.id();
        let name = caps_name(id)
            .ok_or_else(|| anyhow::anyhow!("unsupported codec {:?} in {}", id, path.display()))?;

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;
        let mut caps = Caps::new(name).with_size(decoder.width() as i32, decoder.height() as i32);
        let rate = stream.avg_frame_rate();
        if rate.numerator() > 0 && rate.denominator() > 0 {
            caps = caps.with_framerate(rate.numerator(), rate.denominator());
        }

        log::debug!(
            "Demux: {} stream #{} {}, time base {}",
            path.display(),
            stream.index(),
            caps,
            stream.time_base()
        );

        Ok(Self {
            stream_index: stream.index(),
            time_base: stream.time_base(),
            caps,
            input,
        })
    }

    /// Opens a file as a boxed reader, for use as a playlist opener.
    pub fn open_reader(path: &Path) -> anyhow::Result<Box<dyn MediaReader>> {
        Ok(Box::new(Self::open(path)?))
    }
}

impl MediaReader for FileDemuxer {
    fn caps(&self) -> Caps {
        self.caps.clone()
    }

    fn read_buffer(&mut self) -> anyhow::Result<Option<InputBuffer>> {
        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            let data = packet
                .data()
                .map(Bytes::copy_from_slice)
                .unwrap_or_default();
            let duration = Some(packet.duration()).filter(|d| *d > 0);
            let buffer = InputBuffer::new(data, to_nanoseconds(packet.pts(), self.time_base))
                .with_dts(to_nanoseconds(packet.dts(), self.time_base))
                .with_duration(to_nanoseconds(duration, self.time_base))
                .with_delta_unit(!packet.is_key());
            return Ok(Some(buffer));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn test_mp4_path() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("scripts")
            .join("test.mp4")
    }

    #[test]
    fn test_caps_names() {
        assert_eq!(caps_name(Id::H264), Some("video/x-h264"));
        assert_eq!(caps_name(Id::HEVC), Some("video/x-h265"));
        assert_eq!(caps_name(Id::MJPEG), Some("image/jpeg"));
        assert_eq!(caps_name(Id::AAC), None);
    }

    #[test]
    fn test_to_nanoseconds() {
        assert_eq!(to_nanoseconds(Some(90_000), Rational(1, 90_000)), Some(1_000_000_000));
        assert_eq!(to_nanoseconds(Some(1), Rational(1, 10)), Some(100_000_000));
        assert_eq!(to_nanoseconds(None, Rational(1, 10)), None);
        assert_eq!(to_nanoseconds(Some(-1), Rational(1, 10)), None);
    }

    #[test]
    #[ignore = "Requires actual media file"]
    fn test_demux_file() {
        init().unwrap();
        let mut demuxer = FileDemuxer::open(&test_mp4_path()).unwrap();
        assert_eq!(demuxer.caps().name, "video/x-h264");

        let first = demuxer.read_buffer().unwrap().unwrap();
        assert!(first.is_keyframe());
        let mut count = 1;
        while demuxer.read_buffer().unwrap().is_some() {
            count += 1;
        }
        assert!(count > 1);
    }
}
