//! Negotiated stream format and the frame parameters derived from it.

use std::fmt::{Display, Formatter};

use crate::error::{Result, SerializerError};

/// Media type description handed over by the host at negotiation time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caps {
    /// Media type name, e.g. "video/x-h264"
    pub name: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// numerator/denominator
    pub framerate: Option<(i32, i32)>,
    /// Raw video pixel format, e.g. "RGBA"
    pub format: Option<String>,
}

impl Caps {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_framerate(mut self, num: i32, den: i32) -> Self {
        self.framerate = Some((num, den));
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

impl Display for Caps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(format) = &self.format {
            write!(f, ", format={}", format)?;
        }
        if let Some(width) = self.width {
            write!(f, ", width={}", width)?;
        }
        if let Some(height) = self.height {
            write!(f, ", height={}", height)?;
        }
        if let Some((num, den)) = self.framerate {
            write!(f, ", framerate={}/{}", num, den)?;
        }
        Ok(())
    }
}

/// Codecs the serializer can describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Jpeg,
    Png,
    RawRgba,
    RawRgb24,
}

impl Codec {
    pub const ALL: [Codec; 9] = [
        Codec::H264,
        Codec::Hevc,
        Codec::Vp8,
        Codec::Vp9,
        Codec::Av1,
        Codec::Jpeg,
        Codec::Png,
        Codec::RawRgba,
        Codec::RawRgb24,
    ];

    /// Name carried in frame messages.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::H264 => "h264",
            Codec::Hevc => "hevc",
            Codec::Vp8 => "vp8",
            Codec::Vp9 => "vp9",
            Codec::Av1 => "av1",
            Codec::Jpeg => "jpeg",
            Codec::Png => "png",
            Codec::RawRgba => "raw-rgba",
            Codec::RawRgb24 => "raw-rgb24",
        }
    }

    pub fn caps_name(&self) -> &'static str {
        match self {
            Codec::H264 => "video/x-h264",
            Codec::Hevc => "video/x-h265",
            Codec::Vp8 => "video/x-vp8",
            Codec::Vp9 => "video/x-vp9",
            Codec::Av1 => "video/x-av1",
            Codec::Jpeg => "image/jpeg",
            Codec::Png => "image/png",
            Codec::RawRgba | Codec::RawRgb24 => "video/x-raw",
        }
    }

    /// Pixel format required for raw video codecs.
    pub fn raw_format(&self) -> Option<&'static str> {
        match self {
            Codec::RawRgba => Some("RGBA"),
            Codec::RawRgb24 => Some("RGB"),
            _ => None,
        }
    }

    pub fn from_caps(caps: &Caps) -> Option<Codec> {
        Self::ALL.into_iter().find(|codec| {
            codec.caps_name() == caps.name
                && match codec.raw_format() {
                    Some(format) => caps.format.as_deref() == Some(format),
                    None => true,
                }
        })
    }
}

/// Codec, geometry and framerate of the current stream. Compared between
/// consecutive buffers to detect parameter changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameParams {
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub framerate: String,
}

impl FrameParams {
    /// Derives frame parameters from negotiated caps. `default_framerate` is
    /// used when the caps do not carry one.
    pub fn from_caps(caps: &Caps, default_framerate: &str) -> Result<Self> {
        let negotiation_error = |reason: &str| SerializerError::Negotiation {
            caps: caps.to_string(),
            reason: reason.to_string(),
        };

        let codec = Codec::from_caps(caps).ok_or_else(|| negotiation_error("unknown codec"))?;
        let width = caps
            .width
            .filter(|w| *w > 0)
            .ok_or_else(|| negotiation_error("width is missing"))?;
        let height = caps
            .height
            .filter(|h| *h > 0)
            .ok_or_else(|| negotiation_error("height is missing"))?;
        let framerate = match caps.framerate {
            Some((num, den)) => format!("{}/{}", num, den),
            None => default_framerate.to_string(),
        };

        Ok(Self {
            codec_name: codec.name().to_string(),
            width: width as u32,
            height: height as u32,
            framerate,
        })
    }
}

impl Display for FrameParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{}@{}",
            self.codec_name, self.width, self.height, self.framerate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_by_caps_name() {
        assert_eq!(Codec::from_caps(&Caps::new("video/x-h264")), Some(Codec::H264));
        assert_eq!(Codec::from_caps(&Caps::new("video/x-h265")), Some(Codec::Hevc));
        assert_eq!(Codec::from_caps(&Caps::new("image/jpeg")), Some(Codec::Jpeg));
        assert_eq!(
            Codec::from_caps(&Caps::new("video/x-raw").with_format("RGBA")),
            Some(Codec::RawRgba)
        );
        assert_eq!(
            Codec::from_caps(&Caps::new("video/x-raw").with_format("RGB")),
            Some(Codec::RawRgb24)
        );
        assert_eq!(Codec::from_caps(&Caps::new("video/x-raw").with_format("NV12")), None);
        assert_eq!(Codec::from_caps(&Caps::new("audio/mpeg")), None);
    }

    #[test]
    fn test_frame_params_from_caps() {
        let caps = Caps::new("video/x-h264")
            .with_size(1920, 1080)
            .with_framerate(25, 1);
        let params = FrameParams::from_caps(&caps, "30/1").unwrap();

        assert_eq!(params.codec_name, "h264");
        assert_eq!(params.width, 1920);
        assert_eq!(params.height, 1080);
        assert_eq!(params.framerate, "25/1");
    }

    #[test]
    fn test_frame_params_default_framerate() {
        let caps = Caps::new("image/jpeg").with_size(640, 480);
        let params = FrameParams::from_caps(&caps, "15/1").unwrap();
        assert_eq!(params.framerate, "15/1");
    }

    #[test]
    fn test_frame_params_rejects_unsupported_caps() {
        let err = FrameParams::from_caps(&Caps::new("video/x-theora").with_size(10, 10), "30/1")
            .unwrap_err();
        assert!(matches!(err, SerializerError::Negotiation { .. }));

        let err = FrameParams::from_caps(&Caps::new("video/x-h264"), "30/1").unwrap_err();
        assert!(err.to_string().contains("width is missing"));
    }

    #[test]
    fn test_frame_params_equality() {
        let caps = Caps::new("video/x-h264").with_size(640, 480);
        let a = FrameParams::from_caps(&caps, "30/1").unwrap();
        let b = FrameParams::from_caps(&caps, "30/1").unwrap();
        let c = FrameParams::from_caps(&caps.clone().with_size(1280, 720), "30/1").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
