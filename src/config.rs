use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{Result, SerializerError};

pub const DEFAULT_FRAMERATE: &str = "30/1";
pub const DEFAULT_SOURCE_ID_PATTERN: &str = "source-%d";
pub const MAX_NUMBER_OF_STREAMS: usize = 1024;
pub const EMBEDDED_FRAME_TYPE: &str = "embedded";
pub const ZEROMQ_FRAME_TYPE: &str = "zeromq";

/// How frame content travels to the consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FrameType {
    /// Frame bytes are copied into the message.
    Embedded,
    /// Frame bytes follow the message as a separate envelope segment.
    #[default]
    ZeroMq,
    /// A reference scheme this element cannot produce. Accepted as
    /// configuration, rejected for every buffer.
    Other(String),
}

impl FrameType {
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::Embedded => EMBEDDED_FRAME_TYPE,
            FrameType::ZeroMq => ZEROMQ_FRAME_TYPE,
            FrameType::Other(name) => name,
        }
    }

    pub fn is_external(&self) -> bool {
        !matches!(self, FrameType::Embedded)
    }
}

impl From<String> for FrameType {
    fn from(value: String) -> Self {
        match value.as_str() {
            EMBEDDED_FRAME_TYPE => FrameType::Embedded,
            ZEROMQ_FRAME_TYPE => FrameType::ZeroMq,
            _ => FrameType::Other(value),
        }
    }
}

impl FromStr for FrameType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(FrameType::from(s.to_string()))
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element configuration. Field names match the option names.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SerializerConfig {
    pub source_id: Option<String>,
    pub location: Option<PathBuf>,
    pub framerate: String,
    pub eos_on_file_end: bool,
    pub eos_on_loop_end: bool,
    pub eos_on_frame_params_change: bool,
    pub read_metadata: bool,
    pub frame_type: FrameType,
    pub enable_multistream: bool,
    pub source_id_pattern: Option<String>,
    pub number_of_streams: usize,
    pub shutdown_auth: Option<String>,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            source_id: None,
            location: None,
            framerate: DEFAULT_FRAMERATE.to_string(),
            eos_on_file_end: true,
            eos_on_loop_end: false,
            eos_on_frame_params_change: true,
            read_metadata: false,
            frame_type: FrameType::default(),
            enable_multistream: false,
            source_id_pattern: Some(DEFAULT_SOURCE_ID_PATTERN.to_string()),
            number_of_streams: 1,
            shutdown_auth: None,
        }
    }
}

impl SerializerConfig {
    /// Single stream configuration with the given source id.
    pub fn with_source_id(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Default::default()
        }
    }

    /// Loads a JSON configuration file; missing options keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: SerializerConfig = serde_json::from_slice(&data)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validate config file {}", path.display()))?;
        Ok(config)
    }

    /// Checks the options that can be validated without starting the element.
    pub fn validate(&self) -> Result<()> {
        validate_framerate(&self.framerate)?;
        if self.number_of_streams == 0 || self.number_of_streams > MAX_NUMBER_OF_STREAMS {
            return Err(SerializerError::InvalidStreamCount {
                value: self.number_of_streams,
                max: MAX_NUMBER_OF_STREAMS,
            });
        }
        Ok(())
    }
}

/// Accepts "N", "N/D" with a non-zero denominator, and decimal notation.
pub fn validate_framerate(framerate: &str) -> Result<()> {
    let invalid = || SerializerError::InvalidFramerate(framerate.to_string());
    let value = framerate.trim();
    match value.split_once('/') {
        Some((num, den)) => {
            num.trim().parse::<i64>().map_err(|_| invalid())?;
            let den = den.trim().parse::<i64>().map_err(|_| invalid())?;
            if den == 0 {
                return Err(invalid());
            }
        }
        None => {
            if value.parse::<i64>().is_err() {
                let parsed = value.parse::<f64>().map_err(|_| invalid())?;
                if !parsed.is_finite() {
                    return Err(invalid());
                }
            }
        }
    }
    Ok(())
}
