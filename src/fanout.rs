//! Logical sources: the (source id, topic) pairs one input is fanned out to.

use std::collections::HashSet;

use bytes::Bytes;

use crate::{
    config::{SerializerConfig, DEFAULT_SOURCE_ID_PATTERN},
    error::{Result, SerializerError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalSource {
    pub source_id: String,
    pub topic: Bytes,
}

impl LogicalSource {
    pub fn new(source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        let topic = Bytes::from(format!("{}/", source_id));
        Self { source_id, topic }
    }
}

/// Builds the logical sources for a configuration. Runs once at start.
pub fn logical_sources(config: &SerializerConfig) -> Result<Vec<LogicalSource>> {
    let source_ids = if config.enable_multistream {
        let pattern = config
            .source_id_pattern
            .as_deref()
            .unwrap_or(DEFAULT_SOURCE_ID_PATTERN);
        let ids = expand_pattern(pattern, config.number_of_streams)?;
        if let Some(duplicate) = find_duplicate(&ids) {
            return Err(SerializerError::DuplicateSourceIds {
                pattern: pattern.to_string(),
                duplicate: duplicate.to_string(),
            });
        }
        ids
    } else {
        let source_id = config
            .source_id
            .as_ref()
            .ok_or(SerializerError::MissingSourceId)?;
        vec![source_id.clone()]
    };

    Ok(source_ids.into_iter().map(LogicalSource::new).collect())
}

fn find_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().map(String::as_str).find(|id| !seen.insert(*id))
}

/// Generates `count` ids, substituting the stream index into the pattern.
pub fn expand_pattern(pattern: &str, count: usize) -> Result<Vec<String>> {
    let parts = parse_pattern(pattern)?;
    Ok((0..count).map(|i| render(&parts, i)).collect())
}

#[derive(Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Index(Conversion),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Kind {
    #[default]
    Decimal,
    Str,
    Hex,
    UpperHex,
    Octal,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Conversion {
    kind: Kind,
    left_align: bool,
    zero_pad: bool,
    alternate: bool,
    sign: Option<char>,
    width: usize,
}

fn parse_pattern(pattern: &str) -> Result<Vec<Part>> {
    let invalid = |reason: &str| SerializerError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut conversions = 0;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }

        let mut conversion = Conversion::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => conversion.left_align = true,
                '0' => conversion.zero_pad = true,
                '#' => conversion.alternate = true,
                '+' => conversion.sign = Some('+'),
                ' ' if conversion.sign.is_none() => conversion.sign = Some(' '),
                ' ' => {}
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(&digit) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(digit);
            chars.next();
        }
        if !width.is_empty() {
            conversion.width = width
                .parse()
                .map_err(|_| invalid("conversion width is too large"))?;
        }

        conversion.kind = match chars.next() {
            Some('d' | 'i' | 'u') => Kind::Decimal,
            Some('s') => Kind::Str,
            Some('x') => Kind::Hex,
            Some('X') => Kind::UpperHex,
            Some('o') => Kind::Octal,
            Some(other) => {
                return Err(invalid(&format!("unsupported conversion '%{}'", other)));
            }
            None => return Err(invalid("incomplete conversion at end of pattern")),
        };
        conversions += 1;
        if conversions > 1 {
            return Err(invalid("more than one conversion"));
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }
        parts.push(Part::Index(conversion));
    }
    if conversions == 0 {
        return Err(invalid("no conversion for the stream index"));
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

impl Conversion {
    /// Sign and radix prefix, then digits. `%s` takes neither.
    fn split(&self, index: usize) -> (String, String) {
        let digits = match self.kind {
            Kind::Decimal | Kind::Str => index.to_string(),
            Kind::Hex => format!("{:x}", index),
            Kind::UpperHex => format!("{:X}", index),
            Kind::Octal => format!("{:o}", index),
        };
        if self.kind == Kind::Str {
            return (String::new(), digits);
        }
        let mut prefix = self.sign.map(String::from).unwrap_or_default();
        if self.alternate {
            prefix.push_str(match self.kind {
                Kind::Hex => "0x",
                Kind::UpperHex => "0X",
                Kind::Octal => "0o",
                Kind::Decimal | Kind::Str => "",
            });
        }
        (prefix, digits)
    }
}

fn render(parts: &[Part], index: usize) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Literal(s) => out.push_str(s),
            Part::Index(conversion) => {
                let (prefix, digits) = conversion.split(index);
                let pad = conversion
                    .width
                    .saturating_sub(prefix.len() + digits.len());
                if conversion.left_align {
                    out.push_str(&prefix);
                    out.push_str(&digits);
                    out.push_str(&" ".repeat(pad));
                } else if conversion.zero_pad && conversion.kind != Kind::Str {
                    out.push_str(&prefix);
                    out.push_str(&"0".repeat(pad));
                    out.push_str(&digits);
                } else {
                    out.push_str(&" ".repeat(pad));
                    out.push_str(&prefix);
                    out.push_str(&digits);
                }
            }
        }
    }
    out
}
