//! Segment filename templates
//!
//! Recognised tokens: `$RepresentationID$`, `$Number$`, `$Bandwidth$`,
//! `$Time$` and `$ext$`. `$Number$`, `$Bandwidth$` and `$Time$` accept a
//! printf width tag (`$Number%05d$`). `$$` is a literal dollar sign.

use std::fmt;

use crate::error::{ExportError, Result};

/// Widest printf tag accepted in a template
pub const MAX_WIDTH: usize = 32;

/// A substitution token inside a segment template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    RepresentationId,
    Number,
    Bandwidth,
    Time,
    Ext,
}

impl Token {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "RepresentationID" => Some(Token::RepresentationId),
            "Number" => Some(Token::Number),
            "Bandwidth" => Some(Token::Bandwidth),
            "Time" => Some(Token::Time),
            "ext" => Some(Token::Ext),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Token::RepresentationId => "RepresentationID",
            Token::Number => "Number",
            Token::Bandwidth => "Bandwidth",
            Token::Time => "Time",
            Token::Ext => "ext",
        }
    }

    /// Tokens whose value changes from one segment to the next
    pub fn varies_per_segment(&self) -> bool {
        matches!(self, Token::Number | Token::Time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Token { token: Token, width: Option<usize> },
}

/// Values for the tokens that are fixed for a whole representation
#[derive(Debug, Clone, Default)]
pub struct FixedValues<'a> {
    pub representation_id: &'a str,
    pub bandwidth: u64,
    pub ext: &'a str,
}

/// A parsed, validated segment template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    source: String,
    parts: Vec<Part>,
}

impl SegmentTemplate {
    /// Parse a template, rejecting unknown or malformed tokens.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find('$') {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('$').ok_or_else(|| {
                ExportError::config(format!("unterminated token in segment template {:?}", source))
            })?;
            let inner = &after[..end];
            rest = &after[end + 1..];

            if inner.is_empty() {
                literal.push('$');
                continue;
            }

            let caps = regex!(r"^([A-Za-z]+)(?:%0?([0-9]+)d)?$")
                .captures(inner)
                .ok_or_else(|| {
                    ExportError::config(format!(
                        "malformed token ${}$ in segment template {:?}",
                        inner, source
                    ))
                })?;
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let token = Token::from_name(name).ok_or_else(|| {
                ExportError::config(format!(
                    "unknown token ${}$ in segment template {:?}",
                    name, source
                ))
            })?;
            let width = match caps.get(2) {
                Some(w) => {
                    if matches!(token, Token::RepresentationId | Token::Ext) {
                        return Err(ExportError::config(format!(
                            "token ${}$ does not take a width in {:?}",
                            name, source
                        )));
                    }
                    let width = w
                        .as_str()
                        .parse::<usize>()
                        .ok()
                        .filter(|&w| w <= MAX_WIDTH)
                        .ok_or_else(|| {
                            ExportError::config(format!(
                                "invalid width in ${}$ (at most {})",
                                inner, MAX_WIDTH
                            ))
                        })?;
                    Some(width)
                }
                None => None,
            };

            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Token { token, width });
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// Parse a media segment template, which must name each segment
    /// differently through `$Number$` or `$Time$`.
    pub fn parse_media(source: &str) -> Result<Self> {
        let template = Self::parse(source)?;
        if !template.has_varying_token() {
            return Err(ExportError::config(format!(
                "segment template {:?} needs $Number$ or $Time$",
                source
            )));
        }
        Ok(template)
    }

    /// Parse an init segment template. There is one init segment per
    /// representation, so per-segment tokens are rejected.
    pub fn parse_init(source: &str) -> Result<Self> {
        let template = Self::parse(source)?;
        if template.has_varying_token() {
            return Err(ExportError::config(format!(
                "init segment template {:?} cannot use $Number$ or $Time$",
                source
            )));
        }
        Ok(template)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_varying_token(&self) -> bool {
        self.tokens().any(|t| t.varies_per_segment())
    }

    fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.parts.iter().filter_map(|p| match p {
            Part::Token { token, .. } => Some(*token),
            Part::Literal(_) => None,
        })
    }

    /// Substitute the per-representation tokens and keep `$Number$` and
    /// `$Time$` (with their width tags) for the player to expand.
    pub fn resolve_fixed(&self, values: &FixedValues<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(&s.replace('$', "$$")),
                Part::Token { token, width } => match token {
                    Token::RepresentationId => out.push_str(values.representation_id),
                    Token::Ext => out.push_str(values.ext),
                    Token::Bandwidth => out.push_str(&pad(values.bandwidth, *width)),
                    Token::Number | Token::Time => {
                        out.push('$');
                        out.push_str(token.name());
                        if let Some(w) = width {
                            out.push_str(&format!("%0{}d", w));
                        }
                        out.push('$');
                    }
                },
            }
        }
        out
    }

    /// Translate to a printf-style pattern for muxers that number files
    /// with `%d` (the HLS muxer). `$Time$` has no printf equivalent.
    pub fn to_printf(&self, values: &FixedValues<'_>) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(&s.replace('%', "%%")),
                Part::Token { token, width } => match token {
                    Token::RepresentationId => out.push_str(&values.representation_id.replace('%', "%%")),
                    Token::Ext => out.push_str(values.ext),
                    Token::Bandwidth => out.push_str(&pad(values.bandwidth, *width)),
                    Token::Number => match width {
                        Some(w) => out.push_str(&format!("%0{}d", w)),
                        None => out.push_str("%d"),
                    },
                    Token::Time => {
                        return Err(ExportError::config(format!(
                            "$Time$ cannot be used in HLS segment names ({:?})",
                            self.source
                        )))
                    }
                },
            }
        }
        Ok(out)
    }

    /// Expand every token to produce one concrete segment filename.
    pub fn expand(&self, values: &FixedValues<'_>, number: u64, time: u64) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Token { token, width } => match token {
                    Token::RepresentationId => out.push_str(values.representation_id),
                    Token::Ext => out.push_str(values.ext),
                    Token::Bandwidth => out.push_str(&pad(values.bandwidth, *width)),
                    Token::Number => out.push_str(&pad(number, *width)),
                    Token::Time => out.push_str(&pad(time, *width)),
                },
            }
        }
        out
    }
}

fn pad(value: u64, width: Option<usize>) -> String {
    match width {
        Some(w) => format!("{:0width$}", value, width = w),
        None => value.to_string(),
    }
}

impl fmt::Display for SegmentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
