//! Full-buffer extraction of the summary and finding records.
//!
//! Every call re-scans the whole buffer. A marker split across two transport
//! increments only becomes recognizable once both halves have arrived, so no
//! cursor is kept between calls and the same buffer always yields the same
//! [`Extraction`].

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};
use crate::grammar::{Tag, TagSet, partial_marker_suffix};

/// A finding whose finding-close marker has arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub target: String,
    pub category: String,
    pub reasoning: String,
}

impl Finding {
    pub fn new(
        target: impl Into<String>,
        category: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            category: category.into(),
            reasoning: reasoning.into(),
        }
    }
}

/// Best-effort fields of the finding currently being emitted.
///
/// Fields whose opening marker has not arrived yet are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFinding {
    pub target: String,
    pub category: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Both summary markers are present.
    Complete(String),
    /// Opening marker only; the text is replaced as more arrives.
    Provisional(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub summary: Option<Summary>,
    pub completed: Vec<Finding>,
    pub partial: Option<PartialFinding>,
}

/// Compiled matcher for one [`TagSet`].
#[derive(Debug, Clone)]
pub struct Extractor {
    tags: TagSet,
    finding_re: Regex,
    summary_open: String,
    summary_close: String,
    finding_open: String,
    finding_close: String,
}

impl Extractor {
    pub fn new(tags: TagSet) -> ConfigResult<Self> {
        tags.validate()?;

        let esc = |tag: Tag, open: bool| {
            if open {
                regex::escape(&tags.open(tag))
            } else {
                regex::escape(&tags.close(tag))
            }
        };

        // Target and category are single-line labels; reasoning is free text.
        let pattern = format!(
            r"(?s){}.*?{}([^<]+){}.*?{}([^<]+){}.*?{}(.*?){}.*?{}",
            esc(Tag::Finding, true),
            esc(Tag::Target, true),
            esc(Tag::Target, false),
            esc(Tag::Category, true),
            esc(Tag::Category, false),
            esc(Tag::Reasoning, true),
            esc(Tag::Reasoning, false),
            esc(Tag::Finding, false),
        );
        let finding_re = Regex::new(&pattern).map_err(|e| ConfigError::ValidationFailed {
            reason: format!("Failed to compile finding pattern: {}", e),
        })?;

        Ok(Self {
            summary_open: tags.open(Tag::Summary),
            summary_close: tags.close(Tag::Summary),
            finding_open: tags.open(Tag::Finding),
            finding_close: tags.close(Tag::Finding),
            finding_re,
            tags,
        })
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Parse `buffer` from the start.
    ///
    /// `known_completed` is the number of completed findings a previous call
    /// already reported. The partial finding is only computed when no new
    /// completed finding appeared, since a finding that just closed would
    /// otherwise be reported twice.
    pub fn extract(&self, buffer: &str, known_completed: usize) -> Extraction {
        let summary = self.extract_summary(buffer);
        let completed = self.extract_completed(buffer);
        let partial = if completed.len() == known_completed {
            self.extract_partial(buffer)
        } else {
            None
        };

        Extraction {
            summary,
            completed,
            partial,
        }
    }

    fn extract_summary(&self, buffer: &str) -> Option<Summary> {
        let start = buffer.find(&self.summary_open)? + self.summary_open.len();
        let rest = &buffer[start..];
        match rest.find(&self.summary_close) {
            Some(end) => Some(Summary::Complete(rest[..end].trim().to_string())),
            None => {
                let held = partial_marker_suffix(rest, &self.summary_close);
                Some(Summary::Provisional(
                    rest[..rest.len() - held].trim().to_string(),
                ))
            }
        }
    }

    fn extract_completed(&self, buffer: &str) -> Vec<Finding> {
        self.finding_re
            .captures_iter(buffer)
            .filter_map(|cap| {
                Some(Finding {
                    target: cap.get(1)?.as_str().trim().to_string(),
                    category: cap.get(2)?.as_str().trim().to_string(),
                    reasoning: cap.get(3)?.as_str().trim().to_string(),
                })
            })
            .collect()
    }

    /// The first finding-open marker with no finding-close anywhere after it.
    fn open_span<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        let after_last_close = buffer
            .rfind(&self.finding_close)
            .map(|pos| pos + self.finding_close.len())
            .unwrap_or(0);
        let tail = &buffer[after_last_close..];
        let open = tail.find(&self.finding_open)?;
        Some(&tail[open + self.finding_open.len()..])
    }

    fn extract_partial(&self, buffer: &str) -> Option<PartialFinding> {
        let span = self.open_span(buffer)?;
        Some(PartialFinding {
            target: self.partial_field(span, Tag::Target, true),
            category: self.partial_field(span, Tag::Category, true),
            reasoning: self.partial_field(span, Tag::Reasoning, false),
        })
    }

    fn partial_field(&self, span: &str, tag: Tag, label: bool) -> String {
        let open = self.tags.open(tag);
        let close = self.tags.close(tag);
        let Some(start) = span.find(&open) else {
            return String::new();
        };
        let rest = &span[start + open.len()..];

        let value = match rest.find(&close) {
            Some(end) => &rest[..end],
            None => {
                let held = partial_marker_suffix(rest, &close);
                &rest[..rest.len() - held]
            }
        };

        // Labels never contain markup, so anything from the first '<' on is
        // the start of some other marker.
        let value = if label {
            value.split('<').next().unwrap_or_default()
        } else {
            value
        };

        value.trim().to_string()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(TagSet::default()).expect("default tag set is valid")
    }
}
