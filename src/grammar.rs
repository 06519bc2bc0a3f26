use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

/// The delimiters the model is instructed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Summary,
    Container,
    Finding,
    Target,
    Category,
    Reasoning,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::Summary,
        Tag::Container,
        Tag::Finding,
        Tag::Target,
        Tag::Category,
        Tag::Reasoning,
    ];

    /// Field name used in configuration and error messages.
    pub fn field(&self) -> &'static str {
        match self {
            Tag::Summary => "summary",
            Tag::Container => "container",
            Tag::Finding => "finding",
            Tag::Target => "target",
            Tag::Category => "category",
            Tag::Reasoning => "reasoning",
        }
    }
}

/// Model-facing tag names.
///
/// The category field is emitted as `<type>` by default because that is the
/// word the model is prompted with; parsing only ever looks at the literal
/// open/close forms produced by [`TagSet::open`] and [`TagSet::close`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSet {
    pub summary: String,
    pub container: String,
    pub finding: String,
    pub target: String,
    pub category: String,
    pub reasoning: String,
}

impl Default for TagSet {
    fn default() -> Self {
        Self {
            summary: "summary".to_string(),
            container: "omomuki-array".to_string(),
            finding: "omomuki".to_string(),
            target: "target".to_string(),
            category: "type".to_string(),
            reasoning: "reasoning".to_string(),
        }
    }
}

impl TagSet {
    /// Tag names without any product vocabulary.
    pub fn neutral() -> Self {
        Self {
            summary: "summary".to_string(),
            container: "findings".to_string(),
            finding: "finding".to_string(),
            target: "target".to_string(),
            category: "category".to_string(),
            reasoning: "reasoning".to_string(),
        }
    }

    pub fn name(&self, tag: Tag) -> &str {
        match tag {
            Tag::Summary => &self.summary,
            Tag::Container => &self.container,
            Tag::Finding => &self.finding,
            Tag::Target => &self.target,
            Tag::Category => &self.category,
            Tag::Reasoning => &self.reasoning,
        }
    }

    pub fn open(&self, tag: Tag) -> String {
        format!("<{}>", self.name(tag))
    }

    pub fn close(&self, tag: Tag) -> String {
        format!("</{}>", self.name(tag))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for tag in Tag::ALL {
            let name = self.name(tag);
            if name.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("tags.{}", tag.field()),
                });
            }
            if name
                .chars()
                .any(|c| c == '<' || c == '>' || c == '/' || c.is_whitespace())
            {
                return Err(ConfigError::InvalidValue {
                    field: format!("tags.{}", tag.field()),
                    value: name.to_string(),
                    reason: "Tag names cannot contain '<', '>', '/' or whitespace".to_string(),
                });
            }
        }

        for (i, a) in Tag::ALL.iter().enumerate() {
            for b in &Tag::ALL[i + 1..] {
                if self.name(*a) == self.name(*b) {
                    return Err(ConfigError::IncompatibleConfig {
                        reason: format!(
                            "tags.{} and tags.{} share the name '{}'",
                            a.field(),
                            b.field(),
                            self.name(*a)
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Output-format section appended to the system prompt.
    pub fn format_instructions(&self) -> String {
        format!(
            "Output format:\n\
             1. A short summary of the scene inside {summary_open}...{summary_close}.\n\
             2. One to three findings wrapped in {container_open}...{container_close}, each written as:\n\
             {finding_open}\n  {target_open}what produces it{target_close}\n  \
             {category_open}one category{category_close}\n  \
             {reasoning_open}why it matters{reasoning_close}\n{finding_close}\n",
            summary_open = self.open(Tag::Summary),
            summary_close = self.close(Tag::Summary),
            container_open = self.open(Tag::Container),
            container_close = self.close(Tag::Container),
            finding_open = self.open(Tag::Finding),
            finding_close = self.close(Tag::Finding),
            target_open = self.open(Tag::Target),
            target_close = self.close(Tag::Target),
            category_open = self.open(Tag::Category),
            category_close = self.close(Tag::Category),
            reasoning_open = self.open(Tag::Reasoning),
            reasoning_close = self.close(Tag::Reasoning),
        )
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`.
///
/// A marker split across two increments shows up as such a suffix; callers
/// hold it back instead of displaying half a tag.
pub fn partial_marker_suffix(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&i| {
            let start = text.len() - i;
            text.is_char_boundary(start) && marker.starts_with(&text[start..])
        })
        .unwrap_or(0)
}
