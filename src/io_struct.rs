use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::LimitsConfig;
use crate::error::ApiError;

/// Body of `POST /api/stream` and `POST /api/render`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image as a data URL (or any URL the upstream model accepts).
    #[serde(
        default,
        rename = "imageUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

impl AnalyzeRequest {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image_url().is_some()
    }

    /// First `max_chars` characters of the text, for logging.
    pub fn text_preview(&self, max_chars: usize) -> Option<String> {
        self.text().map(|t| t.chars().take(max_chars).collect())
    }

    /// Reject requests before any upstream stream is opened.
    pub fn validate(&self, limits: &LimitsConfig) -> Result<(), ApiError> {
        let text = self.text();
        let image = self.image_url();

        if text.is_none() && image.is_none() {
            return Err(ApiError::InvalidInput(
                "text or imageUrl is required".to_string(),
            ));
        }

        if let Some(text) = text {
            let length = text.chars().count();
            if length > limits.max_text_chars {
                return Err(ApiError::InvalidInput(format!(
                    "Text must be at most {} characters (got {})",
                    limits.max_text_chars, length
                )));
            }
        }

        if let Some(image) = image {
            if image.len() > limits.max_image_bytes {
                return Err(ApiError::InvalidInput(format!(
                    "Image is too large: {} bytes exceeds limit of {} bytes",
                    image.len(),
                    limits.max_image_bytes
                )));
            }
        }

        Ok(())
    }

    /// OpenAI-compatible chat messages: system prompt, then one user message
    /// carrying the image part (if any) followed by the text part.
    pub fn to_messages(&self, system_prompt: &str) -> Vec<Value> {
        let mut content = Vec::new();
        if let Some(url) = self.image_url() {
            content.push(json!({"type": "image_url", "image_url": {"url": url}}));
        }
        if let Some(text) = self.text() {
            content.push(json!({"type": "text", "text": text}));
        }

        vec![
            json!({"role": "system", "content": system_prompt}),
            json!({"role": "user", "content": content}),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_text_chars: 10,
            max_image_bytes: 16,
        }
    }

    #[test]
    fn test_deserialize_camel_case_image() {
        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"text": "hi", "imageUrl": "data:image/png;base64,AA"}"#)
                .unwrap();
        assert_eq!(req.text(), Some("hi"));
        assert_eq!(req.image_url(), Some("data:image/png;base64,AA"));
    }

    #[test]
    fn test_requires_text_or_image() {
        let err = AnalyzeRequest::default().validate(&limits()).unwrap_err();
        assert_eq!(err.to_string(), "text or imageUrl is required");

        let req = AnalyzeRequest {
            text: Some(String::new()),
            image_url: Some(String::new()),
        };
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn test_text_limit_counts_characters() {
        let req = AnalyzeRequest {
            text: Some("静".repeat(10)),
            image_url: None,
        };
        assert!(req.validate(&limits()).is_ok());

        let req = AnalyzeRequest {
            text: Some("a".repeat(11)),
            image_url: None,
        };
        assert!(matches!(
            req.validate(&limits()),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_image_limit() {
        let req = AnalyzeRequest {
            text: None,
            image_url: Some("x".repeat(17)),
        };
        assert!(req.validate(&limits()).is_err());
    }

    #[test]
    fn test_messages_put_image_first() {
        let req = AnalyzeRequest {
            text: Some("a street".to_string()),
            image_url: Some("data:image/png;base64,AA".to_string()),
        };
        let messages = req.to_messages("prompt");
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "prompt");
        assert_eq!(messages[1]["content"][0]["type"], "image_url");
        assert_eq!(messages[1]["content"][1]["text"], "a street");
    }

    #[test]
    fn test_text_preview() {
        let req = AnalyzeRequest {
            text: Some("abcdef".to_string()),
            image_url: None,
        };
        assert_eq!(req.text_preview(3).as_deref(), Some("abc"));
        assert!(!req.has_image());
    }
}
