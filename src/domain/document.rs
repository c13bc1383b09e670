//! Document: a caller-submitted piece of input text before segmentation (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    PlainText,
    Markdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub format: SourceFormat,
    pub filename: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>, format: SourceFormat, filename: Option<String>) -> Self {
        Self {
            text: text.into(),
            format,
            filename,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
