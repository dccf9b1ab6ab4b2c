//! Text documents and the source of their current contents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Zero-based position in a text buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Zero-based, end-exclusive range in a text buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Snapshot of a document's text with line addressing.
#[derive(Debug, Clone)]
pub struct TextDocument {
    text: String,
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl TextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Range covering a whole line, given a 1-based line number.
    ///
    /// Lines past the end clamp to the last line; line 0 is treated as line 1.
    pub fn line_range(&self, line: u32) -> Range {
        let index = (line.max(1) as usize - 1).min(self.line_count() - 1);
        let start = self.line_starts[index];
        let end = self
            .line_starts
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let content = self.text[start..end].trim_end_matches('\r');

        Range {
            start: Position {
                line: index as u32,
                character: 0,
            },
            end: Position {
                line: index as u32,
                character: content.chars().count() as u32,
            },
        }
    }
}

/// Provides the current text of a document.
///
/// Editors hand out unsaved buffer contents here; the command line reads the
/// file from disk with [`FsDocuments`].
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn read_text(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads documents straight from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDocuments;

#[async_trait]
impl DocumentSource for FsDocuments {
    async fn read_text(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}
