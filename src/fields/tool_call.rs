use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Where a tool call occurred relative to the surrounding content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPosition {
    AfterText,
    AfterFile,
    BeforeConclusion,
}

impl ToolPosition {
    /// Map a marker key (`tool_after_text`, ...) to its position.
    #[must_use]
    pub fn from_marker(key: &str) -> Option<Self> {
        match key {
            "tool_after_text" => Some(Self::AfterText),
            "tool_after_file" => Some(Self::AfterFile),
            "tool_before_conclusion" => Some(Self::BeforeConclusion),
            _ => None,
        }
    }

    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::AfterText => "tool_after_text",
            Self::AfterFile => "tool_after_file",
            Self::BeforeConclusion => "tool_before_conclusion",
        }
    }
}

/// A tool invocation the backend reported inline with its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub position: ToolPosition,
    pub name: String,
    pub query: String,
    /// File open when an `after_file` marker was seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    tool_name: String,
    query: String,
}

/// Largest tool-call payload kept in memory; longer spans are still scanned
/// to their closing brace but dropped.
pub(crate) const MAX_TOOL_CALL_LEN: usize = 512 * 1024;

/// Brace-counting accumulator for one tool-call object.
///
/// Braces inside JSON strings of the object do not count, so a query such as
/// `"a } b"` cannot close the object early.
#[derive(Debug, Clone)]
pub(crate) struct ToolCallScanner {
    position: ToolPosition,
    file_index: Option<usize>,
    raw: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
    overflowed: bool,
}

impl ToolCallScanner {
    /// Start scanning right after the opening `{` has been consumed.
    pub(crate) fn open(position: ToolPosition, file_index: Option<usize>) -> Self {
        Self {
            position,
            file_index,
            raw: String::from("{"),
            depth: 1,
            in_string: false,
            escaped: false,
            overflowed: false,
        }
    }

    /// Consume one character. Returns `true` once the object is balanced.
    pub(crate) fn push(&mut self, c: char) -> bool {
        if !self.overflowed {
            if self.raw.len() + c.len_utf8() > MAX_TOOL_CALL_LEN {
                self.overflowed = true;
                self.raw = String::new();
            } else {
                self.raw.push(c);
            }
        }
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }
        match c {
            '"' => self.in_string = true,
            '{' => self.depth += 1,
            '}' => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }

    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    /// Parse the balanced object into a [`ToolCall`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::ToolCall`] when the payload is not valid JSON or
    /// `tool_name`/`query` are missing or empty, or the payload exceeded
    /// [`MAX_TOOL_CALL_LEN`].
    pub(crate) fn finish(self) -> Result<ToolCall, DecodeError> {
        if self.overflowed {
            return Err(DecodeError::ToolCall(format!(
                "{}: payload exceeds {MAX_TOOL_CALL_LEN} bytes",
                self.position.marker()
            )));
        }
        let payload: ToolCallPayload = serde_json::from_str(&self.raw)
            .map_err(|e| DecodeError::ToolCall(format!("{}: {e}", self.position.marker())))?;
        if payload.tool_name.is_empty() || payload.query.is_empty() {
            return Err(DecodeError::ToolCall(format!(
                "{}: empty tool_name or query",
                self.position.marker()
            )));
        }
        Ok(ToolCall {
            position: self.position,
            name: payload.tool_name,
            query: payload.query,
            file_index: self.file_index,
        })
    }
}
