//! Field Stream Decoder for structured ("code mode") responses.
//!
//! The backend streams a restricted JSON object:
//!
//! ```text
//! {"Text":"...","Files":[{"FileName":"a.py","FileVersion":1,"FileCode":"...","FileText":"..."}],
//!  "tool_after_file":{"tool_name":"search","query":"..."},"Conclusion":"..."}
//! ```
//!
//! [`FieldStreamDecoder`] consumes it fragment by fragment and reports field
//! content as soon as it is decoded, without re-reading earlier input.

mod decoder;
mod escape;
mod tool_call;


use serde::Serialize;

pub use decoder::{FieldStreamDecoder, Scope};
pub use tool_call::{ToolCall, ToolPosition};

/// The string (or numeric) fields of the response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldName {
    Text,
    FileName,
    FileVersion,
    FileCode,
    FileText,
    Conclusion,
}

impl FieldName {
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Text" => Some(Self::Text),
            "FileName" => Some(Self::FileName),
            "FileVersion" => Some(Self::FileVersion),
            "FileCode" => Some(Self::FileCode),
            "FileText" => Some(Self::FileText),
            "Conclusion" => Some(Self::Conclusion),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::FileName => "FileName",
            Self::FileVersion => "FileVersion",
            Self::FileCode => "FileCode",
            Self::FileText => "FileText",
            Self::Conclusion => "Conclusion",
        }
    }

    /// Fields that belong to an entry of the `Files` array.
    #[must_use]
    pub fn is_file_scoped(self) -> bool {
        matches!(
            self,
            Self::FileName | Self::FileVersion | Self::FileCode | Self::FileText
        )
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `Files` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Materialized view of everything decoded so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub files: Vec<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Set once the root object's closing brace has been consumed.
    pub complete: bool,
}

/// Incremental output of [`FieldStreamDecoder::process_chunk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FieldEvent {
    FileStarted {
        index: usize,
    },
    FieldStarted {
        field: FieldName,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_index: Option<usize>,
    },
    FieldContent {
        field: FieldName,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_index: Option<usize>,
        text: String,
    },
    FieldEnded {
        field: FieldName,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_index: Option<usize>,
    },
    ToolCall(ToolCall),
    ResponseCompleted,
}

/// Callback surface for [`FieldEvent`]s; implement only the hooks you need.
pub trait FieldHandler {
    fn on_file_start(&mut self, _index: usize) {}
    fn on_field_start(&mut self, _field: FieldName, _file_index: Option<usize>) {}
    fn on_field_content(&mut self, _field: FieldName, _text: &str, _file_index: Option<usize>) {}
    fn on_field_end(&mut self, _field: FieldName, _file_index: Option<usize>) {}
    fn on_tool_call(&mut self, _call: &ToolCall) {}
    fn on_complete(&mut self) {}

    fn handle(&mut self, event: &FieldEvent) {
        match event {
            FieldEvent::FileStarted { index } => self.on_file_start(*index),
            FieldEvent::FieldStarted { field, file_index } => {
                self.on_field_start(*field, *file_index);
            }
            FieldEvent::FieldContent {
                field,
                file_index,
                text,
            } => self.on_field_content(*field, text, *file_index),
            FieldEvent::FieldEnded { field, file_index } => self.on_field_end(*field, *file_index),
            FieldEvent::ToolCall(call) => self.on_tool_call(call),
            FieldEvent::ResponseCompleted => self.on_complete(),
        }
    }
}

impl FieldHandler for Vec<FieldEvent> {
    fn handle(&mut self, event: &FieldEvent) {
        self.push(event.clone());
    }
}
