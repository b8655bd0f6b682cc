use tracing_subscriber::EnvFilter;

use crate::fenced::{SegmentHandler, SegmentId, SegmentKind};
use crate::fields::{FieldHandler, FieldName, ToolCall};

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
///
/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Handler that records decoder activity as `debug` events and keeps counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TracingHandler {
    pub files: usize,
    pub fields: usize,
    pub tool_calls: usize,
    pub segments: usize,
    pub chars: usize,
}

impl FieldHandler for TracingHandler {
    fn on_file_start(&mut self, index: usize) {
        self.files += 1;
        tracing::debug!(index, "file started");
    }

    fn on_field_start(&mut self, field: FieldName, file_index: Option<usize>) {
        self.fields += 1;
        tracing::debug!(%field, ?file_index, "field started");
    }

    fn on_field_content(&mut self, _field: FieldName, text: &str, _file_index: Option<usize>) {
        self.chars += text.chars().count();
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.tool_calls += 1;
        tracing::debug!(name = %call.name, position = ?call.position, "tool call");
    }

    fn on_complete(&mut self) {
        tracing::debug!(
            files = self.files,
            fields = self.fields,
            chars = self.chars,
            "response complete"
        );
    }
}

impl SegmentHandler for TracingHandler {
    fn on_segment_created(&mut self, id: SegmentId, kind: SegmentKind) {
        self.segments += 1;
        tracing::debug!(%id, ?kind, "segment created");
    }

    fn on_segment_updated(&mut self, _id: SegmentId, text: &str) {
        self.chars += text.chars().count();
    }

    fn on_segment_closed(&mut self, id: SegmentId) {
        tracing::debug!(%id, "segment closed");
    }

    fn on_reset(&mut self) {
        tracing::debug!("segments reset");
        self.segments = 0;
        self.chars = 0;
    }
}
