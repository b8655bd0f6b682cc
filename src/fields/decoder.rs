use memchr::memchr2;

use super::escape::{Feed, JsonUnescaper};
use super::tool_call::{ToolCallScanner, ToolPosition};
use super::{CodeResponse, FieldEvent, FieldHandler, FieldName, FileRecord};

// Incremental decoder for the structured response object.
//
// The decoder is a character-driven state machine. Keys are only recognized
// in key position (a quoted string followed by `:`), string values of keys it
// does not know are skipped escape-aware, and all state needed to resume a
// key, escape sequence, number, or tool-call object lives in `Mode`, so any
// fragment boundary is safe.
//
// Invariants:
// - At most one field is open; its decoded content is flushed before any
//   later event is emitted.
// - The file index grows by one per `FileName` value and is never reused.
// - File-scoped fields only reach the file opened by their own object.
// - While a tool-call object is open nothing else is recognized.

/// Longest key worth buffering; anything longer cannot be a known key.
const MAX_KEY_LEN: usize = "tool_before_conclusion".len() + 1;

const FILES_KEY: &str = "Files";

/// Which part of the response the scanner is positioned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Inside the root object (or any container outside `Files`).
    Response,
    /// Directly inside the `Files` array.
    FilesArray,
    /// Inside one object of the `Files` array.
    FileObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
    FilesArray,
    FileObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Field(FieldName),
    Files,
    Tool(ToolPosition),
    Unknown,
}

impl Key {
    fn classify(raw: &str) -> Self {
        if let Some(field) = FieldName::from_key(raw) {
            Self::Field(field)
        } else if raw == FILES_KEY {
            Self::Files
        } else if let Some(position) = ToolPosition::from_marker(raw) {
            Self::Tool(position)
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone)]
enum Mode {
    AwaitingKey,
    InKey { raw: String, escaped: bool },
    AwaitingColon(Key),
    AwaitingValue(Key),
    InString,
    /// Bare numeric `FileVersion` value.
    InNumber,
    SkippingString { escaped: bool },
    InToolCall(ToolCallScanner),
}

#[derive(Debug, Clone, Copy)]
struct OpenField {
    field: FieldName,
    file_index: Option<usize>,
}

/// Where the content of a newly opened field goes.
enum Route {
    Response,
    File(usize),
    /// File-scoped field before any `FileName`: nothing to attach it to.
    Nowhere,
}

#[inline]
fn is_json_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

#[inline]
fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
}

/// Streaming decoder for structured code responses.
///
/// Feed it successive new-only fragments; create a fresh instance (or call
/// [`reset`](Self::reset)) per response.
#[derive(Debug, Clone)]
pub struct FieldStreamDecoder {
    mode: Mode,
    stack: Vec<Container>,
    open_field: Option<OpenField>,
    active_file: Option<usize>,
    /// File opened by the current file object's `FileName`; cleared when a
    /// new file object starts.
    object_file: Option<usize>,
    unescaper: JsonUnescaper,
    /// Content decoded during the current call, not yet emitted.
    pending: String,
    version_raw: String,
    response: CodeResponse,
    consumed: usize,
}

impl Default for FieldStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldStreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::AwaitingKey,
            stack: Vec::new(),
            open_field: None,
            active_file: None,
            object_file: None,
            unescaper: JsonUnescaper::new(),
            pending: String::new(),
            version_raw: String::new(),
            response: CodeResponse::default(),
            consumed: 0,
        }
    }

    /// Decode the next fragment and return the events it produced, in input
    /// order. An empty fragment is a no-op.
    pub fn process_chunk(&mut self, chunk: &str) -> Vec<FieldEvent> {
        let mut events = Vec::new();
        if chunk.is_empty() {
            return events;
        }
        tracing::trace!(len = chunk.len(), consumed = self.consumed, "field chunk");

        let bytes = chunk.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            // Fast path: copy plain string content up to the next quote or backslash.
            let bulk = match self.mode {
                Mode::InString if self.unescaper.is_idle() => true,
                Mode::SkippingString { escaped: false } => true,
                _ => false,
            };
            if bulk {
                let rest = &bytes[i..];
                let run = memchr2(b'"', b'\\', rest).unwrap_or(rest.len());
                if run > 0 {
                    if matches!(self.mode, Mode::InString) {
                        self.pending.push_str(&chunk[i..i + run]);
                    }
                    i += run;
                    continue;
                }
            }

            let Some(c) = chunk[i..].chars().next() else {
                break;
            };
            self.step(c, &mut events);
            i += c.len_utf8();
        }

        self.flush_content(&mut events);
        self.consumed += chunk.chars().count();
        events
    }

    /// Decode the next fragment and dispatch its events to `handler`.
    pub fn process_chunk_into<H: FieldHandler + ?Sized>(&mut self, chunk: &str, handler: &mut H) {
        for event in self.process_chunk(chunk) {
            handler.handle(&event);
        }
    }

    /// Borrow the current materialized response.
    #[must_use]
    pub fn response(&self) -> &CodeResponse {
        &self.response
    }

    /// Owned copy of the current materialized response.
    #[must_use]
    pub fn snapshot(&self) -> CodeResponse {
        self.response.clone()
    }

    /// Number of input characters consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    #[must_use]
    pub fn active_file_index(&self) -> Option<usize> {
        self.active_file
    }

    /// Field currently receiving content, if any.
    #[must_use]
    pub fn open_field(&self) -> Option<(FieldName, Option<usize>)> {
        self.open_field.map(|open| (open.field, open.file_index))
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        match self.stack.last() {
            Some(Container::FilesArray) => Scope::FilesArray,
            Some(Container::FileObject) => Scope::FileObject,
            _ => Scope::Response,
        }
    }

    #[must_use]
    pub fn in_tool_call(&self) -> bool {
        matches!(self.mode, Mode::InToolCall(_))
    }

    /// Discard all state so the instance can decode an unrelated response.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // -- state machine ------------------------------------------------------

    fn step(&mut self, c: char, events: &mut Vec<FieldEvent>) {
        // Each pass either consumes `c` and returns, or falls back to
        // `AwaitingKey` and reprocesses it there.
        loop {
            match std::mem::replace(&mut self.mode, Mode::AwaitingKey) {
                Mode::AwaitingKey => {
                    self.structural(c, events);
                    return;
                }
                Mode::InKey { mut raw, escaped } => {
                    if !escaped && c == '"' {
                        self.mode = Mode::AwaitingColon(Key::classify(&raw));
                        return;
                    }
                    if raw.len() <= MAX_KEY_LEN {
                        raw.push(c);
                    }
                    self.mode = Mode::InKey {
                        raw,
                        escaped: !escaped && c == '\\',
                    };
                    return;
                }
                Mode::AwaitingColon(key) => {
                    if is_json_ws(c) {
                        self.mode = Mode::AwaitingColon(key);
                        return;
                    }
                    if c == ':' {
                        self.mode = Mode::AwaitingValue(key);
                        return;
                    }
                    // The quoted string was a value (e.g. an array element).
                }
                Mode::AwaitingValue(key) => {
                    if is_json_ws(c) {
                        self.mode = Mode::AwaitingValue(key);
                        return;
                    }
                    if self.open_value(key, c, events) {
                        return;
                    }
                }
                Mode::InString => {
                    if self.unescaper.feed(c, &mut self.pending) == Feed::Closed {
                        self.end_field(events);
                    } else {
                        self.mode = Mode::InString;
                    }
                    return;
                }
                Mode::InNumber => {
                    if is_number_char(c) {
                        self.pending.push(c);
                        self.mode = Mode::InNumber;
                        return;
                    }
                    self.end_field(events);
                }
                Mode::SkippingString { escaped } => {
                    if escaped || c != '"' {
                        self.mode = Mode::SkippingString {
                            escaped: !escaped && c == '\\',
                        };
                    }
                    return;
                }
                Mode::InToolCall(mut scanner) => {
                    if scanner.push(c) {
                        self.finish_tool_call(scanner, events);
                    } else {
                        self.mode = Mode::InToolCall(scanner);
                    }
                    return;
                }
            }
        }
    }

    fn structural(&mut self, c: char, events: &mut Vec<FieldEvent>) {
        match c {
            '"' => {
                self.mode = Mode::InKey {
                    raw: String::new(),
                    escaped: false,
                };
            }
            '{' => {
                let container = if self.stack.last() == Some(&Container::FilesArray) {
                    self.object_file = None;
                    Container::FileObject
                } else {
                    Container::Object
                };
                self.stack.push(container);
            }
            '[' => self.stack.push(Container::Array),
            '}' | ']' => {
                if self.stack.pop().is_some() && self.stack.is_empty() && !self.response.complete
                {
                    self.response.complete = true;
                    events.push(FieldEvent::ResponseCompleted);
                }
            }
            _ => {}
        }
    }

    /// Start the value of `key` at `c`. Returns `false` when `c` does not
    /// start a value this decoder tracks; the caller then rescans `c`.
    fn open_value(&mut self, key: Key, c: char, events: &mut Vec<FieldEvent>) -> bool {
        match key {
            Key::Field(field) => {
                let numeric = field == FieldName::FileVersion && (c.is_ascii_digit() || c == '-');
                if c != '"' && !numeric {
                    return false;
                }
                let file_index = match self.route(field, events) {
                    Route::Response => None,
                    Route::File(index) => Some(index),
                    Route::Nowhere => {
                        return self.open_value(Key::Unknown, c, events);
                    }
                };
                self.begin_field(field, file_index, events);
                if numeric {
                    self.pending.push(c);
                    self.mode = Mode::InNumber;
                } else {
                    self.mode = Mode::InString;
                }
                true
            }
            Key::Files => {
                if c != '[' {
                    return false;
                }
                self.stack.push(Container::FilesArray);
                true
            }
            Key::Tool(position) => {
                if c != '{' {
                    return false;
                }
                let file_index = match position {
                    ToolPosition::AfterFile => self.active_file,
                    ToolPosition::AfterText | ToolPosition::BeforeConclusion => None,
                };
                self.mode = Mode::InToolCall(ToolCallScanner::open(position, file_index));
                true
            }
            Key::Unknown => {
                if c != '"' {
                    return false;
                }
                self.mode = Mode::SkippingString { escaped: false };
                true
            }
        }
    }

    fn route(&mut self, field: FieldName, events: &mut Vec<FieldEvent>) -> Route {
        if field == FieldName::FileName {
            let index = self.response.files.len();
            self.response.files.push(FileRecord::default());
            self.active_file = Some(index);
            self.object_file = Some(index);
            events.push(FieldEvent::FileStarted { index });
            return Route::File(index);
        }
        if !field.is_file_scoped() {
            return Route::Response;
        }
        match self.object_file {
            Some(index) => Route::File(index),
            None => {
                tracing::debug!(%field, "file field before its FileName; skipping");
                Route::Nowhere
            }
        }
    }

    fn begin_field(
        &mut self,
        field: FieldName,
        file_index: Option<usize>,
        events: &mut Vec<FieldEvent>,
    ) {
        // A field that reappears starts a new span.
        if let Some(target) = self.target(field, file_index) {
            target.clear();
        }
        if field == FieldName::FileVersion {
            if let Some(file) = file_index.and_then(|i| self.response.files.get_mut(i)) {
                file.version = None;
            }
        }
        self.unescaper.reset();
        self.open_field = Some(OpenField { field, file_index });
        events.push(FieldEvent::FieldStarted { field, file_index });
    }

    fn end_field(&mut self, events: &mut Vec<FieldEvent>) {
        self.flush_content(events);
        let Some(open) = self.open_field.take() else {
            return;
        };
        if open.field == FieldName::FileVersion {
            self.commit_version(open.file_index);
        }
        events.push(FieldEvent::FieldEnded {
            field: open.field,
            file_index: open.file_index,
        });
    }

    fn commit_version(&mut self, file_index: Option<usize>) {
        let raw = std::mem::take(&mut self.version_raw);
        let Some(file) = file_index.and_then(|i| self.response.files.get_mut(i)) else {
            return;
        };
        match raw.trim().parse::<i64>() {
            Ok(version) => file.version = Some(version),
            Err(err) => {
                tracing::debug!(value = %raw, error = %err, "ignoring non-numeric FileVersion");
            }
        }
    }

    fn flush_content(&mut self, events: &mut Vec<FieldEvent>) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        let Some(open) = self.open_field else {
            return;
        };
        if let Some(target) = self.target(open.field, open.file_index) {
            target.push_str(&text);
        }
        events.push(FieldEvent::FieldContent {
            field: open.field,
            file_index: open.file_index,
            text,
        });
    }

    fn finish_tool_call(&mut self, scanner: ToolCallScanner, events: &mut Vec<FieldEvent>) {
        let raw_len = scanner.raw().len();
        match scanner.finish() {
            Ok(call) => {
                tracing::debug!(
                    name = %call.name,
                    position = ?call.position,
                    file_index = ?call.file_index,
                    "tool call recognized"
                );
                self.response.tool_calls.push(call.clone());
                events.push(FieldEvent::ToolCall(call));
            }
            Err(err) => {
                tracing::debug!(error = %err, raw_len, "dropping tool call payload");
            }
        }
    }

    fn target(&mut self, field: FieldName, file_index: Option<usize>) -> Option<&mut String> {
        let file = file_index.and_then(|i| self.response.files.get_mut(i));
        match field {
            FieldName::Text => Some(self.response.text.get_or_insert_with(String::new)),
            FieldName::Conclusion => Some(self.response.conclusion.get_or_insert_with(String::new)),
            FieldName::FileVersion => Some(&mut self.version_raw),
            FieldName::FileName => file.map(|f| f.name.get_or_insert_with(String::new)),
            FieldName::FileCode => file.map(|f| f.code.get_or_insert_with(String::new)),
            FieldName::FileText => file.map(|f| f.text.get_or_insert_with(String::new)),
        }
    }
}
