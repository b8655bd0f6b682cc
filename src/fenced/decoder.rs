use memchr::{memchr, memchr2};

use super::{Segment, SegmentEvent, SegmentHandler, SegmentId, SegmentKind};

// Resumable markdown fence scanner.
//
// Backtick runs are counted without being interpreted until a non-backtick
// character arrives, so a fence split across calls is never mistaken for
// inline code. A run still open at the end of the input stays pending until
// the next call (or `finish`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceMode {
    Text,
    /// Between an opening fence and the end of its line.
    FenceLanguage { fence_len: usize },
    FencedCode { fence_len: usize },
    InlineCode,
}

/// Incremental splitter for text / fenced code / inline code.
#[derive(Debug, Clone)]
pub struct FencedDecoder {
    seen: String,
    segments: Vec<Segment>,
    mode: FenceMode,
    pending_run: usize,
    language: String,
    next_id: u64,
    /// Text appended to the open segment and not yet reported.
    pending_append: String,
    events: Vec<SegmentEvent>,
}

impl Default for FencedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FencedDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: String::new(),
            segments: Vec::new(),
            mode: FenceMode::Text,
            pending_run: 0,
            language: String::new(),
            next_id: 0,
            pending_append: String::new(),
            events: Vec::new(),
        }
    }

    /// Decode `full`, the entire content received so far, and return all
    /// segments. Content that does not extend the previous input starts over.
    pub fn parse(&mut self, full: &str) -> &[Segment] {
        if !full.starts_with(self.seen.as_str()) {
            tracing::debug!(
                previous = self.seen.len(),
                current = full.len(),
                "content does not extend previous input; resetting"
            );
            self.reset();
            self.events.push(SegmentEvent::Reset);
        }

        let suffix = &full[self.seen.len()..];
        if !suffix.is_empty() {
            tracing::trace!(len = suffix.len(), "fenced suffix");
            self.scan(suffix);
            self.seen.push_str(suffix);
        }
        self.flush_append();
        &self.segments
    }

    /// Like [`parse`](Self::parse), dispatching the produced events to `handler`.
    pub fn parse_into<H: SegmentHandler + ?Sized>(
        &mut self,
        full: &str,
        handler: &mut H,
    ) -> &[Segment] {
        self.parse(full);
        for event in self.events.drain(..) {
            handler.handle(&event);
        }
        &self.segments
    }

    /// Resolve a backtick run left pending at the end of the stream.
    ///
    /// Call once the transport reports that no more content will arrive.
    pub fn finish(&mut self) -> &[Segment] {
        if self.pending_run > 0 {
            let run = std::mem::take(&mut self.pending_run);
            self.resolve_run(run);
        }
        self.flush_append();
        &self.segments
    }

    /// Events produced since the last call, in order.
    pub fn take_events(&mut self) -> Vec<SegmentEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Bytes of input consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.seen.len()
    }

    /// Drop all state. Segment ids keep increasing so they are never reused.
    pub fn reset(&mut self) {
        let next_id = self.next_id;
        *self = Self::new();
        self.next_id = next_id;
    }

    // -- scanning -------------------------------------------------------------

    fn scan(&mut self, suffix: &str) {
        let bytes = suffix.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'`' {
                self.pending_run += 1;
                i += 1;
                continue;
            }
            if self.pending_run > 0 {
                let run = std::mem::take(&mut self.pending_run);
                self.resolve_run(run);
            }

            let rest = &bytes[i..];
            if let FenceMode::FenceLanguage { fence_len } = self.mode {
                if rest[0] == b'\n' {
                    self.finish_language(fence_len);
                    i += 1;
                } else {
                    let run = memchr2(b'\n', b'`', rest).unwrap_or(rest.len());
                    self.language.push_str(&suffix[i..i + run]);
                    i += run;
                }
                continue;
            }

            let run = memchr(b'`', rest).unwrap_or(rest.len());
            self.append(&suffix[i..i + run]);
            i += run;
        }
    }

    fn resolve_run(&mut self, run: usize) {
        match self.mode {
            FenceMode::Text => match run {
                1 => {
                    self.create(SegmentKind::InlineCode);
                    self.mode = FenceMode::InlineCode;
                }
                2 => self.append("``"),
                _ => {
                    self.create(SegmentKind::Code);
                    self.language.clear();
                    self.mode = FenceMode::FenceLanguage { fence_len: run };
                }
            },
            FenceMode::FenceLanguage { .. } => {
                self.language.extend(std::iter::repeat('`').take(run));
            }
            FenceMode::FencedCode { fence_len } if run == fence_len => {
                self.close_open();
                self.mode = FenceMode::Text;
            }
            FenceMode::InlineCode if run == 1 => {
                self.close_open();
                self.mode = FenceMode::Text;
            }
            FenceMode::FencedCode { .. } | FenceMode::InlineCode => {
                self.append(&"`".repeat(run));
            }
        }
    }

    fn finish_language(&mut self, fence_len: usize) {
        let language = self.language.trim();
        if !language.is_empty() {
            let language = language.to_string();
            if let Some(segment) = self.segments.last_mut() {
                segment.language = Some(language.clone());
                self.events.push(SegmentEvent::LanguageDetected {
                    id: segment.id,
                    language,
                });
            }
        }
        self.language.clear();
        self.mode = FenceMode::FencedCode { fence_len };
    }

    // -- segments -------------------------------------------------------------

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let open_kind = self
            .segments
            .last()
            .filter(|segment| !segment.complete)
            .map(|segment| segment.kind);
        if open_kind.is_none() {
            // Only text can start implicitly; code segments open on their delimiter.
            self.create(SegmentKind::Text);
        }
        if let Some(segment) = self.segments.last_mut() {
            segment.content.push_str(text);
            self.pending_append.push_str(text);
        }
    }

    fn create(&mut self, kind: SegmentKind) {
        self.close_open();
        let id = SegmentId(self.next_id);
        self.next_id += 1;
        self.segments.push(Segment::new(id, kind));
        self.events.push(SegmentEvent::Created { id, kind });
    }

    fn close_open(&mut self) {
        self.flush_append();
        if let Some(segment) = self.segments.last_mut().filter(|s| !s.complete) {
            segment.complete = true;
            self.events.push(SegmentEvent::Closed { id: segment.id });
        }
    }

    fn flush_append(&mut self) {
        if self.pending_append.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending_append);
        if let Some(segment) = self.segments.last() {
            self.events.push(SegmentEvent::Appended {
                id: segment.id,
                text,
            });
        }
    }
}
