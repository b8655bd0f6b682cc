//! Fenced-Content Decoder for free-form markdown responses.
//!
//! Splits a growing markdown document into text, fenced code and inline code
//! segments. Callers pass the full content received so far on every call;
//! only the new suffix is scanned.

mod decoder;
mod message;

use std::fmt;

use serde::Serialize;

pub use decoder::FencedDecoder;
pub use message::{split_message, MessageBlock, MessageBlockKind};

/// Stable segment identifier, unique for the lifetime of a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    Text,
    Code,
    InlineCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub id: SegmentId,
    pub kind: SegmentKind,
    pub content: String,
    /// Language tag of a fenced block, once its opening line has ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// False while the segment may still receive characters.
    pub complete: bool,
}

impl Segment {
    fn new(id: SegmentId, kind: SegmentKind) -> Self {
        Self {
            id,
            kind,
            content: String::new(),
            language: None,
            complete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SegmentEvent {
    Created { id: SegmentId, kind: SegmentKind },
    Appended { id: SegmentId, text: String },
    LanguageDetected { id: SegmentId, language: String },
    Closed { id: SegmentId },
    /// The input no longer extends what was seen before; all segments were dropped.
    Reset,
}

/// Callback surface for [`SegmentEvent`]s.
pub trait SegmentHandler {
    fn on_segment_created(&mut self, _id: SegmentId, _kind: SegmentKind) {}
    fn on_segment_updated(&mut self, _id: SegmentId, _text: &str) {}
    fn on_language(&mut self, _id: SegmentId, _language: &str) {}
    fn on_segment_closed(&mut self, _id: SegmentId) {}
    fn on_reset(&mut self) {}

    fn handle(&mut self, event: &SegmentEvent) {
        match event {
            SegmentEvent::Created { id, kind } => self.on_segment_created(*id, *kind),
            SegmentEvent::Appended { id, text } => self.on_segment_updated(*id, text),
            SegmentEvent::LanguageDetected { id, language } => self.on_language(*id, language),
            SegmentEvent::Closed { id } => self.on_segment_closed(*id),
            SegmentEvent::Reset => self.on_reset(),
        }
    }
}

impl SegmentHandler for Vec<SegmentEvent> {
    fn handle(&mut self, event: &SegmentEvent) {
        self.push(event.clone());
    }
}
