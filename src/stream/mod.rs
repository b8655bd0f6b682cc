mod utf8;

pub use utf8::Utf8Carry;

use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::config::DecodeMode;
use crate::error::DecodeError;
use crate::fenced::{FencedDecoder, Segment, SegmentEvent, SegmentHandler};
use crate::fields::{CodeResponse, FieldEvent, FieldHandler, FieldStreamDecoder};

/// Pick a decoder from the first non-whitespace character of a response.
///
/// Returns `None` while only whitespace has been seen.
#[must_use]
pub fn sniff_mode(text: &str) -> Option<DecodeMode> {
    let first = text.chars().find(|c| !c.is_whitespace())?;
    Some(if first == '{' {
        DecodeMode::Fields
    } else {
        DecodeMode::Fenced
    })
}

/// Final state of a decoded response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "lowercase")]
pub enum Decoded {
    Fields(CodeResponse),
    Fenced(Vec<Segment>),
}

enum DecoderState {
    Sniffing(String),
    Fields(FieldStreamDecoder),
    Fenced { decoder: FencedDecoder, full: String },
}

/// Mode-dispatching wrapper fed with text fragments.
///
/// The fenced decoder takes the cumulative text, so this keeps the running
/// buffer for it. In [`DecodeMode::Auto`] fragments are buffered until the
/// first non-whitespace character decides the mode.
pub struct ResponseDecoder {
    state: DecoderState,
}

impl ResponseDecoder {
    #[must_use]
    pub fn new(mode: DecodeMode) -> Self {
        let state = match mode {
            DecodeMode::Fields => DecoderState::Fields(FieldStreamDecoder::new()),
            DecodeMode::Fenced => DecoderState::Fenced {
                decoder: FencedDecoder::new(),
                full: String::new(),
            },
            DecodeMode::Auto => DecoderState::Sniffing(String::new()),
        };
        Self { state }
    }

    /// The resolved mode, or `None` while still sniffing.
    #[must_use]
    pub fn mode(&self) -> Option<DecodeMode> {
        match self.state {
            DecoderState::Sniffing(_) => None,
            DecoderState::Fields(_) => Some(DecodeMode::Fields),
            DecoderState::Fenced { .. } => Some(DecodeMode::Fenced),
        }
    }

    pub fn push<H>(&mut self, text: &str, handler: &mut H)
    where
        H: FieldHandler + SegmentHandler + ?Sized,
    {
        if let DecoderState::Sniffing(buffered) = &mut self.state {
            buffered.push_str(text);
            let Some(mode) = sniff_mode(buffered) else {
                return;
            };
            let buffered = std::mem::take(buffered);
            tracing::debug!(%mode, "decoder mode resolved");
            *self = Self::new(mode);
            self.feed(&buffered, handler);
            return;
        }
        self.feed(text, handler);
    }

    fn feed<H>(&mut self, text: &str, handler: &mut H)
    where
        H: FieldHandler + SegmentHandler + ?Sized,
    {
        match &mut self.state {
            DecoderState::Sniffing(buffered) => buffered.push_str(text),
            DecoderState::Fields(decoder) => decoder.process_chunk_into(text, handler),
            DecoderState::Fenced { decoder, full } => {
                full.push_str(text);
                decoder.parse_into(full, handler);
            }
        }
    }

    /// End of input: resolve pending state and return the final view.
    ///
    /// Input that never showed a non-whitespace character is decoded as fenced text.
    pub fn finish<H>(&mut self, handler: &mut H) -> Decoded
    where
        H: FieldHandler + SegmentHandler + ?Sized,
    {
        if let DecoderState::Sniffing(buffered) = &mut self.state {
            let buffered = std::mem::take(buffered);
            *self = Self::new(DecodeMode::Fenced);
            self.feed(&buffered, handler);
        }
        match &mut self.state {
            DecoderState::Fields(decoder) => Decoded::Fields(decoder.snapshot()),
            DecoderState::Fenced { decoder, .. } => {
                decoder.finish();
                for event in decoder.take_events() {
                    SegmentHandler::handle(&mut *handler, &event);
                }
                Decoded::Fenced(decoder.segments().to_vec())
            }
            DecoderState::Sniffing(_) => Decoded::Fenced(Vec::new()),
        }
    }
}

/// Collects every event from either decoder.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub fields: Vec<FieldEvent>,
    pub segments: Vec<SegmentEvent>,
}

impl FieldHandler for EventLog {
    fn handle(&mut self, event: &FieldEvent) {
        self.fields.push(event.clone());
    }
}

impl SegmentHandler for EventLog {
    fn handle(&mut self, event: &SegmentEvent) {
        self.segments.push(event.clone());
    }
}

/// Drive a byte stream through `decoder`, one decoder call per inbound chunk.
///
/// # Errors
///
/// Returns [`DecodeError::Transport`] when the stream yields an error; the
/// decoder keeps whatever was decoded before it.
pub async fn drive<S, E, H>(
    stream: S,
    decoder: &mut ResponseDecoder,
    handler: &mut H,
) -> Result<Decoded, DecodeError>
where
    S: Stream<Item = Result<bytes::Bytes, E>>,
    E: std::fmt::Display,
    H: FieldHandler + SegmentHandler + ?Sized,
{
    let mut stream = std::pin::pin!(stream);
    let mut carry = Utf8Carry::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| DecodeError::Transport(e.to_string()))?;
        let text = carry.push(&bytes);
        if !text.is_empty() {
            decoder.push(&text, handler);
        }
    }

    if let Some(rest) = carry.finish() {
        decoder.push(&rest, handler);
    }
    Ok(decoder.finish(handler))
}

/// Drive a byte stream through a [`FieldStreamDecoder`].
///
/// # Errors
///
/// Returns [`DecodeError::Transport`] when the stream yields an error.
pub async fn drive_fields<S, E, H>(
    stream: S,
    decoder: &mut FieldStreamDecoder,
    handler: &mut H,
) -> Result<CodeResponse, DecodeError>
where
    S: Stream<Item = Result<bytes::Bytes, E>>,
    E: std::fmt::Display,
    H: FieldHandler + ?Sized,
{
    let mut stream = std::pin::pin!(stream);
    let mut carry = Utf8Carry::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| DecodeError::Transport(e.to_string()))?;
        decoder.process_chunk_into(&carry.push(&bytes), handler);
    }
    if let Some(rest) = carry.finish() {
        decoder.process_chunk_into(&rest, handler);
    }
    Ok(decoder.snapshot())
}

/// Drive a byte stream through a [`FencedDecoder`], re-parsing the cumulative text.
///
/// # Errors
///
/// Returns [`DecodeError::Transport`] when the stream yields an error.
pub async fn drive_fenced<S, E, H>(
    stream: S,
    decoder: &mut FencedDecoder,
    handler: &mut H,
) -> Result<Vec<Segment>, DecodeError>
where
    S: Stream<Item = Result<bytes::Bytes, E>>,
    E: std::fmt::Display,
    H: SegmentHandler + ?Sized,
{
    let mut stream = std::pin::pin!(stream);
    let mut carry = Utf8Carry::new();
    let mut full = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| DecodeError::Transport(e.to_string()))?;
        full.push_str(&carry.push(&bytes));
        decoder.parse_into(&full, handler);
    }
    if let Some(rest) = carry.finish() {
        full.push_str(&rest);
        decoder.parse_into(&full, handler);
    }
    decoder.finish();
    for event in decoder.take_events() {
        handler.handle(&event);
    }
    Ok(decoder.segments().to_vec())
}
