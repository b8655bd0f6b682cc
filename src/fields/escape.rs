// Resumable JSON string unescaper.
//
// Fed one character at a time, it keeps a pending backslash, a partial
// `\uXXXX` escape, or an unpaired high surrogate across calls, so an escape
// sequence split over two fragments decodes exactly as if it had arrived
// whole.

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EscapeState {
    #[default]
    Plain,
    Backslash,
    Unicode {
        digits: u8,
        value: u32,
    },
}

/// Outcome of feeding one raw character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feed {
    /// The character was consumed (decoded output, if any, was appended).
    Consumed,
    /// An unescaped `"` terminated the string.
    Closed,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct JsonUnescaper {
    state: EscapeState,
    high_surrogate: Option<u32>,
}

impl JsonUnescaper {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True when no escape is in flight, so raw bytes can be copied verbatim
    /// up to the next `"` or `\`.
    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        self.state == EscapeState::Plain && self.high_surrogate.is_none()
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn feed(&mut self, c: char, out: &mut String) -> Feed {
        match self.state {
            EscapeState::Plain => match c {
                '"' => {
                    self.flush_high_surrogate(out);
                    return Feed::Closed;
                }
                '\\' => self.state = EscapeState::Backslash,
                other => {
                    self.flush_high_surrogate(out);
                    out.push(other);
                }
            },
            EscapeState::Backslash => {
                if c == 'u' {
                    self.state = EscapeState::Unicode {
                        digits: 0,
                        value: 0,
                    };
                    return Feed::Consumed;
                }
                self.flush_high_surrogate(out);
                self.state = EscapeState::Plain;
                match c {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000C}'),
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            EscapeState::Unicode { digits, value } => {
                let Some(nibble) = c.to_digit(16) else {
                    // Malformed \u escape: drop it and treat `c` as ordinary input.
                    self.state = EscapeState::Plain;
                    self.high_surrogate = None;
                    out.push(REPLACEMENT);
                    return self.feed(c, out);
                };
                let value = (value << 4) | nibble;
                if digits + 1 < 4 {
                    self.state = EscapeState::Unicode {
                        digits: digits + 1,
                        value,
                    };
                } else {
                    self.state = EscapeState::Plain;
                    self.push_code_unit(value, out);
                }
            }
        }
        Feed::Consumed
    }

    fn push_code_unit(&mut self, unit: u32, out: &mut String) {
        if let Some(high) = self.high_surrogate.take() {
            if (0xDC00..=0xDFFF).contains(&unit) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                out.push(char::from_u32(combined).unwrap_or(REPLACEMENT));
                return;
            }
            out.push(REPLACEMENT);
        }

        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => out.push(REPLACEMENT),
            _ => out.push(char::from_u32(unit).unwrap_or(REPLACEMENT)),
        }
    }

    fn flush_high_surrogate(&mut self, out: &mut String) {
        if self.high_surrogate.take().is_some() {
            out.push(REPLACEMENT);
        }
    }
}
