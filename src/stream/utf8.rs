const REPLACEMENT: char = '\u{FFFD}';

/// Converts arbitrary byte chunks into text fragments.
///
/// A multi-byte character split across chunks is held back until its tail
/// arrives; invalid bytes are replaced with U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Carry {
    tail: Vec<u8>,
}

impl Utf8Carry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, prefixed with any bytes held back from the previous call.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let joined;
        let mut rest: &[u8] = if self.tail.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.tail);
            buf.extend_from_slice(chunk);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(rest.len());
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // Safety: `valid_up_to` marks the end of a valid UTF-8 prefix.
                    out.push_str(unsafe { std::str::from_utf8_unchecked(valid) });
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(REPLACEMENT);
                            rest = &after[invalid..];
                        }
                        None => {
                            self.tail.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush bytes still held back at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.tail.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.tail);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.tail.is_empty()
    }
}
