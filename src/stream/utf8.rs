/// Incremental UTF-8 decoder for response body bytes.
///
/// A multi-byte sequence split across two network chunks is carried over to
/// the next call instead of being mangled. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    remainder: Vec<u8>,
}

impl Utf8ChunkDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any carried-over prefix) as possible.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let carried: Vec<u8>;
        let input: &[u8] = if self.remainder.is_empty() {
            bytes
        } else {
            self.remainder.extend_from_slice(bytes);
            carried = std::mem::take(&mut self.remainder);
            &carried
        };

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
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
                    if let Some(invalid_len) = e.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[invalid_len..];
                    } else {
                        self.remainder.extend_from_slice(after);
                        break;
                    }
                }
            }
        }
        out
    }

    /// Flush bytes still pending at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.remainder.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.remainder);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}
