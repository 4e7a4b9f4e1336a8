//! Incremental frame assembler for pseudo-SSE response bodies.
//!
//! Backends in the wild disagree about blank-line terminators, `event:`
//! labels and `data:` prefixes, so the assembler accepts all of them and
//! still produces the same frames no matter how the body is chunked.
use memchr::memchr_iter;

use super::Frame;
use crate::config::DecoderConfig;

/// When a frame is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingPolicy {
    /// Emit as soon as a `data:` line leaves non-empty data behind.
    #[default]
    Eager,
    /// Standard SSE: wait for a blank line, join `data:` lines with `\n`.
    Strict,
}

impl From<&DecoderConfig> for FramingPolicy {
    fn from(config: &DecoderConfig) -> Self {
        if config.strict_sse_framing {
            FramingPolicy::Strict
        } else {
            FramingPolicy::Eager
        }
    }
}

#[derive(Debug, Default)]
struct FrameState {
    policy: FramingPolicy,
    event_type: Option<String>,
    data: String,
    last_event_id: Option<String>,
}

impl FrameState {
    fn dispatch(&mut self, out: &mut Vec<Frame>) {
        if self.data.is_empty() {
            return;
        }
        out.push(Frame {
            event_type: self
                .event_type
                .take()
                .unwrap_or_else(|| Frame::DEFAULT_EVENT_TYPE.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        });
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<Frame>) {
        if line.trim().is_empty() {
            self.dispatch(out);
            // A blank line also ends a label that never received data.
            self.event_type = None;
            return;
        }

        if line.starts_with(':') {
            return;
        }

        if let Some(value) = line.strip_prefix("data:") {
            let mut value = value.trim();
            // Some backend paths wrap an already-framed line a second time.
            if let Some(inner) = value.strip_prefix("data:") {
                value = inner.trim();
            }
            if !value.is_empty() {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            if self.policy == FramingPolicy::Eager {
                self.dispatch(out);
            }
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            self.event_type = (!value.is_empty()).then(|| value.to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            self.last_event_id = Some(value.trim().to_string());
        } else if line.starts_with("retry:") {
            // reconnection hints are meaningless for a single exchange
        } else {
            self.dispatch(out);
            tracing::trace!(
                line = crate::util::preview(line, 64),
                "bare line treated as token data"
            );
            out.push(Frame {
                event_type: Frame::DEFAULT_EVENT_TYPE.to_string(),
                data: line.to_string(),
                id: self.last_event_id.clone(),
            });
        }
    }
}

/// Turns arbitrarily-chunked text into [`Frame`]s.
///
/// Owns its buffer; one instance per session.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: String,
    read_offset: usize,
    state: FrameState,
}

impl FrameAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: FramingPolicy) -> Self {
        Self {
            state: FrameState {
                policy,
                ..FrameState::default()
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn policy(&self) -> FramingPolicy {
        self.state.policy
    }

    /// Feed raw text and return any frames it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append completed frames into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<Frame>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &self.buffer.as_bytes()[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            self.state.process_line(line, out);
            processed_up_to = line_end + 1;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Drain whatever is left once the transport has closed.
    ///
    /// An unterminated trailing line is processed as a complete line, then any
    /// accumulated data is emitted as if a blank line had arrived.
    pub fn flush(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        let tail = std::mem::take(&mut self.buffer);
        let mut line = &tail[self.read_offset..];
        if let Some(stripped) = line.strip_suffix('\r') {
            line = stripped;
        }
        if !line.is_empty() {
            self.state.process_line(line, &mut out);
        }
        self.state.dispatch(&mut out);
        self.state.event_type = None;
        self.read_offset = 0;
        out
    }

    /// Bytes currently buffered without a line terminator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len() - self.read_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_frames(assembler: &mut FrameAssembler, chunks: &[&str]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(assembler.feed(chunk));
        }
        frames.extend(assembler.flush());
        frames
    }

    #[test]
    fn test_named_event_frame() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("event: start\ndata: {}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "start");
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn test_missing_event_defaults_to_token() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("data: {\"text\":\"Hi\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "token");
    }

    #[test]
    fn test_split_line_waits_for_newline() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.feed("event: token\ndata: {\"content\":\"Hel").is_empty());
        assert!(assembler.pending_len() > 0);
        let frames = assembler.feed("lo\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "token");
        assert_eq!(frames[0].data, "{\"content\":\"Hello\"}");
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_eager_emits_without_blank_line() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("data: one\ndata: two\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "one");
        assert_eq!(frames[1].data, "two");
    }

    #[test]
    fn test_eager_resets_event_label_after_emit() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("event: start\ndata: {}\ndata: {\"text\":\"a\"}\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type, "start");
        assert_eq!(frames[1].event_type, "token");
    }

    #[test]
    fn test_strict_joins_multiline_data() {
        let mut assembler = FrameAssembler::with_policy(FramingPolicy::Strict);
        assert_eq!(assembler.policy(), FramingPolicy::Strict);
        let frames = assembler.feed("data: line1\ndata: line2\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn test_double_data_prefix_stripped_once() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("data: data: {\"text\":\"x\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"text\":\"x\"}");
    }

    #[test]
    fn test_bare_lines_become_token_frames() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed("not json at all\n{\"text\":\"json\"}\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type, "token");
        assert_eq!(frames[0].data, "not json at all");
        assert_eq!(frames[1].data, "{\"text\":\"json\"}");
    }

    #[test]
    fn test_bare_line_flushes_pending_strict_frame_first() {
        let mut assembler = FrameAssembler::with_policy(FramingPolicy::Strict);
        let frames = assembler.feed("event: start\ndata: {}\nplain\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type, "start");
        assert_eq!(frames[1].data, "plain");
    }

    #[test]
    fn test_comments_id_and_retry_are_consumed() {
        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(": keep-alive\nretry: 1000\nid: 7\ndata: x\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_empty_data_frames_are_not_emitted() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.feed("data:\n\n\n\n").is_empty());
        assert!(assembler.flush().is_empty());
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut assembler = FrameAssembler::with_policy(FramingPolicy::Strict);
        let frames = all_frames(&mut assembler, &["data: a\r", "\n\r", "\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a");
    }

    #[test]
    fn test_flush_processes_unterminated_line() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.feed("not json at all").is_empty());
        let frames = assembler.flush();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "not json at all");
        assert!(assembler.flush().is_empty());
    }

    #[test]
    fn test_flush_emits_unterminated_strict_frame() {
        let mut assembler = FrameAssembler::with_policy(FramingPolicy::Strict);
        assert!(assembler.feed("event: end\ndata: {\"done\":true}\n").is_empty());
        let frames = assembler.flush();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type, "end");
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_frames() {
        let body = "event: start\ndata: {}\n\n: ping\nevent: token\ndata: {\"content\":\"Hé\"}\n\n\
data: data: {\"text\":\"x\"}\nraw text line\r\nevent: end\ndata: {\"done\":true}\n\n";
        for policy in [FramingPolicy::Eager, FramingPolicy::Strict] {
            let whole = all_frames(&mut FrameAssembler::with_policy(policy), &[body]);
            for split in (0..=body.len()).filter(|i| body.is_char_boundary(*i)) {
                let (a, b) = body.split_at(split);
                let pieces = all_frames(&mut FrameAssembler::with_policy(policy), &[a, b]);
                assert_eq!(pieces, whole, "policy {policy:?} split at {split}");
            }
            let singles: Vec<String> = body.chars().map(String::from).collect();
            let refs: Vec<&str> = singles.iter().map(String::as_str).collect();
            assert_eq!(
                all_frames(&mut FrameAssembler::with_policy(policy), &refs),
                whole
            );
        }
    }

    #[test]
    fn test_policy_from_config() {
        let strict = DecoderConfig {
            strict_sse_framing: true,
        };
        assert_eq!(FramingPolicy::from(&strict), FramingPolicy::Strict);
        assert_eq!(
            FramingPolicy::from(&DecoderConfig::default()),
            FramingPolicy::Eager
        );
    }
}
