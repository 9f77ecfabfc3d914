//! Pull-based, non-buffering JSON tokenizer.
//!
//! Consumes a chunked byte stream and emits one structural event at a time.
//! Nothing larger than the current token is ever buffered, so arbitrarily
//! large documents are tokenized in bounded memory. A byte stream that ends
//! before the document's structural end yields
//! [`StreamError::PrematureClose`], never a silent success.

use bytes::Bytes;
use futures::StreamExt;

use acthub_core::StreamError;

use crate::source::ByteStream;

/// One structural JSON event.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    /// An object key. The following events describe its value.
    Key(String),
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    /// The document is complete and the byte stream is exhausted.
    Eof,
}

/// Cursor over a chunked byte stream.
struct ChunkReader {
    stream: ByteStream,
    chunk: Bytes,
    pos: usize,
    offset: u64,
}

impl ChunkReader {
    fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            chunk: Bytes::new(),
            pos: 0,
            offset: 0,
        }
    }

    /// Ensure at least one unread byte is available. `false` means the
    /// stream is exhausted.
    async fn fill(&mut self) -> Result<bool, StreamError> {
        while self.pos >= self.chunk.len() {
            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn peek(&mut self) -> Result<Option<u8>, StreamError> {
        if self.fill().await? {
            Ok(Some(self.chunk[self.pos]))
        } else {
            Ok(None)
        }
    }

    async fn next(&mut self) -> Result<Option<u8>, StreamError> {
        if self.fill().await? {
            let b = self.chunk[self.pos];
            self.pos += 1;
            self.offset += 1;
            Ok(Some(b))
        } else {
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// A value must follow (document start, after `:`, after `,` in array).
    Value,
    /// Just after `[`: a value or `]`.
    ArrayFirst,
    /// Just after `{`: a key or `}`.
    ObjectFirst,
    /// After `,` in an object: a key must follow.
    ObjectKey,
    /// After a completed value: `,`, a closing bracket, or end of document.
    AfterValue,
    Finished,
}

/// Event tokenizer with an explicit container stack.
pub struct JsonTokenizer {
    reader: ChunkReader,
    stack: Vec<Container>,
    state: State,
}

impl JsonTokenizer {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            reader: ChunkReader::new(stream),
            stack: Vec::new(),
            state: State::Value,
        }
    }

    /// Byte offset of the tokenizer's position, for error messages.
    pub fn offset(&self) -> u64 {
        self.reader.offset
    }

    fn parse_error(&self, message: impl Into<String>) -> StreamError {
        StreamError::Parse {
            offset: self.reader.offset,
            message: message.into(),
        }
    }

    /// Pull the next structural event.
    pub async fn next_event(&mut self) -> Result<JsonEvent, StreamError> {
        loop {
            self.skip_whitespace().await?;
            match self.state {
                State::Finished => return Ok(JsonEvent::Eof),
                State::Value | State::ArrayFirst => {
                    let b = self
                        .reader
                        .peek()
                        .await?
                        .ok_or(StreamError::PrematureClose)?;
                    if self.state == State::ArrayFirst && b == b']' {
                        self.reader.next().await?;
                        self.pop(Container::Array)?;
                        self.state = State::AfterValue;
                        return Ok(JsonEvent::ArrayEnd);
                    }
                    return self.value_start(b).await;
                }
                State::ObjectFirst | State::ObjectKey => {
                    let b = self
                        .reader
                        .next()
                        .await?
                        .ok_or(StreamError::PrematureClose)?;
                    if self.state == State::ObjectFirst && b == b'}' {
                        self.pop(Container::Object)?;
                        self.state = State::AfterValue;
                        return Ok(JsonEvent::ObjectEnd);
                    }
                    if b != b'"' {
                        return Err(self.parse_error(format!(
                            "expected object key, found {:?}",
                            char::from(b)
                        )));
                    }
                    let key = self.read_string().await?;
                    self.skip_whitespace().await?;
                    match self.reader.next().await? {
                        Some(b':') => {}
                        Some(other) => {
                            return Err(self.parse_error(format!(
                                "expected ':' after key, found {:?}",
                                char::from(other)
                            )));
                        }
                        None => return Err(StreamError::PrematureClose),
                    }
                    self.state = State::Value;
                    return Ok(JsonEvent::Key(key));
                }
                State::AfterValue => {
                    if self.stack.is_empty() {
                        return match self.reader.peek().await? {
                            None => {
                                self.state = State::Finished;
                                Ok(JsonEvent::Eof)
                            }
                            Some(b) => Err(self.parse_error(format!(
                                "trailing data after document: {:?}",
                                char::from(b)
                            ))),
                        };
                    }
                    let b = self
                        .reader
                        .next()
                        .await?
                        .ok_or(StreamError::PrematureClose)?;
                    match (self.stack.last().copied(), b) {
                        (Some(Container::Object), b',') => {
                            self.state = State::ObjectKey;
                            // Loop around to read the key.
                        }
                        (Some(Container::Object), b'}') => {
                            self.pop(Container::Object)?;
                            self.state = State::AfterValue;
                            return Ok(JsonEvent::ObjectEnd);
                        }
                        (Some(Container::Array), b',') => {
                            self.state = State::Value;
                        }
                        (Some(Container::Array), b']') => {
                            self.pop(Container::Array)?;
                            self.state = State::AfterValue;
                            return Ok(JsonEvent::ArrayEnd);
                        }
                        (_, other) => {
                            return Err(self.parse_error(format!(
                                "expected ',' or closing bracket, found {:?}",
                                char::from(other)
                            )));
                        }
                    }
                }
            }
        }
    }

    async fn value_start(&mut self, b: u8) -> Result<JsonEvent, StreamError> {
        match b {
            b'{' => {
                self.reader.next().await?;
                self.stack.push(Container::Object);
                self.state = State::ObjectFirst;
                Ok(JsonEvent::ObjectStart)
            }
            b'[' => {
                self.reader.next().await?;
                self.stack.push(Container::Array);
                self.state = State::ArrayFirst;
                Ok(JsonEvent::ArrayStart)
            }
            b'"' => {
                self.reader.next().await?;
                let s = self.read_string().await?;
                self.state = State::AfterValue;
                Ok(JsonEvent::String(s))
            }
            b't' => {
                self.expect_literal(b"true").await?;
                self.state = State::AfterValue;
                Ok(JsonEvent::Bool(true))
            }
            b'f' => {
                self.expect_literal(b"false").await?;
                self.state = State::AfterValue;
                Ok(JsonEvent::Bool(false))
            }
            b'n' => {
                self.expect_literal(b"null").await?;
                self.state = State::AfterValue;
                Ok(JsonEvent::Null)
            }
            b'-' | b'0'..=b'9' => {
                let n = self.read_number().await?;
                self.state = State::AfterValue;
                Ok(JsonEvent::Number(n))
            }
            other => Err(self.parse_error(format!(
                "expected a value, found {:?}",
                char::from(other)
            ))),
        }
    }

    async fn skip_whitespace(&mut self) -> Result<(), StreamError> {
        while let Some(b) = self.reader.peek().await? {
            if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                self.reader.next().await?;
            } else {
                break;
            }
        }
        Ok(())
    }

    async fn expect_literal(&mut self, literal: &[u8]) -> Result<(), StreamError> {
        for &expected in literal {
            match self.reader.next().await? {
                Some(b) if b == expected => {}
                Some(_) => {
                    return Err(self.parse_error(format!(
                        "invalid literal, expected {}",
                        String::from_utf8_lossy(literal)
                    )));
                }
                None => return Err(StreamError::PrematureClose),
            }
        }
        Ok(())
    }

    /// Read a string body; the opening quote is already consumed.
    async fn read_string(&mut self) -> Result<String, StreamError> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let b = self
                .reader
                .next()
                .await?
                .ok_or(StreamError::PrematureClose)?;
            match b {
                b'"' => break,
                b'\\' => {
                    let esc = self
                        .reader
                        .next()
                        .await?
                        .ok_or(StreamError::PrematureClose)?;
                    match esc {
                        b'"' => buf.push(b'"'),
                        b'\\' => buf.push(b'\\'),
                        b'/' => buf.push(b'/'),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'u' => {
                            let ch = self.read_unicode_escape().await?;
                            let mut tmp = [0u8; 4];
                            buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
                        }
                        other => {
                            return Err(self.parse_error(format!(
                                "invalid escape sequence \\{}",
                                char::from(other)
                            )));
                        }
                    }
                }
                _ => buf.push(b),
            }
        }
        String::from_utf8(buf).map_err(|_| self.parse_error("string is not valid utf-8"))
    }

    async fn read_unicode_escape(&mut self) -> Result<char, StreamError> {
        let first = self.read_hex4().await?;
        let codepoint = if (0xD800..0xDC00).contains(&first) {
            // High surrogate: a low surrogate escape must follow.
            match (self.reader.next().await?, self.reader.next().await?) {
                (Some(b'\\'), Some(b'u')) => {}
                (None, _) | (_, None) => return Err(StreamError::PrematureClose),
                _ => return Err(self.parse_error("unpaired surrogate in string")),
            }
            let low = self.read_hex4().await?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.parse_error("unpaired surrogate in string"));
            }
            0x10000 + ((first - 0xD800) << 10) + (low - 0xDC00)
        } else if (0xDC00..0xE000).contains(&first) {
            return Err(self.parse_error("unpaired surrogate in string"));
        } else {
            first
        };
        char::from_u32(codepoint).ok_or_else(|| self.parse_error("invalid unicode escape"))
    }

    async fn read_hex4(&mut self) -> Result<u32, StreamError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let b = self
                .reader
                .next()
                .await?
                .ok_or(StreamError::PrematureClose)?;
            let digit = match b {
                b'0'..=b'9' => u32::from(b - b'0'),
                b'a'..=b'f' => u32::from(b - b'a') + 10,
                b'A'..=b'F' => u32::from(b - b'A') + 10,
                _ => return Err(self.parse_error("invalid hex digit in unicode escape")),
            };
            value = value * 16 + digit;
        }
        Ok(value)
    }

    async fn read_number(&mut self) -> Result<serde_json::Number, StreamError> {
        let mut text = String::new();
        while let Some(b) = self.reader.peek().await? {
            if matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                text.push(char::from(b));
                self.reader.next().await?;
            } else {
                break;
            }
        }
        if text.contains(['.', 'e', 'E']) {
            let f: f64 = text
                .parse()
                .map_err(|_| self.parse_error(format!("invalid number {text:?}")))?;
            serde_json::Number::from_f64(f)
                .ok_or_else(|| self.parse_error(format!("number out of range {text:?}")))
        } else if let Ok(i) = text.parse::<i64>() {
            Ok(serde_json::Number::from(i))
        } else if let Ok(u) = text.parse::<u64>() {
            Ok(serde_json::Number::from(u))
        } else {
            let f: f64 = text
                .parse()
                .map_err(|_| self.parse_error(format!("invalid number {text:?}")))?;
            serde_json::Number::from_f64(f)
                .ok_or_else(|| self.parse_error(format!("number out of range {text:?}")))
        }
    }

    fn pop(&mut self, expected: Container) -> Result<(), StreamError> {
        match self.stack.pop() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.parse_error("mismatched closing bracket")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunked(input: &str, chunk_size: usize) -> ByteStream {
        let chunks: Vec<Result<Bytes, StreamError>> = input
            .as_bytes()
            .chunks(chunk_size.max(1))
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    async fn all_events(input: &str, chunk_size: usize) -> Result<Vec<JsonEvent>, StreamError> {
        let mut tok = JsonTokenizer::new(chunked(input, chunk_size));
        let mut events = Vec::new();
        loop {
            let ev = tok.next_event().await?;
            let done = ev == JsonEvent::Eof;
            events.push(ev);
            if done {
                return Ok(events);
            }
        }
    }

    #[tokio::test]
    async fn tokenizes_flat_object() {
        let events = all_events(r#"{"a": 1, "b": "x", "c": true, "d": null}"#, 1024)
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ObjectStart,
                JsonEvent::Key("a".into()),
                JsonEvent::Number(1.into()),
                JsonEvent::Key("b".into()),
                JsonEvent::String("x".into()),
                JsonEvent::Key("c".into()),
                JsonEvent::Bool(true),
                JsonEvent::Key("d".into()),
                JsonEvent::Null,
                JsonEvent::ObjectEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn tokenizes_nested_arrays() {
        let events = all_events(r#"[[], [1, [2]]]"#, 1024).await.unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ArrayStart,
                JsonEvent::ArrayStart,
                JsonEvent::ArrayEnd,
                JsonEvent::ArrayStart,
                JsonEvent::Number(1.into()),
                JsonEvent::ArrayStart,
                JsonEvent::Number(2.into()),
                JsonEvent::ArrayEnd,
                JsonEvent::ArrayEnd,
                JsonEvent::ArrayEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn chunk_boundaries_do_not_change_events() {
        let input = r#"{"fields": {"dimensions": [{"name": "id", "tags": ["email"]}]}, "data": [{"id": {"value": "bébé"}}], "ran_at": "2026-08-27T00:00:00Z"}"#;
        let reference = all_events(input, usize::MAX).await.unwrap();
        for chunk_size in 1..24 {
            let events = all_events(input, chunk_size).await.unwrap();
            assert_eq!(events, reference, "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn string_escapes() {
        let events = all_events(r#"["a\"b", "tab\there", "A", "😀"]"#, 3)
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ArrayStart,
                JsonEvent::String("a\"b".into()),
                JsonEvent::String("tab\there".into()),
                JsonEvent::String("A".into()),
                JsonEvent::String("😀".into()),
                JsonEvent::ArrayEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn numbers() {
        let events = all_events(r#"[0, -12, 3.5, 1e3, 9223372036854775807]"#, 1024)
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![
                JsonEvent::ArrayStart,
                JsonEvent::Number(0.into()),
                JsonEvent::Number((-12).into()),
                JsonEvent::Number(serde_json::Number::from_f64(3.5).unwrap()),
                JsonEvent::Number(serde_json::Number::from_f64(1000.0).unwrap()),
                JsonEvent::Number(9_223_372_036_854_775_807_i64.into()),
                JsonEvent::ArrayEnd,
                JsonEvent::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn premature_close_mid_document() {
        for truncated in [r#"{"a": [1, 2"#, r#"{"a"#, r#"{"a": "unterminated"#, "["] {
            let err = all_events(truncated, 2).await.unwrap_err();
            assert!(
                matches!(err, StreamError::PrematureClose),
                "{truncated:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn trailing_data_is_an_error() {
        let err = all_events("{} junk", 1024).await.unwrap_err();
        assert!(matches!(err, StreamError::Parse { .. }));
    }

    #[tokio::test]
    async fn malformed_document_is_a_parse_error() {
        for bad in ["{,}", "[1,,2]", "{\"a\" 1}", "tru"] {
            let err = all_events(bad, 1024).await.unwrap_err();
            assert!(
                matches!(err, StreamError::Parse { .. } | StreamError::PrematureClose),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn source_error_propagates() {
        let chunks: Vec<Result<Bytes, StreamError>> = vec![
            Ok(Bytes::from_static(b"{\"a\": ")),
            Err(StreamError::Source("connection reset".into())),
        ];
        let mut tok = JsonTokenizer::new(Box::pin(stream::iter(chunks)));
        assert_eq!(tok.next_event().await.unwrap(), JsonEvent::ObjectStart);
        assert_eq!(tok.next_event().await.unwrap(), JsonEvent::Key("a".into()));
        let err = tok.next_event().await.unwrap_err();
        assert!(matches!(err, StreamError::Source(_)));
    }
}
