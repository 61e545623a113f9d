//! Incremental decoding of raw response bodies into text fragments

use bytes::Bytes;
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};

use crate::error::{Error, Result};

/// Raw response body as delivered by the transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Upper bound on how much of an error body is read for diagnostics
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Streaming UTF-8 decoder.
///
/// Holds back the trailing bytes of an incomplete code point until the next
/// chunk arrives, so a decoded fragment never splits a character. Malformed
/// sequences become U+FFFD instead of failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, prefixed by any bytes held back from the previous one
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let joined: Vec<u8>;
        let mut rest: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.pending);
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
                    let (valid, invalid) = rest.split_at(e.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                        None => {
                            // Incomplete code point at the end of input
                            self.pending.extend_from_slice(invalid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input; a dangling partial code point becomes U+FFFD
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(char::REPLACEMENT_CHARACTER.to_string())
        }
    }

    /// Number of bytes currently held back
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Lazy, finite, non-restartable sequence of text fragments read from a body.
///
/// Memory is bounded by one chunk plus at most three held-back bytes; the
/// accumulated text is the caller's concern.
pub struct StreamDecoder {
    body: ByteStream,
    utf8: Utf8Decoder,
    finished: bool,
}

impl StreamDecoder {
    /// Begin consuming a response body
    pub fn open(body: ByteStream) -> Self {
        Self {
            body,
            utf8: Utf8Decoder::new(),
            finished: false,
        }
    }

    /// Wait for the next fragment.
    ///
    /// Returns `Ok(Some(text))` for a fragment, `Ok(None)` at end of stream,
    /// or the transport error. Chunks that only complete a held-back prefix
    /// are folded into the following fragment rather than yielded empty.
    pub async fn next(&mut self) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(chunk) = self.body.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = self.utf8.decode(&bytes);
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }

        self.finished = true;
        Ok(self.utf8.finish())
    }

    /// Whether end of stream (or a failure) has been observed
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Status line and body of a chat request, before classification
pub struct ChatResponse {
    pub status: u16,
    pub body: Option<ByteStream>,
}

impl ChatResponse {
    /// Accept the response for streaming.
    ///
    /// A non-2xx status or a missing body is a request-level failure; for a
    /// bad status the (bounded) error body is decoded into the error message.
    pub async fn into_body(self) -> Result<ByteStream> {
        if !(200..300).contains(&self.status) {
            let text = match self.body {
                Some(body) => read_to_string(body, MAX_ERROR_BODY).await,
                None => String::new(),
            };
            return Err(Error::status(self.status, &text));
        }

        self.body.ok_or(Error::MissingBody)
    }
}

/// Collect a body as text, stopping at `limit` decoded bytes or the first error
async fn read_to_string(body: ByteStream, limit: usize) -> String {
    let mut decoder = StreamDecoder::open(body);
    let mut text = String::new();
    while let Ok(Some(fragment)) = decoder.next().await {
        text.push_str(&fragment);
        if text.len() >= limit {
            break;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(chunks: Vec<Result<&'static [u8]>>) -> ByteStream {
        Box::pin(tokio_stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(Bytes::from_static))
                .collect::<Vec<_>>(),
        ))
    }

    fn ok(bytes: &'static [u8]) -> Result<&'static [u8]> {
        Ok(bytes)
    }

    async fn drain(decoder: &mut StreamDecoder) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(fragment) = decoder.next().await.unwrap() {
            out.push(fragment);
        }
        out
    }

    // --- Utf8Decoder ---

    #[test]
    fn test_ascii_passes_through() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"hello"), "hello");
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn test_code_point_split_across_chunks() {
        // "é" is C3 A9, "€" is E2 82 AC
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"caf\xC3"), "caf");
        assert_eq!(d.pending_len(), 1);
        assert_eq!(d.decode(b"\xA9 \xE2"), "é ");
        assert_eq!(d.decode(b"\x82"), "");
        assert_eq!(d.decode(b"\xAC!"), "€!");
        assert_eq!(d.pending_len(), 0);
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn test_four_byte_code_point_one_byte_at_a_time() {
        let bytes = "🦀".as_bytes();
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&d.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "🦀");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"a\xFFb"), "a\u{FFFD}b");
        // Lone continuation byte
        assert_eq!(d.decode(b"\x80c"), "\u{FFFD}c");
    }

    #[test]
    fn test_invalid_sequence_spanning_chunks() {
        let mut d = Utf8Decoder::new();
        // E2 82 starts a 3-byte sequence, then 'x' breaks it
        assert_eq!(d.decode(b"\xE2\x82"), "");
        assert_eq!(d.decode(b"x"), "\u{FFFD}x");
    }

    #[test]
    fn test_dangling_prefix_at_finish() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"ok\xF0\x9F"), "ok");
        assert_eq!(d.finish(), Some("\u{FFFD}".to_string()));
        assert_eq!(d.finish(), None);
    }

    // --- StreamDecoder ---

    #[tokio::test]
    async fn test_fragments_in_arrival_order() {
        let mut decoder = StreamDecoder::open(body_of(vec![ok(b"Hi"), ok(b" there")]));
        assert_eq!(drain(&mut decoder).await, vec!["Hi", " there"]);
        assert!(decoder.is_finished());
        assert_eq!(decoder.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_only_chunk_folds_into_next_fragment() {
        let mut decoder =
            StreamDecoder::open(body_of(vec![ok(b"\xE2"), ok(b"\x82"), ok(b"\xAC5")]));
        assert_eq!(drain(&mut decoder).await, vec!["€5"]);
    }

    #[tokio::test]
    async fn test_trailing_partial_emits_replacement() {
        let mut decoder = StreamDecoder::open(body_of(vec![ok(b"end\xC3")]));
        assert_eq!(drain(&mut decoder).await, vec!["end", "\u{FFFD}"]);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_then_ends() {
        let mut decoder = StreamDecoder::open(body_of(vec![
            ok(b"part"),
            Err(Error::Aborted),
            ok(b"never"),
        ]));
        assert_eq!(decoder.next().await.unwrap().as_deref(), Some("part"));
        assert!(matches!(decoder.next().await, Err(Error::Aborted)));
        assert_eq!(decoder.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_body_is_immediate_eof() {
        let mut decoder = StreamDecoder::open(body_of(vec![]));
        assert_eq!(decoder.next().await.unwrap(), None);
    }

    // --- ChatResponse ---

    #[tokio::test]
    async fn test_success_response_yields_body() {
        let response = ChatResponse {
            status: 200,
            body: Some(body_of(vec![ok(b"x")])),
        };
        let mut decoder = StreamDecoder::open(response.into_body().await.unwrap());
        assert_eq!(drain(&mut decoder).await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_error_status_reads_body() {
        let response = ChatResponse {
            status: 500,
            body: Some(body_of(vec![ok(b"over"), ok(b"loaded")])),
        };
        let err = response.into_body().await.err().unwrap();
        assert_eq!(err.reason(), "overloaded");
        assert!(matches!(err, Error::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_missing_body_is_failure() {
        let response = ChatResponse {
            status: 200,
            body: None,
        };
        assert!(matches!(
            response.into_body().await.err(),
            Some(Error::MissingBody)
        ));
    }

    #[tokio::test]
    async fn test_error_status_without_body() {
        let response = ChatResponse {
            status: 401,
            body: None,
        };
        let err = response.into_body().await.err().unwrap();
        assert!(err.is_unauthorized());
        assert_eq!(err.reason(), "Unauthorized");
    }
}
