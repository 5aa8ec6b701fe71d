//! Streaming `multipart/form-data` parser.
//!
//! Firmware images are larger than the free heap, so the body is never
//! buffered whole.  The parser is fed arbitrary chunks and forwards the
//! payload of the selected field to a [`PartSink`] as it arrives.  At most
//! `delimiter.len() - 1` bytes are held back between chunks, so output is
//! identical however the body is split.
//!
//! ```text
//!  preamble ──▶ --B ──▶ headers ──▶ body ──▶ \r\n--B ──▶ ... ──▶ \r\n--B-- (done)
//! ```

use core::fmt;

/// Receive buffer size used when draining a request body.
pub const CHUNK_SIZE: usize = 1436;

/// Cap on one part's header block.
const MAX_HEADER_BYTES: usize = 1024;

/// Longest boundary allowed by RFC 2046.
const MAX_BOUNDARY_LEN: usize = 70;

/// Receiver for the payload of the selected field.
pub trait PartSink {
    /// A part for the selected field starts.
    fn begin(&mut self, filename: &str);
    /// Next run of payload bytes.
    fn data(&mut self, bytes: &[u8]);
    /// The part ended at its closing delimiter.
    fn end(&mut self);
    /// The body ended inside the part.
    fn abort(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    /// A part's header block exceeded the cap.
    HeaderTooLarge,
    /// Bytes after a delimiter were neither `--` nor CRLF.
    Malformed,
    /// The body ended before the closing delimiter.
    Truncated,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTooLarge => write!(f, "part header too large"),
            Self::Malformed => write!(f, "malformed delimiter"),
            Self::Truncated => write!(f, "body truncated before closing boundary"),
        }
    }
}

/// Extract the boundary parameter from a `Content-Type` value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"'))
        .filter(|b| !b.is_empty() && b.len() <= MAX_BOUNDARY_LEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    Headers,
    Body { capture: bool },
    Done,
    Failed,
}

pub struct MultipartParser {
    /// `\r\n--<boundary>`.
    delimiter: Vec<u8>,
    field: String,
    buf: Vec<u8>,
    state: State,
    parts: u32,
    captured: u32,
}

impl MultipartParser {
    /// Parser that forwards parts named `field`.
    pub fn new(boundary: &str, field: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            delimiter,
            field: field.into(),
            // Seed with CRLF so the opening delimiter matches like the rest.
            buf: b"\r\n".to_vec(),
            state: State::Preamble,
            parts: 0,
            captured: 0,
        }
    }

    /// Parts seen so far (any field).
    pub fn parts(&self) -> u32 {
        self.parts
    }

    /// Parts of the selected field seen so far.
    pub fn captured(&self) -> u32 {
        self.captured
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn PartSink) -> Result<(), MultipartError> {
        if self.state == State::Failed {
            return Err(MultipartError::Malformed);
        }
        self.buf.extend_from_slice(chunk);

        loop {
            match self.state {
                State::Preamble => {
                    if let Some(pos) = find(&self.buf, &self.delimiter) {
                        self.buf.drain(..pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                    } else {
                        self.hold_tail();
                        return Ok(());
                    }
                }
                State::AfterDelimiter => {
                    if self.buf.len() < 2 {
                        return Ok(());
                    }
                    match &self.buf[..2] {
                        b"--" => {
                            self.state = State::Done;
                            self.buf.clear();
                            return Ok(());
                        }
                        b"\r\n" => {
                            self.buf.drain(..2);
                            self.state = State::Headers;
                        }
                        _ => {
                            self.state = State::Failed;
                            return Err(MultipartError::Malformed);
                        }
                    }
                }
                State::Headers => {
                    if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                        let header = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
                        self.buf.drain(..pos + 4);
                        self.parts += 1;
                        let disposition = ContentDisposition::parse(&header);
                        let capture = disposition.name.as_deref() == Some(self.field.as_str());
                        if capture {
                            self.captured += 1;
                            sink.begin(disposition.filename.as_deref().unwrap_or(""));
                        }
                        self.state = State::Body { capture };
                    } else if self.buf.len() > MAX_HEADER_BYTES {
                        self.state = State::Failed;
                        return Err(MultipartError::HeaderTooLarge);
                    } else {
                        return Ok(());
                    }
                }
                State::Body { capture } => {
                    if let Some(pos) = find(&self.buf, &self.delimiter) {
                        if capture {
                            if pos > 0 {
                                sink.data(&self.buf[..pos]);
                            }
                            sink.end();
                        }
                        self.buf.drain(..pos + self.delimiter.len());
                        self.state = State::AfterDelimiter;
                    } else {
                        let keep = self.delimiter.len() - 1;
                        if self.buf.len() > keep {
                            let ready = self.buf.len() - keep;
                            if capture {
                                sink.data(&self.buf[..ready]);
                            }
                            self.buf.drain(..ready);
                        }
                        return Ok(());
                    }
                }
                State::Done => {
                    // Epilogue is ignored.
                    self.buf.clear();
                    return Ok(());
                }
                State::Failed => return Err(MultipartError::Malformed),
            }
        }
    }

    /// End of body.  A part cut off mid-stream is aborted on the sink.
    pub fn finish(&mut self, sink: &mut dyn PartSink) -> Result<(), MultipartError> {
        match self.state {
            State::Done => Ok(()),
            State::Body { capture: true } => {
                sink.abort();
                self.state = State::Failed;
                Err(MultipartError::Truncated)
            }
            _ => {
                self.state = State::Failed;
                Err(MultipartError::Truncated)
            }
        }
    }

    fn hold_tail(&mut self) {
        let keep = self.delimiter.len() - 1;
        if self.buf.len() > keep {
            let excess = self.buf.len() - keep;
            self.buf.drain(..excess);
        }
    }
}

struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
}

impl ContentDisposition {
    fn parse(header_block: &str) -> Self {
        let mut out = Self {
            name: None,
            filename: None,
        };
        for line in header_block.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("content-disposition") {
                continue;
            }
            for param in value.split(';').skip(1) {
                let Some((k, v)) = param.trim().split_once('=') else {
                    continue;
                };
                let v = v.trim().trim_matches('"').to_string();
                match k.trim() {
                    "name" => out.name = Some(v),
                    "filename" => out.filename = Some(v),
                    _ => {}
                }
            }
        }
        out
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
