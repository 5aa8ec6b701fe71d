//! Transport-neutral HTTP request/response types and form decoding.
//!
//! The server adapter converts its native request into an [`HttpRequest`]
//! (body left as a streaming reader so uploads never buffer whole) and
//! writes back whatever [`HttpReply`] the handler returns.

use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if s.eq_ignore_ascii_case("POST") {
            Self::Post
        } else {
            Self::Other
        }
    }
}

/// An incoming request.  `body` is consumed at most once.
pub struct HttpRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a mut dyn Read,
}

impl<'a> HttpRequest<'a> {
    /// Split a request target into path and query.
    pub fn split_target(target: &'a str) -> (&'a str, &'a str) {
        match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        }
    }
}

/// Action the scheduler runs after the reply has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Reboot { grace_ms: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Send `Connection: close`.
    pub close: bool,
    pub after: Option<PostAction>,
}

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

impl HttpReply {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            close: false,
            after: None,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200, TEXT_HTML, body)
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, TEXT_PLAIN, body)
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, APPLICATION_JSON, body)
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not found")
    }

    #[must_use]
    pub fn then(mut self, action: PostAction) -> Self {
        self.after = Some(action);
        self
    }

    #[must_use]
    pub fn closing(mut self) -> Self {
        self.close = true;
        self
    }
}

// ---------------------------------------------------------------------------
// application/x-www-form-urlencoded
// ---------------------------------------------------------------------------

/// Largest urlencoded body read into memory.
pub const MAX_FORM_BODY: usize = 1024;

/// Decoded form fields; body fields shadow query fields of the same name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    /// Decode `query` and then `body`.
    pub fn parse(query: &str, body: &str) -> Self {
        let mut form = Self::default();
        form.extend(query);
        form.extend(body);
        form
    }

    /// Read at most [`MAX_FORM_BODY`] bytes from the request body and merge
    /// them with the query string.
    pub fn from_request(request: &mut HttpRequest<'_>) -> Self {
        let mut raw = Vec::new();
        let _ = (&mut *request.body)
            .take(MAX_FORM_BODY as u64)
            .read_to_end(&mut raw);
        let body = String::from_utf8_lossy(&raw);
        Self::parse(request.query, &body)
    }

    fn extend(&mut self, encoded: &str) {
        for pair in encoded.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let key = url_decode(k);
            let value = url_decode(v);
            if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == key) {
                slot.1 = value;
            } else {
                self.fields.push((key, value));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Percent-decode with `+` as space.  Malformed escapes pass through
/// literally; invalid UTF-8 is replaced.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push((h << 4) | l);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
