//! Minimal SIP message model
//!
//! Only what the registrar needs: the start line, an ordered header list with
//! case-insensitive lookup (compact forms included) and the raw body. Header
//! values are kept verbatim after the first colon.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Register,
    Invite,
    Ack,
    Bye,
    Options,
    Cancel,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Register => "REGISTER",
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Options => "OPTIONS",
            Method::Cancel => "CANCEL",
            Method::Other(m) => m,
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(Error::parse(format!("Invalid method: {:?}", s)));
        }
        Ok(match s {
            "REGISTER" => Method::Register,
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "OPTIONS" => Method::Options,
            "CANCEL" => Method::Cancel,
            other => Method::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-Line or Status-Line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: Method,
        uri: String,
        version: String,
    },
    Response {
        version: String,
        status: u16,
        reason: String,
    },
}

/// Expand a compact header name (RFC 3261 section 7.3.3) and lowercase it
pub fn canonical_header_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let full = match lower.as_str() {
        "i" => "call-id",
        "f" => "from",
        "t" => "to",
        "m" => "contact",
        "v" => "via",
        "l" => "content-length",
        "c" => "content-type",
        "e" => "content-encoding",
        "k" => "supported",
        "s" => "subject",
        _ => return lower,
    };
    full.to_string()
}

/// A parsed SIP request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub start_line: StartLine,
    /// Headers in wire order, names as received
    headers: Vec<(String, String)>,
    pub body: String,
}

impl SipMessage {
    /// Parse one complete message.
    ///
    /// Header lines without a colon are skipped; folded continuation lines
    /// are joined to the previous header. The body is cut at Content-Length
    /// when that header is present and smaller than what was received.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (head, body) = split_head_body(data);
        let head = String::from_utf8_lossy(head);
        let mut lines = head.lines();

        let first = lines
            .by_ref()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::parse("Empty message"))?;
        let start_line = parse_start_line(first.trim())?;

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in lines {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    headers.push((name.to_string(), value.trim().to_string()));
                }
            }
        }

        let mut message = SipMessage {
            start_line,
            headers,
            body: String::new(),
        };

        let body = match message.content_length() {
            Some(len) if len < body.len() => &body[..len],
            _ => body,
        };
        message.body = String::from_utf8_lossy(body).into_owned();

        Ok(message)
    }

    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn request_uri(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { uri, .. } => Some(uri),
            StartLine::Response { .. } => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    /// First value of a header, matched case-insensitively (compact forms too)
    pub fn header(&self, name: &str) -> Option<&str> {
        let wanted = canonical_header_name(name);
        self.headers
            .iter()
            .find(|(n, _)| canonical_header_name(n) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in wire order
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        let wanted = canonical_header_name(name);
        self.headers
            .iter()
            .filter(|(n, _)| canonical_header_name(n) == wanted)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("call-id").filter(|v| !v.is_empty())
    }

    pub fn from_header(&self) -> Option<&str> {
        self.header("from")
    }

    pub fn to_header(&self) -> Option<&str> {
        self.header("to")
    }

    pub fn cseq(&self) -> Option<&str> {
        self.header("cseq")
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }
}

fn split_head_body(data: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find_subslice(data, b"\r\n\r\n") {
        return (&data[..pos], &data[pos + 4..]);
    }
    if let Some(pos) = find_subslice(data, b"\n\n") {
        return (&data[..pos], &data[pos + 2..]);
    }
    (data, &[])
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let mut parts = line.splitn(3, ' ');
    let first = parts.next().unwrap_or_default();
    let second = parts.next().unwrap_or_default();
    let third = parts.next().unwrap_or_default().trim();

    if first.starts_with("SIP/") {
        let status = second
            .parse::<u16>()
            .map_err(|_| Error::parse(format!("Invalid status code in {:?}", line)))?;
        return Ok(StartLine::Response {
            version: first.to_string(),
            status,
            reason: third.to_string(),
        });
    }

    if second.is_empty() || !third.starts_with("SIP/") {
        return Err(Error::parse(format!("Invalid request line {:?}", line)));
    }

    Ok(StartLine::Request {
        method: first.parse()?,
        uri: second.to_string(),
        version: third.to_string(),
    })
}

/// User part of the first `sip:user@` URI in a header value
pub fn extract_extension(header: &str) -> Option<String> {
    let mut rest = header;
    while let Some(pos) = rest.find("sip:") {
        let after = &rest[pos + 4..];
        if let Some(at) = after.find('@') {
            let user = &after[..at];
            if !user.is_empty() {
                return Some(user.to_string());
            }
        }
        rest = after;
    }
    None
}

/// URI inside `<...>`, or the whole value trimmed
pub fn extract_contact_uri(contact: &str) -> String {
    if let Some(start) = contact.find('<') {
        if let Some(len) = contact[start + 1..].find('>') {
            return contact[start + 1..start + 1 + len].to_string();
        }
    }
    contact.trim().to_string()
}

/// `user@host` (or `user`) from a name-addr, else the first token
pub fn extract_address(header: &str) -> String {
    if let Some(start) = header.find("<sip:") {
        let inner = &header[start + 5..];
        if let Some(end) = inner.find('>') {
            let inner = &inner[..end];
            return match inner.split_once('@') {
                Some((user, host)) if !host.is_empty() => format!("{}@{}", user, host),
                Some((user, _)) => user.to_string(),
                None => inner.to_string(),
            };
        }
    }
    header
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}

/// Value of a `;name=value` parameter in a header
pub fn header_param<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().trim_end_matches('>').trim_matches('"'))
        } else {
            None
        }
    })
}
