//! SIP response construction

use rand::Rng;

use crate::message::SipMessage;

/// Builds a response that mirrors the dialog headers of a request
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: u16,
    reason: String,
    vias: Vec<String>,
    call_id: String,
    from: String,
    to: String,
    cseq: String,
    extra: Vec<(String, String)>,
    server: Option<String>,
    content_type: Option<String>,
    body: String,
}

impl ResponseBuilder {
    pub fn new(request: &SipMessage, status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            vias: request.header_all("via").into_iter().map(str::to_string).collect(),
            call_id: request.call_id().unwrap_or("unknown").to_string(),
            from: request.from_header().unwrap_or_default().to_string(),
            to: request.to_header().unwrap_or_default().to_string(),
            cseq: request.cseq().unwrap_or_default().to_string(),
            extra: Vec::new(),
            server: None,
            content_type: None,
            body: String::new(),
        }
    }

    /// Append a `tag` to the To header unless one is present
    pub fn with_to_tag(mut self) -> Self {
        if !self.to.contains("tag=") {
            let tag: u32 = rand::thread_rng().gen_range(1_000_000..=9_999_999);
            self.to = format!("{};tag={}", self.to, tag);
        }
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn build(self) -> String {
        let mut out = format!("SIP/2.0 {} {}\r\n", self.status, self.reason);
        for via in &self.vias {
            out.push_str(&format!("Via: {}\r\n", via));
        }
        out.push_str(&format!("Call-ID: {}\r\n", self.call_id));
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("To: {}\r\n", self.to));
        out.push_str(&format!("CSeq: {}\r\n", self.cseq));
        for (name, value) in &self.extra {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        if let Some(server) = &self.server {
            out.push_str(&format!("Server: {}\r\n", server));
        }
        if let Some(content_type) = &self.content_type {
            out.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        out.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));
        out.push_str(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite() -> SipMessage {
        let raw = "INVITE sip:999@voip-monitor.local SIP/2.0\r\n\
            Via: SIP/2.0/UDP 10.0.0.2:5060;branch=z9hG4bKa\r\n\
            Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bKb\r\n\
            From: <sip:201@voip-monitor.local>;tag=111\r\n\
            To: <sip:999@voip-monitor.local>\r\n\
            Call-ID: call-1\r\n\
            CSeq: 1 INVITE\r\n\
            Content-Length: 0\r\n\r\n";
        SipMessage::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn mirrors_request_headers() {
        let response = ResponseBuilder::new(&invite(), 200, "OK")
            .server("VoIP-Quality-Monitor-Registrar/1.0")
            .build();
        let parsed = SipMessage::parse(response.as_bytes()).unwrap();
        assert!(response.starts_with("SIP/2.0 200 OK\r\n"));
        assert_eq!(parsed.header_all("via").len(), 2);
        assert_eq!(parsed.call_id(), Some("call-1"));
        assert_eq!(parsed.cseq(), Some("1 INVITE"));
        assert_eq!(parsed.header("server"), Some("VoIP-Quality-Monitor-Registrar/1.0"));
        assert_eq!(parsed.content_length(), Some(0));
    }

    #[test]
    fn to_tag_added_once() {
        let response = ResponseBuilder::new(&invite(), 302, "Moved Temporarily")
            .with_to_tag()
            .with_to_tag()
            .build();
        let parsed = SipMessage::parse(response.as_bytes()).unwrap();
        let to = parsed.to_header().unwrap();
        assert_eq!(to.matches("tag=").count(), 1);
        let tag: u32 = crate::message::header_param(to, "tag").unwrap().parse().unwrap();
        assert!((1_000_000..=9_999_999).contains(&tag));
    }

    #[test]
    fn body_sets_length_and_type() {
        let response = ResponseBuilder::new(&invite(), 200, "OK")
            .body("application/sdp", "v=0\r\n")
            .build();
        assert!(response.contains("Content-Type: application/sdp\r\n"));
        assert!(response.ends_with("Content-Length: 5\r\n\r\nv=0\r\n"));
    }
}
