//! SDP answer generation and a lenient offer summary

use std::net::IpAddr;

/// Payload types offered in every answer
pub const ANSWER_PAYLOAD_TYPES: [u8; 4] = [0, 8, 18, 101];

/// Build the single-stream audio answer for `ip:port`
pub fn build_answer(ip: IpAddr, port: u16) -> String {
    let payloads = ANSWER_PAYLOAD_TYPES
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    let lines = [
        "v=0".to_string(),
        format!("o=voip-monitor 123456 654321 IN IP4 {}", ip),
        "s=VoIP Quality Monitor".to_string(),
        format!("c=IN IP4 {}", ip),
        "t=0 0".to_string(),
        format!("m=audio {} RTP/AVP {}", port, payloads),
        "a=rtpmap:0 PCMU/8000".to_string(),
        "a=rtpmap:8 PCMA/8000".to_string(),
        "a=rtpmap:18 G729/8000".to_string(),
        "a=rtpmap:101 telephone-event/8000".to_string(),
        "a=fmtp:18 annexb=yes".to_string(),
        "a=sendrecv".to_string(),
    ];

    let mut sdp = lines.join("\r\n");
    sdp.push_str("\r\n");
    sdp
}

/// What the caller offered, for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferSummary {
    pub connection: Option<String>,
    pub audio_port: Option<u16>,
    pub payload_types: Vec<u8>,
    pub rtpmaps: Vec<String>,
}

/// Pull the connection address, audio port and formats out of an offer.
/// Unknown or malformed lines are ignored.
pub fn parse_offer(body: &str) -> OfferSummary {
    let mut summary = OfferSummary::default();
    for line in body.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("c=") {
            summary.connection = rest.split_whitespace().nth(2).map(str::to_string);
        } else if let Some(rest) = line.strip_prefix("m=audio ") {
            let mut fields = rest.split_whitespace();
            summary.audio_port = fields.next().and_then(|p| p.parse().ok());
            summary.payload_types = fields.skip(1).filter_map(|pt| pt.parse().ok()).collect();
        } else if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            summary.rtpmaps.push(rest.to_string());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_layout() {
        let sdp = build_answer("192.168.1.5".parse().unwrap(), 12000);
        let lines: Vec<&str> = sdp.split("\r\n").collect();
        assert_eq!(lines[0], "v=0");
        assert_eq!(lines[1], "o=voip-monitor 123456 654321 IN IP4 192.168.1.5");
        assert_eq!(lines[3], "c=IN IP4 192.168.1.5");
        assert_eq!(lines[5], "m=audio 12000 RTP/AVP 0 8 18 101");
        assert!(sdp.contains("a=rtpmap:18 G729/8000\r\n"));
        assert!(sdp.contains("a=fmtp:18 annexb=yes\r\n"));
        assert!(sdp.ends_with("a=sendrecv\r\n"));
    }

    #[test]
    fn offer_summary() {
        let offer = "v=0\r\nc=IN IP4 10.0.0.7\r\nm=audio 4000 RTP/AVP 8 0 101\r\na=rtpmap:8 PCMA/8000\r\n";
        let summary = parse_offer(offer);
        assert_eq!(summary.connection.as_deref(), Some("10.0.0.7"));
        assert_eq!(summary.audio_port, Some(4000));
        assert_eq!(summary.payload_types, vec![8, 0, 101]);
        assert_eq!(summary.rtpmaps, vec!["8 PCMA/8000".to_string()]);
        assert_eq!(parse_offer("garbage"), OfferSummary::default());
    }
}
