//! Message framing for stream transports
//!
//! A message is complete once the blank line after the headers has arrived
//! together with `Content-Length` body bytes. Reads may split a message or
//! carry several; bare CRLF keepalives between messages are discarded.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::message::{canonical_header_name, find_subslice};

const INITIAL_BUFFER_SIZE: usize = 8192;

/// Per-connection reassembly buffer
#[derive(Debug)]
pub struct StreamFramer {
    buffer: BytesMut,
    max_message_size: usize,
}

impl StreamFramer {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            max_message_size,
        }
    }

    /// Append bytes read from the stream
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete message, if one is buffered.
    ///
    /// Fails when the pending message would exceed the size limit; the
    /// connection should then be dropped.
    pub fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        while self.buffer.starts_with(b"\r\n") {
            self.buffer.advance(2);
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let header_end = match find_subslice(&self.buffer, b"\r\n\r\n") {
            Some(pos) => pos + 4,
            None => {
                if self.buffer.len() > self.max_message_size {
                    return Err(Error::MessageTooLarge { limit: self.max_message_size });
                }
                return Ok(None);
            }
        };

        let body_len = content_length(&self.buffer[..header_end]);
        let total = header_end.saturating_add(body_len);
        if total > self.max_message_size {
            return Err(Error::MessageTooLarge { limit: self.max_message_size });
        }
        if self.buffer.len() < total {
            return Ok(None);
        }

        Ok(Some(self.buffer.split_to(total).to_vec()))
    }

    /// Drain every complete message currently buffered
    pub fn drain_messages(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }
}

/// `Content-Length` (or `l`) of a header block; missing or invalid is 0
fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| canonical_header_name(name) == "content-length")
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: &str = "OPTIONS sip:x SIP/2.0\r\nCall-ID: a\r\nContent-Length: 0\r\n\r\n";
    const INVITE: &str = "INVITE sip:999@x SIP/2.0\r\nCall-ID: b\r\nl: 5\r\n\r\nv=0\r\n";

    #[test]
    fn message_split_across_reads() {
        let mut framer = StreamFramer::new(65535);
        let (a, b) = INVITE.split_at(30);
        framer.extend(a.as_bytes());
        assert!(framer.next_message().unwrap().is_none());
        let (b1, b2) = b.split_at(b.len() - 2);
        framer.extend(b1.as_bytes());
        assert!(framer.next_message().unwrap().is_none());
        framer.extend(b2.as_bytes());
        assert_eq!(framer.next_message().unwrap().unwrap(), INVITE.as_bytes());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn several_messages_in_one_read() {
        let mut framer = StreamFramer::new(65535);
        framer.extend(format!("\r\n\r\n{}{}{}", OPTIONS, INVITE, &OPTIONS[..10]).as_bytes());
        let messages = framer.drain_messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], OPTIONS.as_bytes());
        assert_eq!(messages[1], INVITE.as_bytes());
        assert_eq!(framer.buffered(), 10);
    }

    #[test]
    fn oversized_message_rejected() {
        let mut framer = StreamFramer::new(64);
        framer.extend(b"INVITE sip:x SIP/2.0\r\nContent-Length: 1000\r\n\r\n");
        assert!(matches!(framer.next_message(), Err(Error::MessageTooLarge { limit: 64 })));

        let mut framer = StreamFramer::new(16);
        framer.extend(&[b'a'; 32]);
        assert!(framer.next_message().is_err());
    }
}
