//! The in-flight message record handed to the processing pipeline

use std::net::{IpAddr, Ipv4Addr};

use uuid::Uuid;

use crate::smtp::address::MailAddress;

/// Sender, recipients and body of one message plus the connection it came from.
///
/// A session fills it in command by command, then submits it to the
/// [`MailQueue`](crate::mta::MailQueue). From there on handlers own it and may
/// rewrite `data` (header prepending); nothing else touches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse-path from `MAIL FROM`
    pub from: Option<MailAddress>,

    /// Forward-paths from `RCPT TO`, in the order received
    pub to: Vec<MailAddress>,

    /// Raw message content, headers included
    pub data: Vec<u8>,

    /// Address of the connected client
    pub ip: IpAddr,

    /// Host name the client announced in `HELO`/`EHLO`
    pub hostname: String,

    /// Identifies the connection in logs
    pub session_id: Uuid,
}

impl Envelope {
    /// Create an empty envelope for a connection
    pub fn new(session_id: Uuid, ip: IpAddr) -> Self {
        Self {
            from: None,
            to: Vec::new(),
            data: Vec::new(),
            ip,
            hostname: String::new(),
            session_id,
        }
    }

    /// Drop the transaction (sender, recipients, body) but keep the
    /// connection details
    pub fn reset(&mut self) {
        self.from = None;
        self.to.clear();
        self.data.clear();
    }

    /// Put a header field in front of the message.
    ///
    /// `field` must already carry its trailing CRLF.
    pub fn prepend_header(&mut self, field: &str) {
        let mut data = Vec::with_capacity(field.len() + self.data.len());
        data.extend_from_slice(field.as_bytes());
        data.append(&mut self.data);
        self.data = data;
    }

    /// Domain of the reverse-path, if there is one
    pub fn sender_domain(&self) -> Option<&str> {
        self.from.as_ref().map(MailAddress::domain)
    }

    /// Get the size of the message data in bytes
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Value of the first header field called `name` (case-insensitive),
    /// searching only the header section
    pub fn header(&self, name: &str) -> Option<String> {
        let text = String::from_utf8_lossy(&self.data);
        for line in text.lines() {
            if line.is_empty() {
                // End of headers
                break;
            }
            if let Some((field, value)) = line.split_once(':') {
                if field.eq_ignore_ascii_case(name) {
                    return Some(value.trim().to_string());
                }
            }
        }
        None
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(Uuid::nil(), IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(text: &str) -> MailAddress {
        MailAddress::parse(text).unwrap()
    }

    fn sample() -> Envelope {
        let mut envelope = Envelope::new(Uuid::new_v4(), "192.168.0.10".parse().unwrap());
        envelope.hostname = "mail.example.com".to_string();
        envelope.from = Some(addr("bob@example.org"));
        envelope.to = vec![addr("alice@example.com"), addr("carol@example.com")];
        envelope.data = b"Subject: Test\r\n\r\nHello\r\n".to_vec();
        envelope
    }

    #[test]
    fn test_prepend_header() {
        let mut envelope = sample();
        envelope.prepend_header("X-First: 1\r\n");
        envelope.prepend_header("X-Second: 2\r\n");

        assert_eq!(
            String::from_utf8(envelope.data).unwrap(),
            "X-Second: 2\r\nX-First: 1\r\nSubject: Test\r\n\r\nHello\r\n"
        );
    }

    #[test]
    fn test_header_lookup() {
        let mut envelope = sample();
        envelope.data.extend_from_slice(b"Subject: not a header\r\n");

        assert_eq!(envelope.header("subject").as_deref(), Some("Test"));
        assert_eq!(envelope.header("From"), None);
    }

    #[test]
    fn test_sender_domain() {
        let mut envelope = sample();
        assert_eq!(envelope.sender_domain(), Some("example.org"));

        envelope.from = None;
        assert_eq!(envelope.sender_domain(), None);
    }

    #[test]
    fn test_duplicate_recipients_are_kept() {
        let mut envelope = sample();
        envelope.to.push(addr("alice@example.com"));
        assert_eq!(envelope.to.len(), 3);
    }

    #[test]
    fn test_reset_keeps_connection() {
        let mut envelope = sample();
        let session_id = envelope.session_id;
        envelope.reset();

        assert!(envelope.from.is_none());
        assert!(envelope.to.is_empty());
        assert_eq!(envelope.data_size(), 0);
        assert_eq!(envelope.hostname, "mail.example.com");
        assert_eq!(envelope.session_id, session_id);
    }
}
