//! SMTP reply formatting

use crate::smtp::error::{SmtpError, SmtpLimits};

/// A reply sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// Reply code, e.g. "250", "354", "500"
    pub code: String,
    /// Human-readable text
    pub message: String,
    /// Extra lines of a multi-line reply (EHLO)
    pub multiline: Option<Vec<String>>,
}

impl SmtpResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            multiline: None,
        }
    }

    pub fn new_multiline(code: &str, message: &str, lines: Vec<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.to_owned(),
            multiline: Some(lines),
        }
    }

    /// 250 OK
    pub fn ok() -> Self {
        Self::new("250", "OK")
    }

    /// 220 service ready
    pub fn greeting(hostname: &str) -> Self {
        Self::new("220", &format!("{hostname} ESMTP ready"))
    }

    pub fn helo(hostname: &str, client_domain: &str) -> Self {
        Self::new("250", &format!("{hostname} Hello {client_domain}"))
    }

    /// 250 with the extensions this server offers
    pub fn ehlo(hostname: &str, client_domain: &str) -> Self {
        let capabilities = vec![
            "PIPELINING".to_owned(),
            format!("SIZE {}", SmtpLimits::MAX_DATA_SIZE),
        ];
        Self::new_multiline(
            "250",
            &format!("{hostname} Hello {client_domain}"),
            capabilities,
        )
    }

    /// 354 go ahead
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// 252, the server does not verify mailboxes
    pub fn cannot_verify() -> Self {
        Self::new("252", "Cannot VRFY user, but will accept message and attempt delivery")
    }

    /// 502 for commands this server recognizes but does not offer
    pub fn not_implemented(verb: &str) -> Self {
        Self::new("502", &format!("{verb} command not implemented"))
    }

    /// 500 for verbs nobody knows
    pub fn unrecognized(verb: &str) -> Self {
        Self::new("500", &format!("Command unrecognized: {verb}"))
    }

    /// 221 closing
    pub fn quit() -> Self {
        Self::new("221", "Bye")
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self::new(code, message)
    }

    /// Format the reply for the wire, CRLF included
    pub fn format(&self) -> String {
        if let Some(ref lines) = self.multiline {
            let mut result = format!("{}-{}\r\n", self.code, self.message);
            for (i, line) in lines.iter().enumerate() {
                if i == lines.len() - 1 {
                    // Last line uses space instead of dash
                    result.push_str(&format!("{} {}\r\n", self.code, line));
                } else {
                    result.push_str(&format!("{}-{}\r\n", self.code, line));
                }
            }
            result
        } else {
            format!("{} {}\r\n", self.code, self.message)
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        self.code.starts_with('2')
    }

    /// 4xx or 5xx
    pub fn is_error(&self) -> bool {
        self.code.starts_with('4') || self.code.starts_with('5')
    }
}

impl From<&SmtpError> for SmtpResponse {
    fn from(error: &SmtpError) -> Self {
        Self::error(error.to_response_code(), &error.to_response_message())
    }
}
