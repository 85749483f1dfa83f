//! Error types for the SMTP protocol layer

use thiserror::Error;

/// Faults that end the current command or connection.
///
/// Malformed client input is not an error: the parser reports it as
/// [`Command::Invalid`](crate::smtp::parser::Command::Invalid) or
/// [`Command::Unknown`](crate::smtp::parser::Command::Unknown).
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Invalid state for command")]
    InvalidState(String),

    #[error("Invalid syntax")]
    InvalidSyntax(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Too much mail data (max {max} bytes)")]
    TooMuchData { max: usize },

    #[error("Mail queue is closed")]
    QueueClosed,
}

/// Reasons a [`MailAddress`](crate::smtp::address::MailAddress) is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address contains whitespace")]
    Whitespace,

    #[error("address has no '@'")]
    MissingAt,

    #[error("local part too long (max {max} octets)")]
    LocalTooLong { max: usize },

    #[error("domain too long (max {max} octets)")]
    DomainTooLong { max: usize },

    #[error("address too long (max {max} octets)")]
    TooLong { max: usize },

    #[error("invalid local part")]
    InvalidLocal,

    #[error("invalid domain")]
    InvalidDomain,
}

/// SMTP size limits as defined in RFC 5321 section 4.5.3
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a local part
    pub const LOCAL_MAX_LENGTH: usize = 64;

    /// Maximum length of a domain name
    pub const DOMAIN_MAX_LENGTH: usize = 253;

    /// Maximum combined length of local part and domain
    pub const ADDRESS_MAX_LENGTH: usize = 254;

    /// Maximum length of a command line including CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;

    /// Maximum length of a reply line including CRLF
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Maximum total size of message data
    pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024; // 10MB
}

/// Maps SMTP errors to appropriate response codes
impl SmtpError {
    pub fn to_response_code(&self) -> &'static str {
        match self {
            SmtpError::Io(_) => "421",
            SmtpError::ConnectionClosed => "421",
            SmtpError::UnexpectedEof => "421",
            SmtpError::InvalidState(_) => "503",
            SmtpError::InvalidSyntax(_) => "501",
            SmtpError::InvalidAddress(_) => "553",
            SmtpError::TooMuchData { .. } => "552",
            SmtpError::QueueClosed => "451",
        }
    }

    pub fn to_response_message(&self) -> String {
        match self {
            SmtpError::Io(_) => "Service not available".to_string(),
            SmtpError::ConnectionClosed | SmtpError::UnexpectedEof => {
                "Connection closed".to_string()
            }
            SmtpError::InvalidState(msg) => format!("Bad sequence of commands: {msg}"),
            SmtpError::InvalidSyntax(msg) => format!("Syntax error: {msg}"),
            SmtpError::InvalidAddress(reason) => format!("Mailbox name not allowed: {reason}"),
            SmtpError::TooMuchData { max } => format!("Too much mail data (max {max} bytes)"),
            SmtpError::QueueClosed => "Local error in processing".to_string(),
        }
    }

    /// Whether the connection cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SmtpError::Io(_) | SmtpError::ConnectionClosed | SmtpError::UnexpectedEof
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        assert_eq!(SmtpError::InvalidState("x".into()).to_response_code(), "503");
        assert_eq!(SmtpError::InvalidSyntax("x".into()).to_response_code(), "501");
        assert_eq!(
            SmtpError::InvalidAddress(AddressError::MissingAt).to_response_code(),
            "553"
        );
        assert_eq!(SmtpError::QueueClosed.to_response_code(), "451");
    }

    #[test]
    fn test_response_message_carries_reason() {
        let err = SmtpError::from(AddressError::InvalidLocal);
        assert_eq!(
            err.to_response_message(),
            "Mailbox name not allowed: invalid local part"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SmtpError::ConnectionClosed.is_fatal());
        assert!(SmtpError::UnexpectedEof.is_fatal());
        assert!(!SmtpError::InvalidSyntax("x".into()).is_fatal());
        assert!(!SmtpError::TooMuchData { max: 1 }.is_fatal());
    }
}
