//! SMTP protocol: addresses, command parsing, sessions and the listener

pub mod address;
pub mod commands;
pub mod envelope;
pub mod error;
pub mod parser;
pub mod response;
pub mod server;
pub mod session;

pub use address::MailAddress;
pub use envelope::Envelope;
pub use error::{AddressError, SmtpError, SmtpLimits};
pub use parser::{Command, DataReader, parse_command};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{SmtpSession, SmtpState};
