//! # Pistolet
//!
//! Pistolet is the protocol core of a small SMTP mail transfer agent.
//!
//! Sessions parse commands off the wire, assemble an [`Envelope`] and submit
//! it to a [`MailQueue`]. Queue workers run every envelope through a
//! [`Chain`] of handlers that annotate, log and store it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pistolet::{Chain, Config, Diagnostic, MailQueue, Received, SmtpServer, Storage};
//!
//! let config = Config::default();
//! let chain = Chain::new()
//!     .with(Received::new(&config))
//!     .with(Diagnostic)
//!     .with(Storage::maildir(&config));
//!
//! let (queue, _workers) = MailQueue::start(chain, config.workers, config.queue_capacity)?;
//! SmtpServer::new(&config.hostname, queue).start(config.listen)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Supported SMTP commands
//!
//! - `HELO` / `EHLO` - Identify the client
//! - `MAIL FROM` - Specify the sender's address
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the message, dot-stuffed, ended by a lone `.`
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//! - `VRFY` - Always answered with 252
//! - `EXPN`, `SEND`, `SOML`, `SAML` - Recognized, answered with 502
//!
//! ## Handlers
//!
//! - [`Received`] prepends a `Received:` trace header
//! - [`Spf`] prepends an `Authentication-Result:` header using an [`SpfChecker`]
//! - [`Storage`] writes the message into a [`Maildir`]
//! - [`Diagnostic`] logs the envelope
//!
//! Any `Fn(&mut Envelope) + Send + Sync` closure is a handler too.
//!
//! ## Notes
//!
//! - SMTP authentication is not supported.
//! - SSL/TLS connection is not supported.
//! - Mail relay is not supported.
//!
//! ## Size Limits
//!
//! - Local parts: 64 octets max
//! - Domains: 253 octets max
//! - Addresses: 254 octets max
//! - Command lines: 512 octets max
//! - Message data: 10 MiB max

pub mod mta;
pub mod smtp;

pub use mta::{
    Chain, Config, Diagnostic, Handler, MailQueue, MailSink, Maildir, QueueError, QueueWorkers,
    Received, Spf, SpfChecker, SpfError, SpfResult, Storage, StorageError,
};
pub use smtp::{
    AddressError, Command, Envelope, MailAddress, SmtpError, SmtpLimits, SmtpResponse, SmtpServer,
    SmtpSession, SmtpState, parse_command,
};
