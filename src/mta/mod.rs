//! Processing of accepted messages

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod handler;
pub mod queue;
pub mod received;
pub mod spf;
pub mod storage;

pub use config::Config;
pub use diagnostic::Diagnostic;
pub use error::{QueueError, SpfError, StorageError};
pub use handler::{Chain, Handler};
pub use queue::{MailQueue, QueueWorkers};
pub use received::Received;
pub use spf::{Spf, SpfChecker, SpfResult};
pub use storage::{MailSink, Maildir, Storage};
