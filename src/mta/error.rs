//! Error types for the processing pipeline and its collaborators

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("maildir {} does not exist", .0.display())]
    Missing(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpfError {
    #[error("DNS lookup failed: {0}")]
    Lookup(String),

    #[error("invalid SPF policy: {0}")]
    Policy(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("mail queue is closed")]
    Closed,

    #[error("could not start queue worker: {0}")]
    Spawn(#[from] std::io::Error),
}
