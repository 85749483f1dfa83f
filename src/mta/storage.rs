//! Message storage: the maildir sink and the handler that feeds it

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::mta::config::Config;
use crate::mta::error::StorageError;
use crate::mta::handler::Handler;
use crate::smtp::envelope::Envelope;

/// Somewhere finished messages go.
///
/// `write` stores one message and returns the name it was stored under.
pub trait MailSink: Send {
    fn write(&mut self, data: &mut dyn Read) -> Result<String, StorageError>;
}

/// A maildir (one file per message, see <https://cr.yp.to/proto/maildir.html>)
#[derive(Debug, Clone)]
pub struct Maildir {
    root: PathBuf,
    hostname: String,
}

impl Maildir {
    /// Open the maildir at `root`, creating `tmp/`, `new/` and `cur/` when
    /// `create` is set
    pub fn open(root: impl Into<PathBuf>, create: bool) -> Result<Self, StorageError> {
        let root = root.into();
        for sub in ["tmp", "new", "cur"] {
            let dir = root.join(sub);
            if dir.is_dir() {
                continue;
            }
            if !create {
                return Err(StorageError::Missing(root));
            }
            fs::create_dir_all(&dir)?;
        }

        Ok(Self {
            root,
            hostname: "localhost".to_string(),
        })
    }

    /// Host name used in generated file names
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        // '/' and ':' have a meaning in maildir file names
        self.hostname = hostname.replace(['/', ':'], "_");
        self
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn unique_name(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        format!("{secs}.{}.{}", Uuid::new_v4().simple(), self.hostname)
    }
}

impl MailSink for Maildir {
    /// Write into `tmp/`, then move into `new/` so readers never see a
    /// partial message
    fn write(&mut self, data: &mut dyn Read) -> Result<String, StorageError> {
        let name = self.unique_name();
        let tmp = self.root.join("tmp").join(&name);

        let mut file = File::create_new(&tmp)?;
        let stored = io::copy(data, &mut file)
            .and_then(|_| file.flush())
            .and_then(|()| file.sync_all())
            .and_then(|()| fs::rename(&tmp, self.root.join("new").join(&name)));

        if let Err(e) = stored {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!("Failed to remove {}: {cleanup}", tmp.display());
            }
            return Err(e.into());
        }
        Ok(name)
    }
}

type Opener = Box<dyn Fn() -> Result<Box<dyn MailSink>, StorageError> + Send + Sync>;

/// Hands each message body to a [`MailSink`].
///
/// The sink is opened on first use and then shared by every call. If opening
/// fails the message is not stored and the next message tries again.
pub struct Storage {
    open: Opener,
    sink: Mutex<Option<Box<dyn MailSink>>>,
}

impl Storage {
    pub fn new<F, S>(open: F) -> Self
    where
        F: Fn() -> Result<S, StorageError> + Send + Sync + 'static,
        S: MailSink + 'static,
    {
        Self {
            open: Box::new(move || Ok(Box::new(open()?) as Box<dyn MailSink>)),
            sink: Mutex::new(None),
        }
    }

    /// Store into the maildir named by the configuration, creating it if needed
    pub fn maildir(config: &Config) -> Self {
        let root = config.maildir.clone();
        let hostname = config.hostname.clone();
        Self::new(move || Ok(Maildir::open(root.clone(), true)?.with_hostname(&hostname)))
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = self.sink.lock().map(|s| s.is_some()).unwrap_or(false);
        f.debug_struct("Storage").field("open", &open).finish()
    }
}

impl Handler for Storage {
    fn handle(&self, envelope: &mut Envelope) {
        let mut sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if sink.is_none() {
            match (self.open)() {
                Ok(opened) => *sink = Some(opened),
                Err(e) => {
                    error!(
                        session_id = %envelope.session_id,
                        ip = %envelope.ip,
                        "could not open mail sink: {e}"
                    );
                    return;
                }
            }
        }
        let Some(sink) = sink.as_mut() else {
            return;
        };

        match sink.write(&mut envelope.data.as_slice()) {
            Ok(name) => info!(
                session_id = %envelope.session_id,
                ip = %envelope.ip,
                "mail written to {name}"
            ),
            Err(e) => error!(
                session_id = %envelope.session_id,
                ip = %envelope.ip,
                "could not store mail: {e}"
            ),
        }
    }
}
