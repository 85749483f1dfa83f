//! Site configuration shared by the listener and the handlers

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Product name written into `Received:` trace headers
pub const PRODUCT_NAME: &str = "GoPistolet";

/// Settings of one MTA instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host name of this server, used in greetings and trace headers
    pub hostname: String,

    /// Address of this server as reported in trace headers
    pub ip: IpAddr,

    /// Name after `with` in `Received:` headers
    pub product_name: String,

    /// Root of the maildir messages are stored in
    pub maildir: PathBuf,

    /// Address the listener binds to
    pub listen: SocketAddr,

    /// Envelopes that may wait in the queue before `submit` blocks.
    /// Zero means every submission waits for a worker.
    pub queue_capacity: usize,

    /// Number of queue workers
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            product_name: PRODUCT_NAME.to_string(),
            maildir: PathBuf::from("./maildir"),
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 2525),
            queue_capacity: 0,
            workers: 1,
        }
    }
}
