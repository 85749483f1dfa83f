//! `Received:` trace header (RFC 5322 section 3.6.7)

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Local, TimeZone};
use tracing::debug;

use crate::mta::config::Config;
use crate::mta::handler::Handler;
use crate::smtp::envelope::Envelope;

/// `date-time` as RFC 5322 writes it, e.g. `Wed, 05 Oct 2016 14:57:46 +0200`
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Prepends a trace header naming the client and this server.
///
/// It changes the body length, so it belongs at the head of the chain.
#[derive(Debug, Clone)]
pub struct Received {
    hostname: String,
    ip: IpAddr,
    product: String,
}

impl Received {
    pub fn new(config: &Config) -> Self {
        Self {
            hostname: config.hostname.clone(),
            ip: config.ip,
            product: config.product_name.clone(),
        }
    }

    /// The header field for `envelope` stamped with `date`, CRLF included
    pub fn field<Tz>(&self, envelope: &Envelope, date: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        format!(
            "Received: from {} ({}) by {} ({}) with {}; {}\r\n",
            envelope.hostname,
            envelope.ip,
            self.hostname,
            self.ip,
            self.product,
            date.format(DATE_FORMAT)
        )
    }
}

impl Handler for Received {
    fn handle(&self, envelope: &mut Envelope) {
        let field = self.field(envelope, &Local::now());
        envelope.prepend_header(&field);

        debug!(
            session_id = %envelope.session_id,
            ip = %envelope.ip,
            hostname = %envelope.hostname,
            "added received header: {}",
            field.trim_end()
        );
    }
}
