//! Sender Policy Framework annotation
//!
//! The policy itself is evaluated by an [`SpfChecker`]; this module only
//! turns its verdict into an `Authentication-Result:` header (RFC 5451 2.2).

use std::fmt;
use std::net::IpAddr;

use tracing::{error, info, warn};

use crate::mta::config::Config;
use crate::mta::error::SpfError;
use crate::mta::handler::Handler;
use crate::smtp::envelope::Envelope;

/// Outcome of an SPF evaluation (RFC 7208 section 2.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpfResult {
    None,
    Neutral,
    Pass,
    Fail,
    SoftFail,
    TempError,
    PermError,
}

impl SpfResult {
    /// Lower-case keyword as used in `spf=` header properties
    pub fn as_str(&self) -> &'static str {
        match self {
            SpfResult::None => "none",
            SpfResult::Neutral => "neutral",
            SpfResult::Pass => "pass",
            SpfResult::Fail => "fail",
            SpfResult::SoftFail => "softfail",
            SpfResult::TempError => "temperror",
            SpfResult::PermError => "permerror",
        }
    }
}

impl fmt::Display for SpfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluates the SPF policy of `domain` for a client at `ip`
pub trait SpfChecker: Send + Sync {
    fn check_ip(&self, ip: IpAddr, domain: &str) -> Result<SpfResult, SpfError>;
}

impl<F> SpfChecker for F
where
    F: Fn(IpAddr, &str) -> Result<SpfResult, SpfError> + Send + Sync,
{
    fn check_ip(&self, ip: IpAddr, domain: &str) -> Result<SpfResult, SpfError> {
        self(ip, domain)
    }
}

/// Prepends `Authentication-Result: {hostname}; spf={result} smtp.mailfrom={domain};`.
///
/// A failed lookup leaves the message untouched.
pub struct Spf<C> {
    hostname: String,
    checker: C,
}

impl<C: SpfChecker> Spf<C> {
    pub fn new(config: &Config, checker: C) -> Self {
        Self {
            hostname: config.hostname.clone(),
            checker,
        }
    }
}

impl<C> fmt::Debug for Spf<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spf")
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

impl<C: SpfChecker> Handler for Spf<C> {
    fn handle(&self, envelope: &mut Envelope) {
        let Some(domain) = envelope.sender_domain().map(str::to_owned) else {
            warn!(
                session_id = %envelope.session_id,
                ip = %envelope.ip,
                "no sender domain, skipping SPF check"
            );
            return;
        };

        let result = match self.checker.check_ip(envelope.ip, &domain) {
            Ok(result) => result,
            Err(e) => {
                error!(
                    session_id = %envelope.session_id,
                    ip = %envelope.ip,
                    "error while checking ip in spf: {e}"
                );
                return;
            }
        };

        info!(ip = %envelope.ip, domain = %domain, "SPF returned {result}");

        let field = format!(
            "Authentication-Result: {}; spf={} smtp.mailfrom={};\r\n",
            self.hostname, result, domain
        );
        envelope.prepend_header(&field);
    }
}
