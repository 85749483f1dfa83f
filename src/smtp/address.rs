//! RFC 5321 mailbox value type

use std::fmt;
use std::str::FromStr;

use crate::smtp::error::{AddressError, SmtpLimits};

/// A mailbox (`local-part@domain`) as it appears in `MAIL FROM` and `RCPT TO`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailAddress {
    local: String,
    domain: String,
}

impl MailAddress {
    /// Build an address from its two halves without checking them.
    ///
    /// Use [`MailAddress::validate`] to find out whether the result is usable.
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse and validate the text found between the angle brackets of a path
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        if text.is_empty() {
            return Err(AddressError::Empty);
        }
        if text.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace);
        }

        // The local part may itself contain '@' only when quoted, which we do
        // not accept, so the last '@' is the separator.
        let (local, domain) = text.rsplit_once('@').ok_or(AddressError::MissingAt)?;

        let address = Self::new(local, domain);
        address.validate()?;
        Ok(address)
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Check the size limits and syntax of the address.
    ///
    /// This never performs I/O; the same two strings always give the same
    /// answer. The error's `Display` output is the human readable reason.
    pub fn validate(&self) -> Result<(), AddressError> {
        if self.local.len() > SmtpLimits::LOCAL_MAX_LENGTH {
            return Err(AddressError::LocalTooLong {
                max: SmtpLimits::LOCAL_MAX_LENGTH,
            });
        }
        if self.domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(AddressError::DomainTooLong {
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }
        if self.local.len() + self.domain.len() > SmtpLimits::ADDRESS_MAX_LENGTH {
            return Err(AddressError::TooLong {
                max: SmtpLimits::ADDRESS_MAX_LENGTH,
            });
        }
        if !is_dot_atom(&self.local) {
            return Err(AddressError::InvalidLocal);
        }
        if !is_domain(&self.domain) {
            return Err(AddressError::InvalidDomain);
        }
        Ok(())
    }

    /// Convenience wrapper around [`MailAddress::validate`]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl FromStr for MailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// RFC 5322 `atext`
fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

/// `Dot-string = Atom *("." Atom)`, with `Atom = 1*atext`
fn is_dot_atom(s: &str) -> bool {
    !s.is_empty()
        && s
            .split('.')
            .all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

/// Only the shape of the domain is checked here: whether it resolves, or is
/// even a well-formed host name, is up to the handlers.
fn is_domain(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c.is_control())
}
