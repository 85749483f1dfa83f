//! SMTP session state management

use std::net::IpAddr;

use uuid::Uuid;

use crate::smtp::address::MailAddress;
use crate::smtp::envelope::Envelope;
use crate::smtp::error::{SmtpError, SmtpLimits};

/// Represents the current state of an SMTP session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Initial state - waiting for HELO
    Initial,
    /// HELO received - ready for MAIL command
    GreetingReceived,
    /// MAIL FROM received - ready for RCPT commands
    MailReceived,
    /// At least one RCPT TO received - ready for DATA or more RCPT commands
    RecipientsReceived,
}

/// State and envelope of one client connection
#[derive(Debug, Clone)]
pub struct SmtpSession {
    /// Current state of the session
    pub state: SmtpState,
    /// The message being assembled, with the connection details
    pub envelope: Envelope,
}

impl SmtpSession {
    pub fn new(session_id: Uuid, ip: IpAddr) -> Self {
        Self {
            state: SmtpState::Initial,
            envelope: Envelope::new(session_id, ip),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.envelope.session_id
    }

    /// Client domain from HELO/EHLO, if one was given yet
    pub fn client_domain(&self) -> Option<&str> {
        if self.envelope.hostname.is_empty() {
            None
        } else {
            Some(&self.envelope.hostname)
        }
    }

    /// Drop the current transaction, keeping the greeting
    pub fn reset(&mut self) {
        self.envelope.reset();
        if self.state != SmtpState::Initial {
            self.state = SmtpState::GreetingReceived;
        }
    }

    /// Record the domain from HELO/EHLO and start over
    pub fn set_client_domain(&mut self, domain: &str) -> Result<(), SmtpError> {
        if domain.is_empty() {
            return Err(SmtpError::InvalidSyntax(
                "HELO requires domain argument".to_string(),
            ));
        }
        if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::InvalidSyntax(format!(
                "domain too long (max {} octets)",
                SmtpLimits::DOMAIN_MAX_LENGTH
            )));
        }

        self.envelope.reset();
        self.envelope.hostname = domain.to_string();
        self.state = SmtpState::GreetingReceived;
        Ok(())
    }

    /// Set the reverse-path
    pub fn set_sender(&mut self, sender: MailAddress) -> Result<(), SmtpError> {
        if !self.can_execute_command("MAIL") {
            return Err(SmtpError::InvalidState(
                "MAIL command requires HELO first".to_string(),
            ));
        }
        sender.validate()?;

        self.envelope.reset();
        self.envelope.from = Some(sender);
        self.state = SmtpState::MailReceived;
        Ok(())
    }

    /// Add a forward-path
    pub fn add_recipient(&mut self, recipient: MailAddress) -> Result<(), SmtpError> {
        if !self.can_execute_command("RCPT") {
            return Err(SmtpError::InvalidState(
                "RCPT command requires MAIL first".to_string(),
            ));
        }
        recipient.validate()?;

        self.envelope.to.push(recipient);
        self.state = SmtpState::RecipientsReceived;
        Ok(())
    }

    /// Check that DATA may start now
    pub fn start_data(&self) -> Result<(), SmtpError> {
        if !self.can_execute_command("DATA") {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }
        Ok(())
    }

    /// Attach the body and hand out the finished envelope.
    ///
    /// The session goes back to the post-greeting state either way.
    pub fn finish_data(&mut self, data: Vec<u8>) -> Result<Envelope, SmtpError> {
        self.start_data()?;

        let mut envelope = self.envelope.clone();
        envelope.data = data;
        self.reset();
        Ok(envelope)
    }

    /// Check if the session is ready for a specific command
    pub fn can_execute_command(&self, command: &str) -> bool {
        match command.to_uppercase().as_str() {
            "HELO" | "EHLO" => true,
            "MAIL" => self.state == SmtpState::GreetingReceived,
            "RCPT" => {
                self.state == SmtpState::MailReceived || self.state == SmtpState::RecipientsReceived
            }
            "DATA" => self.state == SmtpState::RecipientsReceived,
            "RSET" | "NOOP" | "QUIT" | "VRFY" => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::error::AddressError;
    use pretty_assertions::assert_eq;

    fn session() -> SmtpSession {
        SmtpSession::new(Uuid::new_v4(), "192.0.2.1".parse().unwrap())
    }

    fn address(text: &str) -> MailAddress {
        MailAddress::parse(text).unwrap()
    }

    fn ready() -> SmtpSession {
        let mut session = session();
        session.set_client_domain("client.local").unwrap();
        session.set_sender(address("sender@example.com")).unwrap();
        session
            .add_recipient(address("recipient@example.com"))
            .unwrap();
        session
    }

    #[test]
    fn test_new_session() {
        let session = session();
        assert_eq!(session.state, SmtpState::Initial);
        assert!(session.envelope.from.is_none());
        assert!(session.envelope.to.is_empty());
        assert!(session.client_domain().is_none());
        assert_eq!(session.session_id(), session.envelope.session_id);
    }

    #[test]
    fn test_set_client_domain() {
        let mut session = session();
        session.set_client_domain("client.local").unwrap();

        assert_eq!(session.state, SmtpState::GreetingReceived);
        assert_eq!(session.client_domain(), Some("client.local"));
    }

    #[test]
    fn test_empty_client_domain() {
        let mut session = session();
        let result = session.set_client_domain("");
        assert!(matches!(result, Err(SmtpError::InvalidSyntax(_))));
        assert_eq!(session.state, SmtpState::Initial);
    }

    #[test]
    fn test_domain_too_long() {
        let mut session = session();
        let long_domain = "a".repeat(SmtpLimits::DOMAIN_MAX_LENGTH + 1);

        let result = session.set_client_domain(&long_domain);
        assert!(matches!(result, Err(SmtpError::InvalidSyntax(_))));
    }

    #[test]
    fn test_set_sender() {
        let mut session = session();
        session.set_client_domain("client.local").unwrap();

        session.set_sender(address("sender@example.com")).unwrap();
        assert_eq!(session.envelope.from, Some(address("sender@example.com")));
        assert_eq!(session.state, SmtpState::MailReceived);
    }

    #[test]
    fn test_sender_requires_greeting() {
        let mut session = session();
        let result = session.set_sender(address("sender@example.com"));
        assert!(matches!(result, Err(SmtpError::InvalidState(_))));
    }

    #[test]
    fn test_invalid_sender_is_rejected() {
        let mut session = session();
        session.set_client_domain("client.local").unwrap();

        let result = session.set_sender(MailAddress::new("a".repeat(65), "example.com"));
        assert!(matches!(
            result,
            Err(SmtpError::InvalidAddress(AddressError::LocalTooLong { .. }))
        ));
        assert_eq!(session.state, SmtpState::GreetingReceived);
    }

    #[test]
    fn test_add_recipient() {
        let session = ready();
        assert_eq!(session.envelope.to, vec![address("recipient@example.com")]);
        assert_eq!(session.state, SmtpState::RecipientsReceived);
    }

    #[test]
    fn test_many_recipients() {
        let mut session = ready();
        for i in 0..500 {
            session
                .add_recipient(address(&format!("user{i}@example.com")))
                .unwrap();
        }
        assert_eq!(session.envelope.to.len(), 501);
    }

    #[test]
    fn test_finish_data() {
        let mut session = ready();
        let envelope = session.finish_data(b"Subject: Test\r\n\r\nbody\r\n".to_vec()).unwrap();

        assert_eq!(envelope.from, Some(address("sender@example.com")));
        assert_eq!(envelope.to, vec![address("recipient@example.com")]);
        assert_eq!(envelope.data, b"Subject: Test\r\n\r\nbody\r\n");
        assert_eq!(envelope.hostname, "client.local");
        assert_eq!(envelope.session_id, session.session_id());

        // ready for the next transaction
        assert_eq!(session.state, SmtpState::GreetingReceived);
        assert!(session.envelope.from.is_none());
        assert!(session.envelope.to.is_empty());
    }

    #[test]
    fn test_data_requires_recipient() {
        let mut session = session();
        session.set_client_domain("client.local").unwrap();
        session.set_sender(address("sender@example.com")).unwrap();

        assert!(matches!(
            session.start_data(),
            Err(SmtpError::InvalidState(_))
        ));
        assert!(session.finish_data(Vec::new()).is_err());
    }

    #[test]
    fn test_can_execute_command() {
        let mut session = session();

        // Initial state
        assert!(session.can_execute_command("HELO"));
        assert!(session.can_execute_command("EHLO"));
        assert!(session.can_execute_command("NOOP"));
        assert!(session.can_execute_command("QUIT"));
        assert!(session.can_execute_command("RSET"));
        assert!(!session.can_execute_command("MAIL"));
        assert!(!session.can_execute_command("RCPT"));
        assert!(!session.can_execute_command("DATA"));

        // After HELO
        session.set_client_domain("client.local").unwrap();
        assert!(session.can_execute_command("MAIL"));
        assert!(!session.can_execute_command("RCPT"));
        assert!(!session.can_execute_command("DATA"));

        // After MAIL
        session.set_sender(address("sender@example.com")).unwrap();
        assert!(session.can_execute_command("RCPT"));
        assert!(!session.can_execute_command("MAIL"));
        assert!(!session.can_execute_command("DATA"));

        // After RCPT
        session
            .add_recipient(address("recipient@example.com"))
            .unwrap();
        assert!(session.can_execute_command("DATA"));
        assert!(session.can_execute_command("RCPT"));
    }

    #[test]
    fn test_reset() {
        let mut session = ready();
        session.reset();

        assert_eq!(session.state, SmtpState::GreetingReceived);
        assert!(session.envelope.from.is_none());
        assert!(session.envelope.to.is_empty());
        assert_eq!(session.client_domain(), Some("client.local"));
    }

    #[test]
    fn test_reset_before_greeting() {
        let mut session = session();
        session.reset();
        assert_eq!(session.state, SmtpState::Initial);
    }
}
