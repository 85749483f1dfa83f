//! Implementation of SMTP commands

use std::io::Write;

use tracing::{debug, info};

use crate::mta::queue::MailQueue;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::parser::{Command, DataReader};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// Applies parsed commands to a session and produces the replies
#[derive(Debug)]
pub struct SmtpCommandHandler<'a> {
    hostname: &'a str,
    queue: &'a MailQueue,
}

impl<'a> SmtpCommandHandler<'a> {
    pub fn new(hostname: &'a str, queue: &'a MailQueue) -> Self {
        Self { hostname, queue }
    }

    /// Process one command and return the final reply.
    ///
    /// DATA is the only command that talks to the client itself: it writes the
    /// 354 intermediate reply to `writer` before reading the body.
    pub fn process_command(
        &self,
        command: Command<'_>,
        session: &mut SmtpSession,
        writer: &mut dyn Write,
    ) -> Result<SmtpResponse, SmtpError> {
        debug!(session_id = %session.session_id(), "command: {:?}", command);

        match command {
            Command::Helo { domain } => {
                session.set_client_domain(&domain)?;
                Ok(SmtpResponse::helo(self.hostname, &domain))
            }
            Command::Ehlo { domain } => {
                session.set_client_domain(&domain)?;
                Ok(SmtpResponse::ehlo(self.hostname, &domain))
            }
            Command::Mail { from } => {
                session.set_sender(from)?;
                Ok(SmtpResponse::ok())
            }
            Command::Rcpt { to } => {
                session.add_recipient(to)?;
                Ok(SmtpResponse::ok())
            }
            Command::Data(body) => self.handle_data(body, session, writer),
            Command::Rset => {
                session.reset();
                Ok(SmtpResponse::ok())
            }
            Command::Noop => Ok(SmtpResponse::ok()),
            Command::Quit => Ok(SmtpResponse::quit()),
            Command::Vrfy { .. } => Ok(SmtpResponse::cannot_verify()),
            command @ (Command::Expn { .. } | Command::Send | Command::Soml | Command::Saml) => {
                Ok(SmtpResponse::not_implemented(command.verb()))
            }
            Command::Invalid { reason, .. } => Err(SmtpError::InvalidSyntax(reason)),
            Command::Unknown { verb } => Ok(SmtpResponse::unrecognized(&verb)),
        }
    }

    fn handle_data(
        &self,
        body: DataReader<'_>,
        session: &mut SmtpSession,
        writer: &mut dyn Write,
    ) -> Result<SmtpResponse, SmtpError> {
        // Refused DATA leaves the body unread; the client must not send one
        // before it sees 354.
        session.start_data()?;

        writer.write_all(SmtpResponse::data_start().format().as_bytes())?;
        writer.flush()?;

        let data = match body.into_body_limited(SmtpLimits::MAX_DATA_SIZE) {
            Ok(data) => data,
            Err(e) => {
                session.reset();
                return Err(e);
            }
        };

        let envelope = session.finish_data(data)?;
        info!(
            session_id = %envelope.session_id,
            ip = %envelope.ip,
            recipients = envelope.to.len(),
            size = envelope.data_size(),
            "message accepted"
        );

        self.queue
            .submit(envelope)
            .map_err(|_| SmtpError::QueueClosed)?;
        Ok(SmtpResponse::ok())
    }
}
