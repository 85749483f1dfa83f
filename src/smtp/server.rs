//! SMTP listener

use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::mta::queue::MailQueue;
use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::parser::parse_command;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// Accepts SMTP connections and feeds accepted messages to a [`MailQueue`].
///
/// Every connection is served on its own thread with its own session.
#[derive(Debug, Clone)]
pub struct SmtpServer {
    /// Server hostname
    hostname: String,
    queue: MailQueue,
}

impl SmtpServer {
    pub fn new(hostname: &str, queue: MailQueue) -> Self {
        Self {
            hostname: hostname.to_owned(),
            queue,
        }
    }

    /// Bind to `addr` and serve until the listener fails (blocking)
    pub fn start(&self, addr: impl ToSocketAddrs) -> Result<(), SmtpError> {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener)
    }

    /// Serve connections from an existing listener (blocking)
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        info!("SMTP server listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    let spawned = thread::Builder::new()
                        .name("smtp-session".to_string())
                        .spawn(move || server.serve(stream));
                    if let Err(e) = spawned {
                        error!("could not start session thread: {e}");
                    }
                }
                Err(e) => {
                    warn!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    fn serve(&self, stream: TcpStream) {
        let ip = stream
            .peer_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let mut session = SmtpSession::new(Uuid::new_v4(), ip);
        let session_id = session.session_id();
        info!(session_id = %session_id, ip = %ip, "connection opened");

        let result = stream
            .try_clone()
            .map_err(SmtpError::from)
            .and_then(|read_half| {
                let mut reader = BufReader::new(read_half);
                let mut writer = stream;
                self.handle_client(&mut reader, &mut writer, &mut session)
            });

        match result {
            Ok(()) => info!(session_id = %session_id, ip = %ip, "connection closed"),
            Err(e) => warn!(session_id = %session_id, ip = %ip, "connection aborted: {e}"),
        }
    }

    /// Run one SMTP conversation: greet, then answer commands until QUIT or
    /// the client goes away
    pub fn handle_client<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        session: &mut SmtpSession,
    ) -> Result<(), SmtpError>
    where
        R: BufRead,
        W: Write,
    {
        let command_handler = SmtpCommandHandler::new(&self.hostname, &self.queue);
        send_response(writer, &SmtpResponse::greeting(&self.hostname))?;

        loop {
            let command = match parse_command(reader) {
                Ok(command) => command,
                Err(SmtpError::ConnectionClosed) => {
                    debug!(session_id = %session.session_id(), "client hung up");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match command_handler.process_command(command, session, writer) {
                Ok(response) => {
                    send_response(writer, &response)?;
                    if response.code == "221" {
                        return Ok(());
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(session_id = %session.session_id(), "command refused: {e}");
                    send_response(writer, &SmtpResponse::from(&e))?;
                }
            }
        }
    }
}

/// Send a reply, replacing one that would exceed the reply line limit
fn send_response<W: Write + ?Sized>(
    writer: &mut W,
    response: &SmtpResponse,
) -> Result<(), SmtpError> {
    let formatted = response.format();
    let too_long = formatted
        .split_inclusive("\r\n")
        .any(|line| line.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH);

    if too_long {
        let truncated = SmtpResponse::new(&response.code, "Response too long (truncated)");
        writer.write_all(truncated.format().as_bytes())?;
    } else {
        writer.write_all(formatted.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
