//! SMTP command parser
//!
//! [`parse_command`] reads exactly one command line from a buffered stream and
//! classifies it. For `DATA` it hands back a [`DataReader`] that borrows the
//! same stream and yields the message body up to the terminating `.` line.
//!
//! Malformed input is a normal outcome and is reported as
//! [`Command::Invalid`] or [`Command::Unknown`]. Only stream faults are errors.

use std::fmt;
use std::io::{self, BufRead, Read};

use crate::smtp::address::MailAddress;
use crate::smtp::error::{SmtpError, SmtpLimits};

/// A single parsed SMTP command
pub enum Command<'a> {
    Helo { domain: String },
    Ehlo { domain: String },
    Mail { from: MailAddress },
    Rcpt { to: MailAddress },
    /// The message body, read lazily from the underlying stream
    Data(DataReader<'a>),
    Rset,
    Noop,
    Quit,
    Vrfy { param: String },
    Expn { list_name: String },
    Send,
    Soml,
    Saml,
    /// A known verb whose argument does not follow its grammar
    Invalid { line: String, reason: String },
    /// A verb this parser does not know, as received
    Unknown { verb: String },
}

impl Command<'_> {
    /// Upper-case verb of the command, `INVALID`/`UNKNOWN` for the fallbacks
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Helo { .. } => "HELO",
            Command::Ehlo { .. } => "EHLO",
            Command::Mail { .. } => "MAIL",
            Command::Rcpt { .. } => "RCPT",
            Command::Data(_) => "DATA",
            Command::Rset => "RSET",
            Command::Noop => "NOOP",
            Command::Quit => "QUIT",
            Command::Vrfy { .. } => "VRFY",
            Command::Expn { .. } => "EXPN",
            Command::Send => "SEND",
            Command::Soml => "SOML",
            Command::Saml => "SAML",
            Command::Invalid { .. } => "INVALID",
            Command::Unknown { .. } => "UNKNOWN",
        }
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Helo { domain } => f.debug_struct("Helo").field("domain", domain).finish(),
            Command::Ehlo { domain } => f.debug_struct("Ehlo").field("domain", domain).finish(),
            Command::Mail { from } => f.debug_struct("Mail").field("from", from).finish(),
            Command::Rcpt { to } => f.debug_struct("Rcpt").field("to", to).finish(),
            Command::Data(reader) => f.debug_tuple("Data").field(reader).finish(),
            Command::Vrfy { param } => f.debug_struct("Vrfy").field("param", param).finish(),
            Command::Expn { list_name } => f
                .debug_struct("Expn")
                .field("list_name", list_name)
                .finish(),
            Command::Invalid { line, reason } => f
                .debug_struct("Invalid")
                .field("line", line)
                .field("reason", reason)
                .finish(),
            Command::Unknown { verb } => f.debug_struct("Unknown").field("verb", verb).finish(),
            other => f.write_str(other.verb()),
        }
    }
}

/// Read and classify one command from `reader`.
///
/// Consumes exactly one line, or for `DATA` returns a reader that will
/// consume the body when the caller drains it. The body must be drained
/// before the next call, otherwise its lines are taken for commands.
pub fn parse_command<'a, R: BufRead + 'a>(reader: &'a mut R) -> Result<Command<'a>, SmtpError> {
    let mut raw = Vec::new();
    let read = read_line_capped(&mut *reader, &mut raw, SmtpLimits::COMMAND_LINE_MAX_LENGTH)?;
    if read.consumed == 0 {
        return Err(SmtpError::ConnectionClosed);
    }
    if !read.complete {
        return Err(SmtpError::UnexpectedEof);
    }

    let text = String::from_utf8_lossy(&raw);
    let line = strip_line_ending(&text);

    if read.consumed > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
        return Ok(invalid(line, "line too long"));
    }

    let (verb, args) = split_verb(line);
    if verb.is_empty() {
        return Ok(invalid(line, "empty command"));
    }

    let command = match verb.to_ascii_uppercase().as_str() {
        "HELO" => Command::Helo {
            domain: first_token(args),
        },
        "EHLO" => Command::Ehlo {
            domain: first_token(args),
        },
        "MAIL" => match parse_path(args, "FROM:") {
            Ok(from) => Command::Mail { from },
            Err(reason) => invalid(line, &reason),
        },
        "RCPT" => match parse_path(args, "TO:") {
            Ok(to) => Command::Rcpt { to },
            Err(reason) => invalid(line, &reason),
        },
        "DATA" => {
            if !args.is_empty() {
                return Ok(invalid(line, "DATA takes no arguments"));
            }
            Command::Data(DataReader::new(reader))
        }
        "RSET" => Command::Rset,
        "NOOP" => Command::Noop,
        "QUIT" => Command::Quit,
        "SEND" => Command::Send,
        "SOML" => Command::Soml,
        "SAML" => Command::Saml,
        "VRFY" => Command::Vrfy {
            param: args.to_string(),
        },
        "EXPN" => Command::Expn {
            list_name: args.to_string(),
        },
        _ => Command::Unknown {
            verb: verb.to_string(),
        },
    };

    Ok(command)
}

/// What [`read_line_capped`] saw of one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineRead {
    /// Octets taken from the stream, line ending included
    consumed: usize,
    /// Whether the line ended in `\n` rather than at end of stream
    complete: bool,
}

/// Like `read_until(b'\n')`, but at most `limit` octets end up in `buf`.
///
/// The rest of an oversized line is still consumed, then dropped, so the
/// stream stays aligned on line boundaries.
fn read_line_capped<R: BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> io::Result<LineRead> {
    let mut consumed = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(LineRead {
                consumed,
                complete: false,
            });
        }

        let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(end) => (&available[..=end], true),
            None => (available, false),
        };
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

        let n = chunk.len();
        reader.consume(n);
        consumed += n;
        if complete {
            return Ok(LineRead { consumed, complete });
        }
    }
}

fn invalid<'a>(line: &str, reason: &str) -> Command<'a> {
    Command::Invalid {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split a line into its verb and the untokenized rest
fn split_verb(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (line, ""),
    }
}

fn first_token(args: &str) -> String {
    args.split_whitespace().next().unwrap_or_default().to_string()
}

/// Grammar shared by `MAIL FROM:<path>` and `RCPT TO:<path>`.
///
/// The keyword is matched case-insensitively, the address is the text between
/// the first `<` and the last `>`. Anything after the closing bracket (ESMTP
/// parameters) is ignored.
fn parse_path(args: &str, keyword: &str) -> Result<MailAddress, String> {
    let head = args.get(..keyword.len()).unwrap_or_default();
    if !head.eq_ignore_ascii_case(keyword) {
        return Err(format!("expected {keyword}<address>"));
    }

    let rest = args[keyword.len()..].trim_start();
    if !rest.starts_with('<') {
        return Err("address must be enclosed in angle brackets".to_string());
    }
    let close = rest
        .rfind('>')
        .ok_or_else(|| "address must be enclosed in angle brackets".to_string())?;

    MailAddress::parse(&rest[1..close]).map_err(|e| e.to_string())
}

/// Forward-only reader over a `DATA` body.
///
/// Yields the body bytes with line endings as received, stops before the
/// `.` line and removes the leading dot from dot-stuffed lines.
pub struct DataReader<'a> {
    inner: &'a mut (dyn BufRead + 'a),
    line: Vec<u8>,
    pos: usize,
    /// Longest line kept in memory
    line_limit: usize,
    /// The current line was longer than `line_limit`
    truncated: bool,
    done: bool,
}

impl<'a> DataReader<'a> {
    fn new(inner: &'a mut (dyn BufRead + 'a)) -> Self {
        Self {
            inner,
            line: Vec::new(),
            pos: 0,
            line_limit: SmtpLimits::MAX_DATA_SIZE,
            truncated: false,
            done: false,
        }
    }

    /// Whether the terminating `.` line has been consumed
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the whole body, up to [`SmtpLimits::MAX_DATA_SIZE`] bytes
    pub fn into_body(self) -> Result<Vec<u8>, SmtpError> {
        self.into_body_limited(SmtpLimits::MAX_DATA_SIZE)
    }

    /// Read the whole body, failing with [`SmtpError::TooMuchData`] if it is
    /// larger than `max` bytes.
    ///
    /// The stream is always drained up to the terminator, so the next command
    /// can be parsed even when the body was rejected.
    pub fn into_body_limited(mut self, max: usize) -> Result<Vec<u8>, SmtpError> {
        let mut body = Vec::new();
        let mut overflow = false;
        // one octet more than `max` is enough to know a line does not fit,
        // and the terminator line must always fit
        self.line_limit = max.saturating_add(1).max(3);

        loop {
            self.next_line().map_err(from_io)?;
            if self.done {
                break;
            }
            if !overflow && !self.truncated && body.len() + self.line.len() <= max {
                body.extend_from_slice(&self.line);
            } else {
                overflow = true;
                body.clear();
            }
            self.pos = self.line.len();
        }

        if overflow {
            return Err(SmtpError::TooMuchData { max });
        }
        Ok(body)
    }

    fn next_line(&mut self) -> io::Result<()> {
        self.line.clear();
        self.pos = 0;

        let read = read_line_capped(&mut *self.inner, &mut self.line, self.line_limit)?;
        if !read.complete {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream inside DATA",
            ));
        }
        self.truncated = read.consumed > self.line_limit;

        // a cut line is never the terminator, only a prefix was kept
        let terminator = self.line == b".\r\n" || self.line == b".\n";
        if terminator && !self.truncated {
            self.line.clear();
            self.done = true;
        } else if self.line.starts_with(b".") {
            self.line.remove(0);
        }
        Ok(())
    }
}

impl Read for DataReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.line.len() {
            if self.done {
                return Ok(0);
            }
            self.next_line()?;
            if self.truncated {
                self.pos = self.line.len();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line too long inside DATA",
                ));
            }
        }

        let n = buf.len().min(self.line.len() - self.pos);
        buf[..n].copy_from_slice(&self.line[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl fmt::Debug for DataReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataReader")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

fn from_io(err: io::Error) -> SmtpError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SmtpError::UnexpectedEof
    } else {
        SmtpError::Io(err)
    }
}
