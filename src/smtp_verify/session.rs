use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use native_tls::{HandshakeError, TlsConnector, TlsStream};

use crate::smtp_verify::error::DialogError;
use crate::smtp_verify::types::SmtpReply;

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
    Invalid,
}

/// Time left before `deadline`, or `TimedOut` once it has passed.
fn remaining(deadline: Instant) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "attempt deadline reached"));
    }
    Ok(left)
}

/// Every socket operation of the attempt shares `deadline`: timeouts are
/// re-armed with the time left before each read and write.
#[derive(Debug)]
struct SmtpStream {
    state: StreamState,
    buffer: Vec<u8>,
    deadline: Instant,
}

impl SmtpStream {
    fn connect(addr: &SocketAddr, deadline: Instant) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(addr, remaining(deadline)?)?;
        Ok(Self {
            state: StreamState::Plain(stream),
            buffer: Vec::new(),
            deadline,
        })
    }

    fn arm(&self) -> io::Result<()> {
        let left = remaining(self.deadline)?;
        let socket = match &self.state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => stream.get_ref(),
            StreamState::Invalid => {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "invalid stream state"));
            }
        };
        socket.set_read_timeout(Some(left))?;
        socket.set_write_timeout(Some(left))
    }

    fn upgrade_tls(&mut self, domain: &str, connector: &TlsConnector) -> Result<(), DialogError> {
        let state = std::mem::replace(&mut self.state, StreamState::Invalid);
        let plain = match state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(());
            }
            StreamState::Invalid => {
                return Err(DialogError::Protocol("invalid stream state".into()));
            }
        };
        // bytes buffered before the handshake would belong to the plain session
        self.buffer.clear();
        let left = remaining(self.deadline).map_err(|err| DialogError::from_io(domain, err))?;
        plain
            .set_read_timeout(Some(left))
            .and_then(|()| plain.set_write_timeout(Some(left)))
            .map_err(|err| DialogError::from_io(domain, err))?;
        let tls = complete_handshake(connector, domain, plain, self.deadline)?;
        self.state = StreamState::Tls(tls);
        Ok(())
    }

    fn write_line(&mut self, command: &str) -> io::Result<()> {
        self.arm()?;
        let mut data = command.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        match &mut self.state {
            StreamState::Plain(stream) => {
                stream.write_all(&data)?;
                stream.flush()
            }
            StreamState::Tls(stream) => {
                stream.write_all(&data)?;
                stream.flush()
            }
            StreamState::Invalid => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "invalid stream state",
            )),
        }
    }

    fn read_line(&mut self) -> Result<String, DialogError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            self.arm().map_err(|err| DialogError::from_io("peer", err))?;
            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf),
                StreamState::Tls(stream) => stream.read(&mut buf),
                StreamState::Invalid => {
                    return Err(DialogError::Protocol("invalid stream state".into()));
                }
            };
            match read {
                Ok(0) => {
                    return Err(DialogError::from_io(
                        "peer",
                        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
                    ));
                }
                Ok(n) => self.buffer.extend_from_slice(&buf[..n]),
                Err(err) => return Err(DialogError::from_io("peer", err)),
            }
        }
    }

    fn read_reply(&mut self) -> Result<SmtpReply, DialogError> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            let line = self.read_line()?;
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(DialogError::Protocol(format!("invalid reply: {line}")));
            }
            let parsed_code = line[..3]
                .parse::<u16>()
                .map_err(|_| DialogError::Protocol(format!("invalid code in line: {line}")))?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(DialogError::Protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().trim_end().to_string());
            if is_last {
                break;
            }
        }
        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }
}

fn complete_handshake(
    connector: &TlsConnector,
    domain: &str,
    stream: TcpStream,
    deadline: Instant,
) -> Result<TlsStream<TcpStream>, DialogError> {
    // a read timeout surfaces as WouldBlock, so the loop also checks the deadline
    match connector.connect(domain, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(DialogError::Tls { source: err }),
        Err(HandshakeError::WouldBlock(mut mid)) => loop {
            if Instant::now() >= deadline {
                break Err(DialogError::Timeout {
                    host: domain.to_string(),
                });
            }
            match mid.handshake() {
                Ok(tls) => break Ok(tls),
                Err(HandshakeError::Failure(err)) => {
                    break Err(DialogError::Tls { source: err });
                }
                Err(HandshakeError::WouldBlock(next)) => mid = next,
            }
        },
    }
}

/// One SMTP connection. Never reused across attempts, and never alive past
/// the `deadline` it was opened with.
pub(crate) struct SmtpSession {
    host: String,
    stream: SmtpStream,
    encrypted: bool,
}

impl SmtpSession {
    pub(crate) fn connect(
        host: &str,
        addresses: &[SocketAddr],
        deadline: Instant,
    ) -> Result<Self, DialogError> {
        let mut last_err = None;
        for addr in addresses {
            if Instant::now() >= deadline {
                return Err(DialogError::Timeout {
                    host: host.to_string(),
                });
            }
            match SmtpStream::connect(addr, deadline) {
                Ok(stream) => {
                    tracing::debug!(host, %addr, "connected");
                    return Ok(Self {
                        host: host.to_string(),
                        stream,
                        encrypted: false,
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(source) => DialogError::Connect {
                host: host.to_string(),
                source,
            },
            None => DialogError::NoAddresses {
                host: host.to_string(),
            },
        })
    }

    pub(crate) fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub(crate) fn read_greeting(&mut self) -> Result<SmtpReply, DialogError> {
        let reply = self.read()?;
        tracing::debug!(host = %self.host, code = reply.code, "greeting");
        Ok(reply)
    }

    pub(crate) fn send_command(&mut self, command: &str) -> Result<SmtpReply, DialogError> {
        tracing::debug!(host = %self.host, "C: {command}");
        self.stream
            .write_line(command)
            .map_err(|err| DialogError::from_io(&self.host, err))?;
        let reply = self.read()?;
        tracing::debug!(host = %self.host, "S: {} {}", reply.code, reply.message());
        Ok(reply)
    }

    /// Issues `STARTTLS` and upgrades the stream when the server agrees.
    /// Returns the server's reply; a non-2xx reply leaves the session plain.
    pub(crate) fn starttls(&mut self, connector: &TlsConnector) -> Result<SmtpReply, DialogError> {
        let reply = self.send_command("STARTTLS")?;
        if !reply.is_positive_completion() {
            return Ok(reply);
        }
        let host = self.host.clone();
        self.stream.upgrade_tls(&host, connector)?;
        self.encrypted = true;
        Ok(reply)
    }

    pub(crate) fn quit(&mut self) {
        if let Err(err) = self.send_command("QUIT") {
            tracing::trace!(host = %self.host, "QUIT failed: {err}");
        }
    }

    fn read(&mut self) -> Result<SmtpReply, DialogError> {
        self.stream.read_reply().map_err(|err| match err {
            DialogError::Timeout { .. } => DialogError::Timeout {
                host: self.host.clone(),
            },
            DialogError::Disconnected { .. } => DialogError::Disconnected {
                host: self.host.clone(),
            },
            other => other,
        })
    }
}
