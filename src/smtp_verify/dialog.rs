use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use native_tls::TlsConnector;

use crate::smtp_verify::error::DialogError;
use crate::smtp_verify::options::{DialogOptions, SenderIdentity};
use crate::smtp_verify::session::SmtpSession;
use crate::smtp_verify::types::ProbeOutcome;

/// One dialog attempt against one exchanger: greeting, sender, recipient.
///
/// Implementations must open a fresh connection for every call and return the
/// recipient reply verbatim. Failures that prevent reaching `RCPT TO` are
/// reported as [`DialogError`].
pub trait RecipientProbe: Send + Sync {
    fn attempt(
        &self,
        host: &str,
        recipient: &str,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DialogError>;
}

/// [`RecipientProbe`] speaking SMTP over TCP, with opportunistic STARTTLS.
pub struct SmtpDialog {
    sender: SenderIdentity,
    options: DialogOptions,
    connector: Option<TlsConnector>,
}

impl SmtpDialog {
    pub fn new(sender: SenderIdentity, options: DialogOptions) -> Self {
        // Certificates are not checked: encryption here is best-effort and
        // many relays present self-signed or mismatched certificates.
        let connector = if options.starttls {
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|err| tracing::warn!("TLS unavailable, probing in clear text: {err}"))
                .ok()
        } else {
            None
        };
        Self {
            sender,
            options,
            connector,
        }
    }

    pub fn sender(&self) -> &SenderIdentity {
        &self.sender
    }

    fn resolve(&self, host: &str) -> Result<Vec<SocketAddr>, DialogError> {
        let addrs: Vec<SocketAddr> = (host, self.options.port)
            .to_socket_addrs()
            .map_err(|_| DialogError::NoAddresses {
                host: host.to_string(),
            })?
            .collect();
        if addrs.is_empty() {
            return Err(DialogError::NoAddresses {
                host: host.to_string(),
            });
        }
        Ok(addrs)
    }

    /// Connects, reads the greeting and introduces ourselves. When `tls` is
    /// set and the server offers STARTTLS, the session is upgraded.
    fn open(
        &self,
        host: &str,
        addrs: &[SocketAddr],
        deadline: Instant,
        tls: Option<&TlsConnector>,
    ) -> Result<SmtpSession, DialogError> {
        let mut session = SmtpSession::connect(host, addrs, deadline)?;
        let greeting = session.read_greeting()?;
        if !greeting.is_positive_completion() {
            session.quit();
            return Err(DialogError::Greeting {
                host: host.to_string(),
                code: greeting.code,
                message: greeting.message(),
            });
        }

        let ehlo = self.introduce(&mut session)?;
        if let Some(connector) = tls {
            if ehlo.has_capability("STARTTLS") {
                let reply = session.starttls(connector)?;
                if session.is_encrypted() {
                    self.introduce(&mut session)?;
                } else {
                    tracing::warn!(host, code = reply.code, "STARTTLS refused, continuing unencrypted");
                }
            }
        }
        Ok(session)
    }

    fn introduce(
        &self,
        session: &mut SmtpSession,
    ) -> Result<crate::smtp_verify::types::SmtpReply, DialogError> {
        let ehlo = session.send_command(&format!("EHLO {}", self.sender.helo))?;
        if ehlo.is_positive_completion() {
            return Ok(ehlo);
        }
        let helo = session.send_command(&format!("HELO {}", self.sender.helo))?;
        if helo.is_positive_completion() {
            Ok(helo)
        } else {
            Err(DialogError::Protocol(format!(
                "EHLO/HELO rejected with {}",
                helo.code
            )))
        }
    }

    fn envelope(
        &self,
        session: &mut SmtpSession,
        host: &str,
        recipient: &str,
    ) -> Result<ProbeOutcome, DialogError> {
        let mail = session.send_command(&format!("MAIL FROM:<{}>", self.sender.mail_from))?;
        if !mail.is_positive_completion() {
            session.quit();
            return Err(DialogError::SenderRejected {
                code: mail.code,
                message: mail.message(),
            });
        }
        let rcpt = session.send_command(&format!("RCPT TO:<{recipient}>"))?;
        session.quit();
        Ok(ProbeOutcome::answered(host, rcpt.code, rcpt.message()))
    }
}

impl RecipientProbe for SmtpDialog {
    fn attempt(
        &self,
        host: &str,
        recipient: &str,
        timeout: Duration,
    ) -> Result<ProbeOutcome, DialogError> {
        // the clear-text retry shares the budget of the failed handshake
        let deadline = Instant::now() + timeout;
        let addrs = self.resolve(host)?;
        let mut session = match self.open(host, &addrs, deadline, self.connector.as_ref()) {
            Ok(session) => session,
            Err(err @ DialogError::Tls { .. }) => {
                tracing::warn!(host, "skipping TLS: {err}");
                self.open(host, &addrs, deadline, None)?
            }
            Err(err) => return Err(err),
        };
        self.envelope(&mut session, host, recipient)
    }
}
