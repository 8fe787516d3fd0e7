use thiserror::Error;

/// Failure of a single SMTP dialog attempt.
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("no socket address resolved for {host}")]
    NoAddresses { host: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out waiting for {host}")]
    Timeout { host: String },
    #[error("{host} closed the connection")]
    Disconnected { host: String },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("{host} refused the session: {code} {message}")]
    Greeting {
        host: String,
        code: u16,
        message: String,
    },
    #[error("sender rejected with {code} {message}")]
    SenderRejected { code: u16, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl DialogError {
    /// Whether the attempt may succeed if repeated after a short delay.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::Disconnected { .. } => true,
            Self::Io { .. } => true,
            Self::Greeting { code, .. } | Self::SenderRejected { code, .. } => {
                (400..500).contains(code)
            }
            Self::NoAddresses { .. }
            | Self::Tls { .. }
            | Self::Protocol(_)
            | Self::DeadlineExceeded => false,
        }
    }

    pub(crate) fn from_io(host: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::Timeout {
                host: host.to_string(),
            },
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::Disconnected {
                host: host.to_string(),
            },
            _ => Self::Io { source: err },
        }
    }
}
