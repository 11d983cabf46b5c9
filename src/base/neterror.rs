use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Generic
    #[error("Operation failed")]
    Failed,
    #[error("Request cancelled")]
    Cancelled,
    #[error("Invalid argument")]
    InvalidArgument,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Content decoding failed")]
    ContentDecodingFailed,
    #[error("Content-Length mismatch")]
    ContentLengthMismatch,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // Crate-specific codes (outside Chromium's assigned ranges)
    #[error("Request already started")]
    RequestAlreadyStarted,
    #[error("Failed to read HTTP body")]
    HttpBodyError,
    #[error("Invalid UTF-8 in body")]
    InvalidUtf8,
    #[error("Request body encoding failed")]
    ContentEncodingFailed,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Context-carrying variants (see base::context)
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Failed to resolve {domain}: {reason}")]
    NameNotResolvedFor { domain: String, reason: String },
    #[error("{context}: {reason}")]
    Io { context: String, reason: String },

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Returns true for the cancellation outcome, which callers treat
    /// separately from failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetError::Cancelled)
    }

    /// Connection-level failures that a fresh socket may recover from.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionAborted
                | NetError::ConnectionTimedOut
                | NetError::EmptyResponse
        )
    }

    pub(crate) fn connection_failed_to(host: &str, port: u16, e: std::io::Error) -> Self {
        NetError::ConnectionFailedTo {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        }
    }

    pub(crate) fn dns_failed(domain: &str, e: std::io::Error) -> Self {
        NetError::NameNotResolvedFor {
            domain: domain.to_string(),
            reason: e.to_string(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, e: impl std::fmt::Display) -> Self {
        NetError::Io {
            context: context.into(),
            reason: e.to_string(),
        }
    }

    /// Classify a hyper error the way Chromium's stream layer reports them.
    pub(crate) fn from_hyper(e: &hyper::Error) -> Self {
        if e.is_parse() {
            NetError::InvalidHttpResponse
        } else if e.is_incomplete_message() {
            NetError::EmptyResponse
        } else if e.is_timeout() {
            NetError::ConnectionTimedOut
        } else if e.is_canceled() || e.is_closed() {
            NetError::ConnectionClosed
        } else {
            NetError::ConnectionReset
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Failed => -2,
            NetError::Cancelled => -3,
            NetError::InvalidArgument => -4,

            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed | NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => -105,
            NetError::InternetDisconnected => -106,
            NetError::SslProtocolError => -107,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::ContentDecodingFailed => -330,
            NetError::ContentLengthMismatch => -354,
            NetError::InvalidHttpResponse => -370,

            NetError::RequestAlreadyStarted => -10001,
            NetError::HttpBodyError => -10002,
            NetError::InvalidUtf8 => -10003,
            NetError::ContentEncodingFailed => -10004,
            NetError::InvalidConfig(_) => -10005,
            NetError::Io { .. } => -10006,
            NetError::Unknown(code) => *code,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -2 => NetError::Failed,
            -3 => NetError::Cancelled,
            -4 => NetError::InvalidArgument,

            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -107 => NetError::SslProtocolError,
            -109 => NetError::AddressUnreachable,
            -118 => NetError::ConnectionTimedOut,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -302 => NetError::UnknownUrlScheme,
            -303 => NetError::InvalidRedirect,
            -310 => NetError::TooManyRedirects,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,
            -330 => NetError::ContentDecodingFailed,
            -354 => NetError::ContentLengthMismatch,
            -370 => NetError::InvalidHttpResponse,

            -10001 => NetError::RequestAlreadyStarted,
            -10002 => NetError::HttpBodyError,
            -10003 => NetError::InvalidUtf8,
            -10004 => NetError::ContentEncodingFailed,
            _ => NetError::Unknown(code),
        }
    }
}
