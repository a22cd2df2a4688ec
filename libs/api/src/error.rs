/// Category of a bench error. Lets the loops decide what to do with it:
/// the broker logs and carries on, publisher/subscriber abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration: permanent, fail at startup.
    Config,
    /// Transport failure other than "would block".
    Transport,
    /// Transport context was terminated; no further I/O is possible.
    Closed,
    /// Payload could not be encoded/decoded.
    Codec,
    /// Local I/O (files, folders).
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Closed => f.write_str("closed"),
            ErrorKind::Codec => f.write_str("codec"),
            ErrorKind::Io => f.write_str("io"),
        }
    }
}

/// Unified error type for every trait seam of the bench (sockets, codec,
/// run config).
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the kind automatically and allow `?` at call sites.
#[derive(Clone)]
pub struct BenchError {
    kind: ErrorKind,
    message: String,
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Transport, message: msg.into() }
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Closed, message: msg.into() }
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Codec, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_closed(&self) -> bool {
        self.kind == ErrorKind::Closed
    }
}

impl std::fmt::Debug for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BenchError {}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<prost::DecodeError> for BenchError {
    fn from(e: prost::DecodeError) -> Self { Self { kind: ErrorKind::Codec, message: e.to_string() } }
}

impl From<chrono::ParseError> for BenchError {
    fn from(e: chrono::ParseError) -> Self { Self { kind: ErrorKind::Codec, message: e.to_string() } }
}

impl From<std::str::Utf8Error> for BenchError {
    fn from(e: std::str::Utf8Error) -> Self { Self { kind: ErrorKind::Codec, message: e.to_string() } }
}
