use std::{borrow::Cow, fmt, sync::Arc, time::Duration};

use crate::{Address, Direction};

/// The single error type for all harness operations.
///
/// Every fallible API returns `hci_cert::Result<T>` (alias for
/// `Result<T, hci_cert::Error>`). Transport failures are wrapped into
/// [`Error::External`] so test scenarios only need to handle one error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("An {0} connection request is already pending")]
    AlreadyPending(Direction),

    #[error("No {0} connection request is pending")]
    NotPending(Direction),

    #[error("Stream '{0}' is closed")]
    StreamClosed(String),

    #[error("Stream '{0}' source ended")]
    SourceEnded(String),

    #[error("Stream '{stream}': no match within {timeout:?}; {mismatch}")]
    EmitsTimeout {
        stream: String,
        timeout: Duration,
        mismatch: Mismatch,
    },

    #[error("Stream '{stream}': source ended before match; {mismatch}")]
    EndedBeforeMatch { stream: String, mismatch: Mismatch },

    #[error("Stream '{stream}': unexpected event matching {predicate}: {event}")]
    UnexpectedEvent {
        stream: String,
        predicate: String,
        event: String,
    },

    #[error("Capture '{0}' has not matched an event")]
    NotCaptured(Cow<'static, str>),

    #[error("Connection to {address} failed with status {status:#04x}")]
    ConnectionFailed { address: Address, status: u8 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Malformed packet: {0}")]
    MalformedPacket(Cow<'static, str>),

    #[error("Unsupported command opcode {0:#06x}")]
    UnsupportedCommand(u16),

    #[error("Unknown connection handle {0:#05x}")]
    UnknownHandle(u16),

    #[error("Address {0} is already attached")]
    DuplicateAddress(Address),

    #[error("External error: {0}")]
    External(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn external(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::External(Arc::new(e))
    }

    pub(crate) fn malformed(reason: impl Into<Cow<'static, str>>) -> Self {
        Error::MalformedPacket(reason.into())
    }

    /// Whether this error is a deadline expiry rather than a sequencing
    /// or transport problem.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::EmitsTimeout { .. })
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (AlreadyPending(a), AlreadyPending(b)) => a == b,
            (NotPending(a), NotPending(b)) => a == b,
            (StreamClosed(a), StreamClosed(b)) => a == b,
            (SourceEnded(a), SourceEnded(b)) => a == b,
            (
                EmitsTimeout {
                    stream: s1,
                    timeout: t1,
                    mismatch: m1,
                },
                EmitsTimeout {
                    stream: s2,
                    timeout: t2,
                    mismatch: m2,
                },
            ) => s1 == s2 && t1 == t2 && m1 == m2,
            (
                EndedBeforeMatch {
                    stream: s1,
                    mismatch: m1,
                },
                EndedBeforeMatch {
                    stream: s2,
                    mismatch: m2,
                },
            ) => s1 == s2 && m1 == m2,
            (
                UnexpectedEvent {
                    stream: s1,
                    predicate: p1,
                    event: e1,
                },
                UnexpectedEvent {
                    stream: s2,
                    predicate: p2,
                    event: e2,
                },
            ) => s1 == s2 && p1 == p2 && e1 == e2,
            (NotCaptured(a), NotCaptured(b)) => a == b,
            (
                ConnectionFailed {
                    address: a1,
                    status: s1,
                },
                ConnectionFailed {
                    address: a2,
                    status: s2,
                },
            ) => a1 == a2 && s1 == s2,
            (InvalidAddress(a), InvalidAddress(b)) => a == b,
            (MalformedPacket(a), MalformedPacket(b)) => a == b,
            (UnsupportedCommand(a), UnsupportedCommand(b)) => a == b,
            (UnknownHandle(a), UnknownHandle(b)) => a == b,
            (DuplicateAddress(a), DuplicateAddress(b)) => a == b,
            (External(a), External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Error {}

/// Diagnostics attached to a failed `emits` assertion.
///
/// `unmatched` holds the descriptions of predicates that were still waiting
/// for an event; `discarded` holds the debug rendering of every event that
/// was consumed without satisfying the current predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mismatch {
    pub unmatched: Vec<String>,
    pub discarded: Vec<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unmatched [{}]", self.unmatched.join(", "))?;
        if self.discarded.is_empty() {
            return write!(f, ", no events observed");
        }
        write!(
            f,
            ", discarded {} events [{}]",
            self.discarded.len(),
            self.discarded.join(", ")
        )
    }
}
