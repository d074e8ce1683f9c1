use thiserror::Error;

/// Why an inbound message produced no device update.
///
/// None of these are failures: multicast traffic is best-effort and most of
/// it is irrelevant to the scanner, so every variant is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Discard {
    #[error("message is a query, not a response")]
    NotAResponse,

    #[error("scanner is stopped")]
    ScannerStopped,

    #[error("no attribute matches the content filter")]
    FilteredOut,

    #[error("malformed record {name}: {reason}")]
    Malformed { name: String, reason: &'static str },

    #[error("no record matches the service filter")]
    NoMatchingService,

    #[error("missing {0}")]
    IncompleteIdentity(&'static str),

    #[error("announcement for unknown device {0}")]
    UnknownIdentity(String),
}
