use crate::rank::HostId;

/// Errors surfaced by the ranking library.
///
/// I/O edges (config, snapshot, server) use `anyhow` instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankError {
    /// A write accessor was called for a host that has no record yet.
    #[error("unknown host: {0}")]
    UnknownHost(HostId),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unknown crawl session: {0}")]
    UnknownSession(u64),

    /// The session already reached its page limit or was marked done.
    #[error("crawl session {0} is closed")]
    SessionClosed(u64),
}

pub type RankResult<T> = Result<T, RankError>;
