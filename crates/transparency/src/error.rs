use thiserror::Error;
use veritree_storage::StoreError;

/// Errors surfaced by the tree engines.
///
/// The engines never retry: storage failures propagate verbatim and a cache
/// miss on a read path means the backing store lost data it was supposed to
/// hold.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A frozen node hash expected in cache or store was absent.
    #[error("missing cached digest for position {0}")]
    CacheMiss(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The tree was closed; no further operations are served.
    #[error("tree has been closed")]
    Closed,
}
