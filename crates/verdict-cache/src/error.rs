use thiserror::Error;

/// The Error type for fact memoization.
///
/// Loader failures flow through shared futures, so the type is `Clone` and
/// carries the rendered loader error rather than the error value itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The loader for a cache entry failed.
    #[error("{0}")]
    Load(String),
    /// The loader task was cancelled before completing.
    #[error("cache loader task was cancelled")]
    Cancelled,
}
