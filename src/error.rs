//! Error types for mp4forge.

use crate::boxes::FourCC;
use std::io;
use thiserror::Error;

/// Result type for mp4forge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for parsing, writing and multiplexing.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying source or sink.
    #[error("io: {0}")]
    Io(io::Error),

    /// Fewer bytes were available than a declared size requires.
    #[error("truncated input: needed {needed} more bytes")]
    Truncated { needed: u64 },

    /// A box header declares a size smaller than the header itself.
    #[error("invalid box size {size} at offset {offset}")]
    InvalidSize { offset: u64, size: u64 },

    /// Size field `0` ("extends to end of stream") on a nested box.
    #[error("box at offset {offset} uses size 0 but is not a root box")]
    ZeroSizeNotAtRoot { offset: u64 },

    /// Children did not add up to the declared container content size.
    #[error("structural mismatch at offset {offset}: declared {declared} content bytes, children consumed {consumed}")]
    StructuralMismatch { offset: u64, declared: u64, consumed: u64 },

    /// A child declares more bytes than remain in its parent.
    #[error("child at offset {offset} declares {child_size} bytes but only {remaining} remain in parent")]
    ChildOverrun { offset: u64, remaining: u64, child_size: u64 },

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Computed box size disagrees with bytes actually written.
    #[error("box {typ} reported size {expected} but wrote {written} bytes")]
    SizeMismatch { typ: FourCC, expected: u64, written: u64 },

    #[error("unsupported media kind: handler {0}")]
    UnsupportedMediaKind(FourCC),

    /// Derived chunk sizes do not sum to the track's sample count.
    #[error("chunking inconsistency in track {track_id}: expected {expected} samples, chunks hold {actual}")]
    ChunkingInconsistency { track_id: u32, expected: u64, actual: i64 },

    #[error("track {track_id} has no samples")]
    EmptyTrack { track_id: u32 },

    #[error("movie has no tracks")]
    EmptyMovie,

    #[error("track {track_id} is inconsistent: {reason}")]
    InconsistentTrack { track_id: u32, reason: String },

    #[error("tracks cannot be combined: {0}")]
    IncompatibleTracks(String),

    #[error("missing required box: {0}")]
    MissingBox(&'static str),

    #[error("invalid box tree operation: {0}")]
    InvalidTree(String),

    /// Positional context added while unwinding out of a container.
    #[error("in {path} at offset {offset}: {source}")]
    Context {
        path: String,
        offset: u64,
        #[source]
        source: Box<Error>,
    },
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated { needed: 1 }
        } else {
            Error::Io(e)
        }
    }
}

impl Error {
    /// Wrap `self` with the box type and offset it was raised under.
    ///
    /// Nested calls extend the existing path instead of stacking layers,
    /// so the final message reads `moov/trak/mdia` from the outside in.
    pub fn within(self, typ: FourCC, offset: u64) -> Self {
        match self {
            Error::Context { path, offset: inner, source } => Error::Context {
                path: format!("{}/{}", typ, path),
                offset: inner,
                source,
            },
            other => Error::Context {
                path: typ.to_string(),
                offset,
                source: Box::new(other),
            },
        }
    }

    /// The error with any positional context stripped.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.root_cause(), Error::Truncated { .. })
    }

    /// Children and parent sizes do not reconcile.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::StructuralMismatch { .. } | Error::ChildOverrun { .. }
        )
    }

    pub(crate) fn tree(msg: impl Into<String>) -> Self {
        Error::InvalidTree(msg.into())
    }
}
