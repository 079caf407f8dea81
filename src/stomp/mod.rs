//! STOMP wire protocol: frames and the framing codec.
//!
//! The simulation gateway exposes its telemetry as STOMP destinations.
//! Only the subset the feed client needs is modelled.

pub mod codec;
pub mod frame;

pub use codec::{DEFAULT_MAX_FRAME_BYTES, StompCodec, StompItem};
pub use frame::{Frame, StompCommand};

/// Wire-level STOMP errors.
#[derive(Debug, thiserror::Error)]
pub enum StompError {
    /// Socket read or write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame command is not part of the supported subset.
    #[error("unknown STOMP command: {0}")]
    UnknownCommand(String),

    /// The frame violates the STOMP grammar.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame exceeds the configured size limit.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// Configured limit.
        limit: usize,
    },
}
