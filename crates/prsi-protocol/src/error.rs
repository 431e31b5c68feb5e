//! Error types for the protocol layer.
//!
//! Every variant here is a protocol violation: the server never answers
//! one with a soft error, it drops the connection that produced it.

/// Errors that can occur while framing or decoding client input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer does not start with the magic token after leading
    /// whitespace, so it can never become a valid frame.
    #[error("frame does not start with the protocol magic")]
    MalformedFrame,

    /// The frame body contains bytes that are not valid UTF-8 text.
    #[error("frame is not valid text")]
    NotText,

    /// A frame with no tokens between the magic and the delimiter.
    #[error("empty frame")]
    EmptyFrame,

    /// The first token is not a verb the server understands.
    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    /// The verb is known but was sent with the wrong number of arguments.
    #[error("{verb} expects {expected} argument(s), got {got}")]
    WrongArity {
        verb: String,
        expected: usize,
        got: usize,
    },

    /// An argument could not be parsed (bad room id, bad nickname...).
    #[error("invalid argument for {verb}: {value}")]
    InvalidArgument { verb: String, value: String },

    /// A card token that is not one of the 32 deck cards.
    #[error("invalid card token: {0}")]
    InvalidCard(String),
}
