/// Errors that can occur in the transport layer.
///
/// Per-connection read/write failures are not listed here: they surface
/// as plain `std::io::Error`s from [`Connection`](crate::Connection) and
/// are the session's business.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The listener could not report its local address.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
}
