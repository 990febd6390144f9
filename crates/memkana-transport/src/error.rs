/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection with a status other than
    /// normal closure or going away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The peer dropped the socket without a closing handshake.
    #[error("connection reset without closing handshake")]
    AbnormalClosure,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer connected but its upgrade request was invalid.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The peer connected but never completed the upgrade.
    #[error("handshake not completed within {0:?}")]
    HandshakeTimeout(std::time::Duration),
}

impl TransportError {
    /// Returns `true` for the ways a browser tab routinely goes away:
    /// navigation, closing the tab, or losing the network.
    ///
    /// These end the session like any other error but are not worth
    /// logging at error level.
    pub fn is_expected_close(&self) -> bool {
        matches!(self, Self::AbnormalClosure)
    }
}
