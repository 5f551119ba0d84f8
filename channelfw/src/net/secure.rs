use std::fmt;

/// Session details of a protected connection, supplied by whatever security
/// layer sits on top of the channel.
///
/// A [`ConnectionContext`](super::ConnectionContext) holds at most one,
/// attached once through
/// [`set_secure_session`](super::ConnectionContext::set_secure_session).
pub trait SecureSessionContext: Send + Sync + fmt::Debug {
    /// Negotiated protocol name, e.g. `TLSv1.3`.
    fn protocol(&self) -> &str;

    /// Negotiated cipher suite.
    fn cipher_suite(&self) -> &str;

    /// DER encoded peer certificate chain, leaf first.
    fn peer_certificates(&self) -> Vec<Vec<u8>> {
        Vec::new()
    }

    /// Whether the local side required a client certificate.
    fn need_client_auth(&self) -> bool {
        false
    }

    /// Whether the local side asked for an optional client certificate.
    fn want_client_auth(&self) -> bool {
        false
    }
}
