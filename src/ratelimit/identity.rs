//! Client identity resolution for rate limiting.

use std::fmt;

/// The identity a rate limit quota is attributed to.
///
/// Two requests from the same address with different credentials must not
/// share a quota, so resolution prefers the strongest available signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    /// An authenticated user id.
    User(String),
    /// An API key presented in a header.
    ApiKey(String),
    /// The `X-Forwarded-For` header value.
    ForwardedFor(String),
    /// The raw peer address.
    Peer(String),
}

impl ClientIdentity {
    /// Resolve an identity from the available request attributes.
    ///
    /// Priority order, first match wins: authenticated user id, API key
    /// header, `X-Forwarded-For` header, raw peer address. Empty strings are
    /// treated as absent.
    pub fn resolve(
        user_id: Option<&str>,
        api_key: Option<&str>,
        forwarded_for: Option<&str>,
        peer_addr: &str,
    ) -> Self {
        if let Some(user) = user_id.filter(|v| !v.is_empty()) {
            return ClientIdentity::User(user.to_string());
        }
        if let Some(key) = api_key.filter(|v| !v.is_empty()) {
            return ClientIdentity::ApiKey(key.to_string());
        }
        if let Some(addr) = forwarded_for.filter(|v| !v.is_empty()) {
            return ClientIdentity::ForwardedFor(addr.to_string());
        }
        ClientIdentity::Peer(peer_addr.to_string())
    }

    /// The identity's contribution to a composite rate limit key.
    pub fn as_key(&self) -> String {
        match self {
            ClientIdentity::User(id) => format!("user:{}", id),
            ClientIdentity::ApiKey(key) => format!("apikey:{}", key),
            ClientIdentity::ForwardedFor(addr) => addr.clone(),
            ClientIdentity::Peer(addr) => addr.clone(),
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_wins_over_everything() {
        let identity = ClientIdentity::resolve(
            Some("42"),
            Some("secret"),
            Some("10.0.0.1"),
            "1.2.3.4",
        );
        assert_eq!(identity, ClientIdentity::User("42".to_string()));
        assert_eq!(identity.as_key(), "user:42");
    }

    #[test]
    fn test_api_key_wins_over_addresses() {
        let identity = ClientIdentity::resolve(None, Some("secret"), Some("10.0.0.1"), "1.2.3.4");
        assert_eq!(identity.as_key(), "apikey:secret");
    }

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let identity = ClientIdentity::resolve(None, None, Some("10.0.0.1"), "1.2.3.4");
        assert_eq!(identity.as_key(), "10.0.0.1");
    }

    #[test]
    fn test_peer_address_is_the_fallback() {
        let identity = ClientIdentity::resolve(None, None, None, "1.2.3.4");
        assert_eq!(identity, ClientIdentity::Peer("1.2.3.4".to_string()));
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let identity = ClientIdentity::resolve(Some(""), Some(""), Some(""), "1.2.3.4");
        assert_eq!(identity.as_key(), "1.2.3.4");
    }
}
