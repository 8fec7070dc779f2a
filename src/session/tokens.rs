use std::fmt;

/// Access/refresh token pair. Both halves are only ever replaced together.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl From<crate::models::AuthTokens> for TokenPair {
    fn from(tokens: crate::models::AuthTokens) -> Self {
        Self::new(tokens.access_token, tokens.refresh_token)
    }
}

// Tokens must never end up in logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}…({} chars)", prefix, token.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let pair = TokenPair::new("eyJhbGciOiJIUzI1NiJ9.secret".into(), "refresh-secret".into());
        let out = format!("{:?}", pair);
        assert!(!out.contains("secret"));
        assert!(out.contains("eyJh"));
    }

    #[test]
    fn bearer_header() {
        let pair = TokenPair::new("abc".into(), "def".into());
        assert_eq!(pair.bearer(), "Bearer abc");
    }
}
