//! Session credentials
//!
//! Clients authenticate with an opaque token issued by the web front end
//! after a user/password login. The hook only compares it against the one
//! the store holds for that user.

use std::fmt;

/// A stored credential
#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Compare without stopping at the first differing byte
    pub fn matches(&self, presented: &str) -> bool {
        let stored = self.token.as_bytes();
        let presented = presented.as_bytes();

        let diff = stored
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (s, p)| acc | (s ^ p));

        stored.len() == presented.len() && diff == 0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_matches() {
        let cred = Credential::new("ikgdfigdfhihdsih");
        assert!(cred.matches("ikgdfigdfhihdsih"));
        assert!(!cred.matches("ikgdfigdfhihdsiX"));
        assert!(!cred.matches("ikgdfigdfhihdsih-extra"));
        assert!(!cred.matches(""));
    }

    #[test]
    fn test_empty_credential() {
        let cred = Credential::new("");
        assert!(cred.matches(""));
        assert!(!cred.matches("x"));
    }

    #[test]
    fn test_debug_redacted() {
        let cred = Credential::new("powerfultoken");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("powerfultoken"));
        assert!(debug.contains("REDACTED"));
    }
}
