//! Request authentication context

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

/// Identity attached to a request by the auth middleware.
///
/// `id` is `None` when authentication is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// Return the id of the secret matching `token`.
///
/// Every configured secret is compared in constant time so the response time
/// does not reveal which entry (or how much of it) matched.
pub fn match_api_secret_id<'a>(token: &str, secrets: &'a [AuthApiSecret]) -> Option<&'a str> {
    let mut matched = None;
    for entry in secrets {
        let equal: bool = token.as_bytes().ct_eq(entry.secret.as_bytes()).into();
        if equal && matched.is_none() {
            matched = Some(entry.id.as_str());
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> Vec<AuthApiSecret> {
        vec![
            AuthApiSecret {
                id: "carrier".to_string(),
                secret: "alpha".to_string(),
            },
            AuthApiSecret {
                id: "ops".to_string(),
                secret: "beta".to_string(),
            },
        ]
    }

    #[test]
    fn test_match_api_secret_id() {
        let secrets = secrets();
        assert_eq!(match_api_secret_id("alpha", &secrets), Some("carrier"));
        assert_eq!(match_api_secret_id("beta", &secrets), Some("ops"));
        assert_eq!(match_api_secret_id("alph", &secrets), None);
        assert_eq!(match_api_secret_id("", &secrets), None);
        assert_eq!(match_api_secret_id("alpha", &[]), None);
    }

    #[test]
    fn test_auth_constructors() {
        assert!(!Auth::empty().is_authenticated());
        assert_eq!(Auth::new("carrier").id.as_deref(), Some("carrier"));
    }
}
