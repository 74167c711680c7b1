//! Per-request session context.
//!
//! A [`Session`] is built for each CLI invocation or HTTP request from the
//! credentials the caller presents. There is no global login flag, no token,
//! and nothing is persisted.
//!
//! The [`AccessPolicy`] comes from two environment variables named in the
//! `[auth]` config section. When both are set, callers must present a
//! matching username and password; when either is unset the policy is open
//! and every caller is `anonymous`.

use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

pub const ANONYMOUS: &str = "anonymous";
pub const LOGIN_REQUIRED: &str = "Please log in to continue.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    LoggedOut,
    LoggedIn { username: String },
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Session::LoggedIn { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Session::LoggedIn { username } => Some(username),
            Session::LoggedOut => None,
        }
    }
}

/// The configured username and password.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check a login attempt. Both fields are compared without
    /// short-circuiting on the first mismatched byte.
    pub fn login(&self, username: &str, password: &str) -> Session {
        let user_ok = digest_eq(&self.username, username);
        let pass_ok = digest_eq(&self.password, password);
        if user_ok & pass_ok {
            Session::LoggedIn {
                username: username.to_string(),
            }
        } else {
            Session::LoggedOut
        }
    }
}

fn digest_eq(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());
    da.iter().zip(db.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Who may use the assistant.
#[derive(Debug, Clone)]
pub enum AccessPolicy {
    /// No credentials configured.
    Open,
    Password(Credentials),
}

impl AccessPolicy {
    pub fn from_env(config: &AuthConfig) -> Self {
        let username = std::env::var(&config.username_env).ok();
        let password = std::env::var(&config.password_env).ok();
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => {
                AccessPolicy::Password(Credentials::new(u, p))
            }
            _ => AccessPolicy::Open,
        }
    }

    /// Build the session for a caller presenting optional credentials.
    pub fn authenticate(&self, presented: Option<(&str, &str)>) -> Session {
        match self {
            AccessPolicy::Open => Session::LoggedIn {
                username: ANONYMOUS.to_string(),
            },
            AccessPolicy::Password(credentials) => match presented {
                Some((username, password)) => credentials.login(username, password),
                None => Session::LoggedOut,
            },
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, AccessPolicy::Password(_))
    }
}
