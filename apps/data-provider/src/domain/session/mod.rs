//! Broker Session Credentials
//!
//! Secrets used to authenticate the broker session. Both types redact their
//! secrets from `Debug` output.

use std::path::{Path, PathBuf};

/// API key pair used to log in to the broker.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key,
            secret_key,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the secret key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Client certificate activated after login.
#[derive(Clone)]
pub struct CaCertificate {
    path: PathBuf,
    password: String,
}

impl CaCertificate {
    /// Create a certificate reference.
    #[must_use]
    pub const fn new(path: PathBuf, password: String) -> Self {
        Self { path, password }
    }

    /// Only a path and password that are both set describe a certificate.
    #[must_use]
    pub fn from_parts(path: Option<String>, password: Option<String>) -> Option<Self> {
        match (path, password) {
            (Some(path), Some(password)) if !path.is_empty() && !password.is_empty() => {
                Some(Self::new(PathBuf::from(path), password))
            }
            _ => None,
        }
    }

    /// Path to the certificate file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Certificate password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for CaCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaCertificate")
            .field("path", &self.path)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
