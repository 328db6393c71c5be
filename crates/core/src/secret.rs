use std::fmt;
use std::sync::Arc;

use crate::token::TokenError;

/// Environment variable holding the token signing key.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Process-wide HMAC signing key.
///
/// Loaded once at startup and handed to [`crate::TokenIssuer`]. Cloning shares
/// the same allocation. `Debug` never prints the key.
#[derive(Clone)]
pub struct SecretKey(Arc<[u8]>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self(bytes.into()))
    }

    /// Read the key from `var`. Unset and empty are both `MissingSecret`.
    pub fn from_env(var: &str) -> Result<Self, TokenError> {
        Self::new(std::env::var(var).unwrap_or_default())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}
