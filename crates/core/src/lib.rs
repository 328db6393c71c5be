//! Credential primitives for the watcharr backend.
//!
//! Two independent pieces:
//! - [`credential`]: Argon2id password hashes in a self-describing text encoding
//! - [`token`]: HS256-signed, non-expiring session tokens
//!
//! Both are synchronous and hold no mutable state, so they can be called from
//! any number of threads at once. Hashing is deliberately slow (hundreds of
//! milliseconds at the default cost); async callers should move it off the
//! executor.

pub mod credential;
pub mod secret;
pub mod token;

pub use credential::{
    CostParameters, CredentialError, CredentialErrorKind, CredentialHasher, EncodedCredential,
};
pub use secret::SecretKey;
pub use token::{SessionClaims, TokenError, TokenErrorKind, TokenIssuer};
