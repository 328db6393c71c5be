//! Stateless HS256 session tokens.
//!
//! Compact three-segment JWT serialization (`header.payload.signature`,
//! base64url without padding). The payload carries exactly the two
//! [`SessionClaims`]; there is no expiry claim, so a token stays valid for as
//! long as the signing key does.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::secret::SecretKey;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// JWT header (always HS256).
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Identity carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("signing secret is missing or empty")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported token algorithm: {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("token signature mismatch")]
    BadSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    Signing,
    Malformed,
    UnsupportedAlgorithm,
    BadSignature,
}

impl TokenError {
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::MissingSecret | Self::Signing(_) => TokenErrorKind::Signing,
            Self::Malformed(_) => TokenErrorKind::Malformed,
            Self::UnsupportedAlgorithm(_) => TokenErrorKind::UnsupportedAlgorithm,
            Self::BadSignature => TokenErrorKind::BadSignature,
        }
    }
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Signs and verifies session tokens with one injected [`SecretKey`].
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: SecretKey,
}

impl TokenIssuer {
    pub fn new(secret: SecretKey) -> Self {
        Self { secret }
    }

    pub fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());
        let payload =
            serde_json::to_vec(claims).map_err(|e| TokenError::Signing(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature);

        Ok(format!("{signing_input}.{sig_b64}"))
    }

    /// Check the signature and return the embedded claims.
    ///
    /// Only `HS256` is accepted; `none` and every other algorithm are rejected
    /// before the signature is looked at.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments"));
        };

        let header: Header = decode_segment(header_b64, "invalid header")?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Malformed("invalid signature encoding"))?;
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        decode_segment(payload_b64, "invalid payload")
    }

    fn mac(&self, data: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose())
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(data);
        Ok(mac)
    }
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    what: &'static str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed(what))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed(what))
}
