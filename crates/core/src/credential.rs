//! Self-describing Argon2id password hashes.
//!
//! Encoded form (persisted, must stay bit-exact):
//!
//! ```text
//! $argon2id$v=19$m=<kib>,t=<iterations>,p=<parallelism>$<salt>$<key>
//! ```
//!
//! Salt and key are unpadded standard base64. Their lengths are not stored;
//! verification recovers them from the decoded byte counts, and always uses the
//! cost parameters embedded in the encoding rather than the current defaults.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use serde::{Deserialize, Serialize};

/// Scheme identifier written in the first field.
pub const SCHEME: &str = "argon2id";

/// Argon2 version this module produces and accepts (v1.3).
pub const VERSION: u32 = 0x13;

const DELIMITER: char = '$';
const FIELD_COUNT: usize = 6;

/// Lane count is a single byte in the stored format.
pub const MAX_PARALLELISM: u32 = u8::MAX as u32;

// ── Cost parameters ─────────────────────────────────────────────────────────

/// Argon2id cost settings.
///
/// `memory_kib` is in KiB, so the default of `64 * 1024` is 64 MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostParameters {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_len: u32,
    pub key_len: u32,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            key_len: 32,
        }
    }
}

impl CostParameters {
    fn kdf(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.key_len as usize),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Why a stored encoding could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEncoding {
    #[error("expected 6 `$`-separated fields, found {0}")]
    FieldCount(usize),
    #[error("unsupported scheme identifier: {0:?}")]
    Scheme(String),
    #[error("invalid version field: {0:?}")]
    Version(String),
    #[error("invalid cost parameters: {0}")]
    Parameters(String),
    #[error("invalid base64 in {0} field")]
    Base64(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("random source unavailable: {0}")]
    RandomSource(#[source] getrandom::Error),
    #[error("malformed credential encoding: {0}")]
    Malformed(#[from] MalformedEncoding),
    #[error("incompatible argon2 version {found} (expected {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("invalid cost parameters: {0}")]
    InvalidParameters(String),
}

/// Coarse classification of [`CredentialError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialErrorKind {
    RandomSource,
    Malformed,
    IncompatibleVersion,
    InvalidParameters,
}

impl CredentialError {
    pub fn kind(&self) -> CredentialErrorKind {
        match self {
            Self::RandomSource(_) => CredentialErrorKind::RandomSource,
            Self::Malformed(_) => CredentialErrorKind::Malformed,
            Self::IncompatibleVersion { .. } => CredentialErrorKind::IncompatibleVersion,
            Self::InvalidParameters(_) => CredentialErrorKind::InvalidParameters,
        }
    }
}

// ── Encoded credential ──────────────────────────────────────────────────────

/// A stored password hash in its text form.
///
/// Construction does not validate; parsing happens on [`EncodedCredential::decode`]
/// so that a bad stored value surfaces as a decode error at verification time.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedCredential(String);

impl EncodedCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Split the encoding into version, cost parameters, salt and key.
    pub fn decode(&self) -> Result<DecodedCredential, CredentialError> {
        let fields: Vec<&str> = self.0.split(DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(MalformedEncoding::FieldCount(fields.len()).into());
        }
        if !fields[0].is_empty() || fields[1] != SCHEME {
            return Err(MalformedEncoding::Scheme(fields[1].to_string()).into());
        }

        let version = parse_version(fields[2])?;
        if version != VERSION {
            return Err(CredentialError::IncompatibleVersion {
                found: version,
                expected: VERSION,
            });
        }

        let (memory_kib, iterations, parallelism) = parse_costs(fields[3])
            .ok_or_else(|| MalformedEncoding::Parameters(fields[3].to_string()))?;

        let salt = STANDARD_NO_PAD
            .decode(fields[4])
            .map_err(|_| MalformedEncoding::Base64("salt"))?;
        let key = STANDARD_NO_PAD
            .decode(fields[5])
            .map_err(|_| MalformedEncoding::Base64("key"))?;

        let params = CostParameters {
            memory_kib,
            iterations,
            parallelism,
            salt_len: byte_len(&salt, "salt")?,
            key_len: byte_len(&key, "key")?,
        };

        Ok(DecodedCredential {
            version,
            params,
            salt,
            key,
        })
    }
}

impl fmt::Display for EncodedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Keep hashes out of logs.
impl fmt::Debug for EncodedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodedCredential(..)")
    }
}

impl From<String> for EncodedCredential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EncodedCredential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Parsed fields of an [`EncodedCredential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCredential {
    pub version: u32,
    pub params: CostParameters,
    pub salt: Vec<u8>,
    pub key: Vec<u8>,
}

fn parse_version(field: &str) -> Result<u32, MalformedEncoding> {
    field
        .strip_prefix("v=")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| MalformedEncoding::Version(field.to_string()))
}

/// Parse the literal `m=<int>,t=<int>,p=<int>` field.
fn parse_costs(field: &str) -> Option<(u32, u32, u32)> {
    let mut parts = field.split(',');
    let m = named_u32(parts.next()?, "m")?;
    let t = named_u32(parts.next()?, "t")?;
    let p = named_u32(parts.next()?, "p")?;
    if parts.next().is_some() || p > MAX_PARALLELISM {
        return None;
    }
    Some((m, t, p))
}

fn named_u32(part: &str, name: &str) -> Option<u32> {
    let digits = part.strip_prefix(name)?.strip_prefix('=')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn byte_len(bytes: &[u8], field: &'static str) -> Result<u32, MalformedEncoding> {
    u32::try_from(bytes.len()).map_err(|_| MalformedEncoding::Base64(field))
}

// ── Encode / verify ─────────────────────────────────────────────────────────

/// Hash `secret` with a fresh random salt of `params.salt_len` bytes.
pub fn encode(secret: &str, params: &CostParameters) -> Result<EncodedCredential, CredentialError> {
    let mut salt = vec![0u8; params.salt_len as usize];
    getrandom::getrandom(&mut salt).map_err(CredentialError::RandomSource)?;
    encode_with_salt(secret, &salt, params)
}

/// Hash `secret` with a caller-supplied salt. Deterministic.
///
/// The salt length written to the encoding is `salt.len()`; `params.salt_len`
/// is ignored here.
pub fn encode_with_salt(
    secret: &str,
    salt: &[u8],
    params: &CostParameters,
) -> Result<EncodedCredential, CredentialError> {
    if params.parallelism > MAX_PARALLELISM {
        return Err(CredentialError::InvalidParameters(format!(
            "parallelism {} exceeds {MAX_PARALLELISM}",
            params.parallelism
        )));
    }
    let key = derive_key(secret, salt, params)
        .map_err(|e| CredentialError::InvalidParameters(e.to_string()))?;

    Ok(EncodedCredential(format!(
        "{DELIMITER}{SCHEME}{DELIMITER}v={VERSION}{DELIMITER}m={},t={},p={}{DELIMITER}{}{DELIMITER}{}",
        params.memory_kib,
        params.iterations,
        params.parallelism,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(&key),
    )))
}

/// Check `secret` against a stored encoding.
///
/// `Ok(false)` means the password is wrong. Every parse failure is an `Err`,
/// so a corrupt stored hash is never confused with a mismatch.
pub fn verify(secret: &str, encoded: &EncodedCredential) -> Result<bool, CredentialError> {
    let decoded = encoded.decode()?;
    let candidate = derive_key(secret, &decoded.salt, &decoded.params)
        .map_err(|e| MalformedEncoding::Parameters(e.to_string()))?;
    Ok(fixed_time_eq(&candidate, &decoded.key))
}

fn derive_key(
    secret: &str,
    salt: &[u8],
    params: &CostParameters,
) -> Result<Vec<u8>, argon2::Error> {
    let mut key = vec![0u8; params.key_len as usize];
    params
        .kdf()?
        .hash_password_into(secret.as_bytes(), salt, &mut key)?;
    Ok(key)
}

/// Equality whose running time does not depend on where the inputs differ.
///
/// Inputs of different length compare unequal.
pub fn fixed_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Hasher ──────────────────────────────────────────────────────────────────

/// Encode policy for new credentials.
///
/// The configured parameters apply only to [`CredentialHasher::hash`];
/// verification always reads them back from the stored encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialHasher {
    params: CostParameters,
}

impl CredentialHasher {
    pub fn new(params: CostParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CostParameters {
        &self.params
    }

    pub fn hash(&self, secret: &str) -> Result<EncodedCredential, CredentialError> {
        encode(secret, &self.params)
    }

    pub fn verify(&self, secret: &str, encoded: &EncodedCredential) -> Result<bool, CredentialError> {
        verify(secret, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cheap() -> CostParameters {
        CostParameters {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
            salt_len: 16,
            key_len: 32,
        }
    }

    fn replace_field(encoded: &EncodedCredential, index: usize, value: &str) -> EncodedCredential {
        let mut fields: Vec<&str> = encoded.as_str().split('$').collect();
        fields[index] = value;
        EncodedCredential::from(fields.join("$"))
    }

    #[test]
    fn default_parameters_round_trip() {
        let params = CostParameters {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            key_len: 32,
        };
        assert_eq!(params, CostParameters::default());

        let encoded = encode("correct-password", &params).expect("encode");
        assert!(encoded.as_str().starts_with("$argon2id$v=19$m=65536,t=3,p=2$"));
        assert!(verify("correct-password", &encoded).unwrap());
        assert!(!verify("wrong-password", &encoded).unwrap());
    }

    #[test]
    fn encoding_layout() {
        let encoded = encode("hunter2", &cheap()).unwrap();
        let fields: Vec<&str> = encoded.as_str().split('$').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[0], "");
        assert_eq!(fields[1], "argon2id");
        assert_eq!(fields[2], "v=19");
        assert_eq!(fields[3], "m=64,t=1,p=1");
        assert!(!fields[4].ends_with('='));
        assert!(!fields[5].ends_with('='));

        let decoded = encoded.decode().unwrap();
        assert_eq!(decoded.salt.len(), 16);
        assert_eq!(decoded.key.len(), 32);
        assert_eq!(decoded.params, cheap());
    }

    #[test]
    fn salt_is_fresh_per_encode() {
        let a = encode("same", &cheap()).unwrap();
        let b = encode("same", &cheap()).unwrap();
        assert_ne!(a, b);
        assert!(verify("same", &a).unwrap());
        assert!(verify("same", &b).unwrap());
    }

    #[test]
    fn derivation_is_deterministic_for_fixed_salt() {
        let salt = [7u8; 16];
        let a = encode_with_salt("password", &salt, &cheap()).unwrap();
        let b = encode_with_salt("password", &salt, &cheap()).unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(a.as_str().contains("$BwcHBwcHBwcHBwcHBwcHBw$"));
    }

    // Argon2id v1.3 reference vectors for password "password", salt "somesalt".
    const REFERENCE_M256_T2_P1: &str =
        "$argon2id$v=19$m=256,t=2,p=1$c29tZXNhbHQ$nf65EOgLrQMR/uIPnA4rEsF5h7TKyQwu9U1bMCHGi/4";
    const REFERENCE_M256_T2_P2: &str =
        "$argon2id$v=19$m=256,t=2,p=2$c29tZXNhbHQ$bQk8UB/VmZZF4Oo79iDXuL5/0ttZwg2f/5U52iv1cDc";

    #[test]
    fn verifies_reference_hashes() {
        for reference in [REFERENCE_M256_T2_P1, REFERENCE_M256_T2_P2] {
            let stored = EncodedCredential::from(reference);
            assert!(verify("password", &stored).unwrap(), "{reference}");
            assert!(!verify("Password", &stored).unwrap(), "{reference}");
        }
    }

    #[test]
    fn encode_with_salt_matches_reference_output() {
        let params = CostParameters {
            memory_kib: 256,
            iterations: 2,
            parallelism: 1,
            salt_len: 8,
            key_len: 32,
        };
        let encoded = encode_with_salt("password", b"somesalt", &params).unwrap();
        assert_eq!(encoded.as_str(), REFERENCE_M256_T2_P1);

        // t != p
        let params = CostParameters {
            memory_kib: 256,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            key_len: 32,
        };
        let encoded = encode_with_salt("hunter2", &[7u8; 16], &params).unwrap();
        assert_eq!(
            encoded.as_str(),
            "$argon2id$v=19$m=256,t=3,p=2$BwcHBwcHBwcHBwcHBwcHBw$WLc9tXc1ZhPLKStz+DMY/U9QUAwa8chUMZqxqz0pack"
        );
    }

    #[test]
    fn flipping_any_key_byte_is_a_mismatch() {
        let encoded = encode("secret", &cheap()).unwrap();
        let decoded = encoded.decode().unwrap();
        for i in 0..decoded.key.len() {
            let mut key = decoded.key.clone();
            key[i] ^= 0x01;
            let tampered = replace_field(&encoded, 5, &STANDARD_NO_PAD.encode(&key));
            assert!(!verify("secret", &tampered).unwrap(), "byte {i}");
        }
    }

    #[test]
    fn shorter_stored_key_is_a_mismatch_not_an_error() {
        let encoded = encode("secret", &cheap()).unwrap();
        let key = encoded.decode().unwrap().key;
        let truncated = replace_field(&encoded, 5, &STANDARD_NO_PAD.encode(&key[..16]));
        assert!(!verify("secret", &truncated).unwrap());
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let encoded = encode("secret", &cheap()).unwrap();
        let five = encoded.as_str().rsplit_once('$').unwrap().0.to_string();
        let seven = format!("{}$extra", encoded.as_str());
        for bad in [five, seven] {
            let err = verify("secret", &EncodedCredential::from(bad)).unwrap_err();
            assert_eq!(err.kind(), CredentialErrorKind::Malformed);
        }
        let err = verify("secret", &EncodedCredential::from("")).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Malformed(MalformedEncoding::FieldCount(1))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let encoded = encode("secret", &cheap()).unwrap();
        let bumped = replace_field(&encoded, 2, "v=20");
        let err = verify("secret", &bumped).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::IncompatibleVersion {
                found: 20,
                expected: 19
            }
        ));
        assert_eq!(err.kind(), CredentialErrorKind::IncompatibleVersion);

        let garbled = replace_field(&encoded, 2, "version=19");
        assert!(matches!(
            verify("secret", &garbled).unwrap_err(),
            CredentialError::Malformed(MalformedEncoding::Version(_))
        ));
    }

    #[test]
    fn other_schemes_are_rejected() {
        let encoded = encode("secret", &cheap()).unwrap();
        let argon2i = replace_field(&encoded, 1, "argon2i");
        assert!(matches!(
            verify("secret", &argon2i).unwrap_err(),
            CredentialError::Malformed(MalformedEncoding::Scheme(s)) if s == "argon2i"
        ));
    }

    #[test]
    fn malformed_cost_parameters_are_rejected() {
        let encoded = encode("secret", &cheap()).unwrap();
        for bad in ["m=64,t=1", "m=64,t=1,p=1,x=2", "t=1,m=64,p=1", "m=64,t=one,p=1", "m=,t=1,p=1"] {
            let err = verify("secret", &replace_field(&encoded, 3, bad)).unwrap_err();
            assert!(
                matches!(err, CredentialError::Malformed(MalformedEncoding::Parameters(_))),
                "{bad}: {err}"
            );
        }
        // Lanes are stored as one byte.
        let err = verify("secret", &replace_field(&encoded, 3, "m=64,t=1,p=256")).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Malformed(MalformedEncoding::Parameters(field)) if field == "m=64,t=1,p=256"
        ));
        // Parses, but argon2 refuses zero lanes.
        let err = verify("secret", &replace_field(&encoded, 3, "m=64,t=1,p=0")).unwrap_err();
        assert_eq!(err.kind(), CredentialErrorKind::Malformed);
    }

    #[test]
    fn padded_or_invalid_base64_is_rejected() {
        let encoded = encode("secret", &cheap()).unwrap();
        let salt = encoded.as_str().split('$').nth(4).unwrap().to_string();
        let padded = replace_field(&encoded, 4, &format!("{salt}=="));
        assert!(matches!(
            verify("secret", &padded).unwrap_err(),
            CredentialError::Malformed(MalformedEncoding::Base64("salt"))
        ));

        let junk = replace_field(&encoded, 5, "not*base64");
        assert!(matches!(
            verify("secret", &junk).unwrap_err(),
            CredentialError::Malformed(MalformedEncoding::Base64("key"))
        ));
    }

    #[test]
    fn verification_ignores_current_defaults() {
        let old = CostParameters {
            memory_kib: 32,
            iterations: 2,
            parallelism: 1,
            salt_len: 8,
            key_len: 24,
        };
        let stored = encode("legacy", &old).unwrap();
        let hasher = CredentialHasher::new(cheap());
        assert!(hasher.verify("legacy", &stored).unwrap());
        assert!(!hasher.verify("legacy!", &stored).unwrap());

        let decoded = stored.decode().unwrap();
        assert_eq!(decoded.params, old);
    }

    #[test]
    fn unusable_encode_parameters_are_reported() {
        let params = CostParameters {
            parallelism: 0,
            ..cheap()
        };
        let err = encode("x", &params).unwrap_err();
        assert_eq!(err.kind(), CredentialErrorKind::InvalidParameters);

        let too_many_lanes = CostParameters {
            memory_kib: 8 * 256,
            parallelism: MAX_PARALLELISM + 1,
            ..cheap()
        };
        assert_eq!(
            encode("x", &too_many_lanes).unwrap_err().kind(),
            CredentialErrorKind::InvalidParameters
        );

        let short_salt = CostParameters {
            salt_len: 4,
            ..cheap()
        };
        assert_eq!(
            encode("x", &short_salt).unwrap_err().kind(),
            CredentialErrorKind::InvalidParameters
        );
    }

    #[test]
    fn fixed_time_eq_handles_lengths() {
        assert!(fixed_time_eq(b"", b""));
        assert!(fixed_time_eq(b"hello", b"hello"));
        assert!(!fixed_time_eq(b"hello", b"hellp"));
        assert!(!fixed_time_eq(b"short", b"longer"));
        assert!(!fixed_time_eq(b"abc", b""));
    }

    #[test]
    fn debug_hides_hash() {
        let encoded = encode("secret", &cheap()).unwrap();
        assert_eq!(format!("{encoded:?}"), "EncodedCredential(..)");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn any_secret_round_trips(secret in ".{0,64}") {
            let encoded = encode(&secret, &cheap()).unwrap();
            prop_assert!(verify(&secret, &encoded).unwrap());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn different_secrets_never_match(a in ".{0,32}", b in ".{0,32}") {
            prop_assume!(a != b);
            let encoded = encode(&a, &cheap()).unwrap();
            prop_assert!(!verify(&b, &encoded).unwrap());
        }
    }
}
