//! Run Credentials
//!
//! Signed, time-bounded tokens handed out at issuance (HS256 JWT). A
//! credential binds a run id to the seed, engine version and config digest
//! the run was issued with; the verifier checks that binding before it
//! touches the submission.
//!
//! Expiry is carried in the token but not enforced here: the verifier
//! compares `exp` against its own clock so the check can be driven by a
//! test clock.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims carried by a run credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunClaims {
    /// Subject: the run id
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiry (Unix seconds)
    pub exp: u64,
    /// Run seed
    pub seed: i32,
    /// Engine version the run was issued for
    pub engine_version: u32,
    /// Hex SHA-256 of the config snapshot
    pub config_digest: String,
}

impl RunClaims {
    /// Parse the run id out of the subject claim.
    pub fn run_id(&self) -> Result<Uuid, CredentialError> {
        Uuid::parse_str(&self.sub).map_err(|_| CredentialError::MissingClaim("sub".into()))
    }
}

/// Credential errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No signing secret configured.
    #[error("credential secret not configured")]
    NotConfigured,
    /// Token format is invalid.
    #[error("invalid credential format")]
    InvalidFormat,
    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Issuer claim doesn't match.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Required claim is missing or malformed.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Claims do not match the stored run.
    #[error("credential does not match run")]
    RunMismatch,
    /// Encoding or decoding failure.
    #[error("credential codec error: {0}")]
    Codec(String),
}

/// Signs and checks run credentials with a shared secret.
#[derive(Clone)]
pub struct CredentialSigner {
    issuer: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl CredentialSigner {
    /// Create a signer. The secret must be non-empty.
    pub fn new(secret: &str, issuer: impl Into<String>) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::NotConfigured);
        }
        Ok(Self {
            issuer: issuer.into(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Issuer stamped into every credential.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a set of claims.
    pub fn sign(&self, claims: &RunClaims) -> Result<String, CredentialError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CredentialError::Codec(e.to_string()))
    }

    /// Check signature and issuer, and return the claims.
    pub fn validate(&self, token: &str) -> Result<RunClaims, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = std::collections::HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);

        let claims: RunClaims = decode(token, &self.decoding, &validation)
            .map_err(map_jwt_error)?
            .claims;

        if claims.sub.is_empty() {
            return Err(CredentialError::MissingClaim("sub".into()));
        }
        if claims.config_digest.is_empty() {
            return Err(CredentialError::MissingClaim("config_digest".into()));
        }
        Ok(claims)
    }
}

/// Map JWT library errors to our error type.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> CredentialError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
        ErrorKind::InvalidIssuer => CredentialError::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) => CredentialError::MissingClaim(claim.clone()),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            CredentialError::InvalidFormat
        }
        _ => CredentialError::Codec(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
