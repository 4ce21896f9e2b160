//! Device authentication tokens
//!
//! The MQTT bridge authenticates a device by a JWT passed as the connection
//! password. The token carries the project id as its audience and is valid
//! for [`TOKEN_LIFETIME_MINUTES`] after issuance.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Validity window of a device token
pub const TOKEN_LIFETIME_MINUTES: i64 = 60;

/// Signature algorithms accepted by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum JwtAlgorithm {
    #[serde(rename = "RS256")]
    #[value(name = "RS256")]
    Rs256,
    #[serde(rename = "ES256")]
    #[value(name = "ES256")]
    Es256,
}

impl JwtAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JwtAlgorithm::Rs256 => "RS256",
            JwtAlgorithm::Es256 => "ES256",
        }
    }

    fn signing_algorithm(&self) -> Algorithm {
        match self {
            JwtAlgorithm::Rs256 => Algorithm::RS256,
            JwtAlgorithm::Es256 => Algorithm::ES256,
        }
    }

    fn encoding_key(&self, pem: &[u8]) -> Result<EncodingKey, jsonwebtoken::errors::Error> {
        match self {
            JwtAlgorithm::Rs256 => EncodingKey::from_rsa_pem(pem),
            JwtAlgorithm::Es256 => EncodingKey::from_ec_pem(pem),
        }
    }
}

impl fmt::Display for JwtAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JwtAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RS256" => Ok(JwtAlgorithm::Rs256),
            "ES256" => Ok(JwtAlgorithm::Es256),
            _ => Err(AuthError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Claims understood by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Audience: the cloud project id
    pub aud: String,
}

impl Claims {
    pub fn new(project_id: &str, issued_at: DateTime<Utc>) -> Self {
        let expires_at = issued_at + Duration::minutes(TOKEN_LIFETIME_MINUTES);
        Self {
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            aud: project_id.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read private key file {path}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Private key is not a valid {algorithm} key")]
    InvalidKey {
        algorithm: JwtAlgorithm,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Create a JWT for connecting to the bridge, issued now
pub fn create_jwt(
    project_id: &str,
    private_key_file: &Path,
    algorithm: JwtAlgorithm,
) -> Result<String, AuthError> {
    create_jwt_at(project_id, private_key_file, algorithm, Utc::now())
}

/// Create a JWT with an explicit issue time
pub fn create_jwt_at(
    project_id: &str,
    private_key_file: &Path,
    algorithm: JwtAlgorithm,
    issued_at: DateTime<Utc>,
) -> Result<String, AuthError> {
    let pem = std::fs::read(private_key_file).map_err(|source| AuthError::KeyRead {
        path: private_key_file.to_path_buf(),
        source,
    })?;

    info!(
        "Creating JWT using {} from private key file {}",
        algorithm,
        private_key_file.display()
    );

    let key = algorithm
        .encoding_key(&pem)
        .map_err(|source| AuthError::InvalidKey { algorithm, source })?;
    let claims = Claims::new(project_id, issued_at);

    encode(&Header::new(algorithm.signing_algorithm()), &claims, &key).map_err(AuthError::Signing)
}
