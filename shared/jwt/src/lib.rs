use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed token kind. `access` tokens are stateless-verified on every
/// request; `refresh` tokens additionally require presence in the
/// revocation store's refresh registry (see `shared_kv`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The full registered + custom claim set signed into every token,
/// matching §3/§4.1 of the token contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (`JWT_ISSUER`).
    pub iss: String,
    /// Subject id — matches the IDP's identifier for the principal.
    pub sub: Uuid,
    /// Token id, fresh per issuance, never reused.
    pub jti: Uuid,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Not-before (Unix seconds).
    pub nbf: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
    pub kind: TokenKind,
    pub tenant_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        issuer: &str,
        subject: Uuid,
        tenant_id: Uuid,
        email: String,
        roles: Vec<String>,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            iss: issuer.to_string(),
            sub: subject,
            jti: Uuid::new_v4(),
            iat: now,
            nbf: now,
            exp: now + ttl_seconds,
            kind,
            tenant_id,
            email,
            roles,
        }
    }
}

/// Why a presented token was rejected. Distinct from `shared_error::AppError`
/// so the session service can attach its own revocation/registry semantics
/// before mapping to the HTTP error envelope.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token kind does not match expectation")]
    WrongKind,
}

/// Holds the asymmetric key pair loaded once at startup and exposes
/// sign-with-private / verify-with-public, matching the "key material
/// holder" component of §2.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    leeway_seconds: u64,
}

impl TokenCodec {
    /// Loads RSA PEM key material from disk. Signing is RS256 and pinned:
    /// `verify` never accepts a token whose header declares any other
    /// algorithm, which prevents `alg: none`/HS256-confusion attacks.
    pub fn from_pem_files(
        private_key_path: &str,
        public_key_path: &str,
        issuer: impl Into<String>,
        leeway_seconds: u64,
    ) -> Result<Self, shared_error::AppError> {
        let private_pem = std::fs::read(private_key_path).map_err(|e| {
            shared_error::AppError::ConfigError(format!(
                "failed to read {private_key_path}: {e}"
            ))
        })?;
        let public_pem = std::fs::read(public_key_path).map_err(|e| {
            shared_error::AppError::ConfigError(format!("failed to read {public_key_path}: {e}"))
        })?;

        let encoding_key = EncodingKey::from_rsa_pem(&private_pem)
            .map_err(|e| shared_error::AppError::ConfigError(format!("invalid private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(&public_pem)
            .map_err(|e| shared_error::AppError::ConfigError(format!("invalid public key: {e}")))?;

        Ok(Self { encoding_key, decoding_key, issuer: issuer.into(), leeway_seconds })
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn from_keys(
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        issuer: impl Into<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self { encoding_key, decoding_key, issuer: issuer.into(), leeway_seconds }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// `sign(claims) -> opaque_string`. CPU-only, never suspends (§5).
    pub fn sign(&self, claims: &Claims) -> Result<String, shared_error::AppError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| shared_error::AppError::Internal(format!("failed to sign token: {e}")))
    }

    /// `verify(opaque_string) -> claims | error`. Rejects any token whose
    /// algorithm isn't exactly RS256 before even attempting signature
    /// verification.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = vec![Algorithm::RS256];
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = self.leeway_seconds;
        validation.validate_nbf = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.kind != expected_kind {
            return Err(TokenError::WrongKind);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, EncodingKey};

    // 2048-bit test-only RSA key pair, not used outside this test module.
    const TEST_PRIVATE_PEM: &str = include_str!("../testdata/test_private.pem");
    const TEST_PUBLIC_PEM: &str = include_str!("../testdata/test_public.pem");

    fn codec() -> TokenCodec {
        TokenCodec::from_keys(
            EncodingKey::from_rsa_pem(TEST_PRIVATE_PEM.as_bytes()).unwrap(),
            DecodingKey::from_rsa_pem(TEST_PUBLIC_PEM.as_bytes()).unwrap(),
            "heimdall-test",
            0,
        )
    }

    #[test]
    fn round_trips_claims() {
        let codec = codec();
        let claims = Claims::new(
            codec.issuer(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "alice@example.com".to_string(),
            vec!["viewer".to_string()],
            TokenKind::Access,
            900,
        );
        let token = codec.sign(&claims).unwrap();
        let decoded = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.roles, claims.roles);
    }

    #[test]
    fn rejects_wrong_kind() {
        let codec = codec();
        let claims = Claims::new(
            codec.issuer(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "bob@example.com".to_string(),
            vec![],
            TokenKind::Refresh,
            3600,
        );
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token, TokenKind::Access).unwrap_err(), TokenError::WrongKind);
    }

    #[test]
    fn rejects_expired_token() {
        let codec = codec();
        let mut claims = Claims::new(
            codec.issuer(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "carol@example.com".to_string(),
            vec![],
            TokenKind::Access,
            900,
        );
        claims.exp = claims.iat - 1;
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token, TokenKind::Access).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn rejects_tampered_payload() {
        let codec = codec();
        let claims = Claims::new(
            codec.issuer(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "dave@example.com".to_string(),
            vec![],
            TokenKind::Access,
            900,
        );
        let token = codec.sign(&claims).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_payload = format!("{}AA", &parts[1][..parts[1].len() - 2]);
        parts[1] = &tampered_payload;
        let tampered = parts.join(".");
        assert!(codec.verify(&tampered, TokenKind::Access).is_err());
    }
}
