//! Bearer token verification against the identity provider's signing keys.
//!
//! Validates incoming tokens: structure, declared algorithm, signature (via a
//! key resolved from the JWKS cache), issuer, audience, expiry, and
//! not-before. Each failure maps to its own [`AuthError`] kind so the
//! middleware can answer precisely without the verifier leaking detail.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the single configured algorithm is accepted; `none` and any
//!   declared/actual mismatch are rejected before signature verification
//!   (prevents algorithm-confusion attacks)
//! - Expiry and not-before are validated with a bounded clock-skew allowance

use crate::auth::claims::TokenClaims;
use crate::auth::jwks::KeyResolver;
use crate::auth::AuthError;
use common::jwt::{decode_header_fields, JwtParseError};
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Token verifier bound to one expected issuer, audience, and algorithm.
pub struct TokenVerifier {
    /// Resolver for public signing keys.
    key_resolver: Arc<KeyResolver>,

    /// Issuer URL tokens must carry.
    expected_issuer: String,

    /// Audience that must appear among the token's audiences.
    expected_audience: String,

    /// The single signature algorithm accepted by this deployment.
    allowed_algorithm: Algorithm,

    /// Clock skew tolerance in seconds for expiry/not-before validation.
    clock_skew_seconds: i64,
}

impl TokenVerifier {
    /// Create a new token verifier.
    #[must_use]
    pub fn new(
        key_resolver: Arc<KeyResolver>,
        expected_issuer: String,
        expected_audience: String,
        allowed_algorithm: Algorithm,
        clock_skew_seconds: i64,
    ) -> Self {
        Self {
            key_resolver,
            expected_issuer,
            expected_audience,
            allowed_algorithm,
            clock_skew_seconds,
        }
    }

    /// Verify a bearer token and return its claim set.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] kind matching the first check that fails;
    /// see the module docs for the order of checks.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        // 1. Parse the header: size check, structure, raw alg + kid
        let header = decode_header_fields(token).map_err(|e| {
            tracing::debug!(target: "helpdesk.auth.verifier", error = ?e, "Token header parse failed");
            match e {
                JwtParseError::TokenTooLarge
                | JwtParseError::MalformedToken
                | JwtParseError::MissingKid => AuthError::MalformedToken,
            }
        })?;

        // 2. Screen the declared algorithm before touching any key material.
        //    An unparsable alg ("none" included) is an algorithm we do not
        //    accept, not a malformed token.
        let alg_str = header.alg.as_deref().ok_or(AuthError::MalformedToken)?;
        let declared = Algorithm::from_str(alg_str).map_err(|_| {
            tracing::warn!(
                target: "helpdesk.auth.verifier",
                alg = %alg_str,
                "Token declared an unsupported algorithm"
            );
            AuthError::AlgorithmMismatch
        })?;
        if declared != self.allowed_algorithm {
            tracing::warn!(
                target: "helpdesk.auth.verifier",
                alg = %alg_str,
                "Token algorithm differs from configured algorithm"
            );
            return Err(AuthError::AlgorithmMismatch);
        }

        // 3. Resolve the signing key by kid
        let kid = header.kid.ok_or_else(|| {
            tracing::debug!(target: "helpdesk.auth.verifier", "Token header has no kid");
            AuthError::MissingKeyId
        })?;
        let key = self.key_resolver.resolve(&kid).await?;

        // The key's own declared algorithm must agree as well
        if let Some(key_alg) = key.algorithm.as_deref() {
            match Algorithm::from_str(key_alg) {
                Ok(a) if a == self.allowed_algorithm => {}
                _ => {
                    tracing::warn!(
                        target: "helpdesk.auth.verifier",
                        kid = %key.key_id,
                        key_alg = %key_alg,
                        "Signing key algorithm differs from configured algorithm"
                    );
                    return Err(AuthError::AlgorithmMismatch);
                }
            }
        }

        // 4. Verify the signature. Temporal and issuer/audience checks are
        //    done explicitly below so each failure keeps its own kind.
        let decoding_key = key.decoding_key()?;
        let mut validation = Validation::new(self.allowed_algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let token_data =
            decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
                tracing::debug!(target: "helpdesk.auth.verifier", error = %e, "Signature verification failed");
                AuthError::MalformedToken
            })?;
        let claims = token_data.claims;

        // 5. Claim checks with clock-skew allowance
        self.validate_claims_at(&claims, chrono::Utc::now().timestamp())?;

        tracing::debug!(target: "helpdesk.auth.verifier", "Token verified successfully");
        Ok(claims)
    }

    /// Deterministic claim validation against an explicit `now` timestamp.
    ///
    /// Split out so boundary conditions can be unit-tested without
    /// wall-clock dependence.
    fn validate_claims_at(&self, claims: &TokenClaims, now: i64) -> Result<(), AuthError> {
        if claims.iss != self.expected_issuer {
            tracing::debug!(
                target: "helpdesk.auth.verifier",
                iss = %claims.iss,
                "Token issuer mismatch"
            );
            return Err(AuthError::IssuerMismatch);
        }

        if !claims.aud.iter().any(|a| a == &self.expected_audience) {
            tracing::debug!(
                target: "helpdesk.auth.verifier",
                aud = ?claims.aud,
                "Expected audience not present in token"
            );
            return Err(AuthError::AudienceMismatch);
        }

        if now - self.clock_skew_seconds >= claims.exp {
            tracing::debug!(
                target: "helpdesk.auth.verifier",
                exp = claims.exp,
                now = now,
                "Token expired beyond skew allowance"
            );
            return Err(AuthError::Expired {
                expired_at: claims.exp,
            });
        }

        if let Some(nbf) = claims.nbf {
            if now + self.clock_skew_seconds < nbf {
                tracing::debug!(
                    target: "helpdesk.auth.verifier",
                    nbf = nbf,
                    now = now,
                    "Token not yet valid"
                );
                return Err(AuthError::NotYetValid);
            }
        }

        Ok(())
    }
}
