//! Key resolver: fetches and caches public signing keys from the identity
//! provider's JWKS discovery endpoint.
//!
//! Lookups are read-through: a hit within the TTL is served from the cache, a
//! miss or a stale entry fetches the **full** key set (amortizing future
//! lookups) and repopulates the cache. Remote fetches are single-flight and
//! rate limited; exceeding the limit fails fast rather than queuing.
//!
//! # Security
//!
//! - Keys are cached to reduce load on the provider and improve latency
//! - Entries expire after a TTL to pick up key rotations
//! - HTTPS should be used in production (enforced by deployment config)

use crate::auth::AuthError;
use common::jwt::decode_ed25519_public_key_jwk;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL (10 minutes, matching the provider client defaults).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default cap on remote fetches per rolling minute.
pub const DEFAULT_FETCHES_PER_MINUTE: u32 = 10;

/// Default bound on cached keys.
pub const DEFAULT_MAX_KEYS: usize = 32;

/// HTTP timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the discovery endpoint.
///
/// Covers the two key families the provider publishes: RSA (`n`/`e`) and
/// Ed25519 OKP (`x`).
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm the key is intended for (e.g. "RS256", "EdDSA").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// OKP public key value (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// OKP curve name.
    #[serde(default)]
    pub crv: Option<String>,
}

/// JWKS response from the discovery endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Raw public key material from a JWK.
#[derive(Debug, Clone)]
enum KeyMaterial {
    Rsa { n: String, e: String },
    Ed25519 { x: String },
}

/// A public signing key resolved from the discovery endpoint.
///
/// Immutable once fetched; the cache hands out `Arc` views and keeps
/// exclusive ownership of the entries themselves.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Key ID this key is published under.
    pub key_id: String,

    /// Algorithm declared by the provider for this key, if any.
    pub algorithm: Option<String>,

    material: KeyMaterial,
}

impl SigningKey {
    /// Build a signing key from a JWK, skipping unsupported or incomplete
    /// entries so a single odd key cannot poison the whole set.
    fn from_jwk(jwk: Jwk) -> Option<Self> {
        let material = match jwk.kty.as_str() {
            "RSA" => match (jwk.n, jwk.e) {
                (Some(n), Some(e)) => KeyMaterial::Rsa { n, e },
                _ => {
                    tracing::warn!(
                        target: "helpdesk.auth.jwks",
                        kid = %jwk.kid,
                        "RSA key missing n/e components, skipping"
                    );
                    return None;
                }
            },
            "OKP" => match jwk.x {
                Some(x) => KeyMaterial::Ed25519 { x },
                None => {
                    tracing::warn!(
                        target: "helpdesk.auth.jwks",
                        kid = %jwk.kid,
                        "OKP key missing x field, skipping"
                    );
                    return None;
                }
            },
            other => {
                tracing::warn!(
                    target: "helpdesk.auth.jwks",
                    kid = %jwk.kid,
                    kty = %other,
                    "Unsupported key type, skipping"
                );
                return None;
            }
        };

        Some(Self {
            key_id: jwk.kid,
            algorithm: jwk.alg,
            material,
        })
    }

    /// Convert the raw material into a verification key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchError` if the published material cannot be
    /// decoded; the provider served something unusable and verification must
    /// degrade rather than pass.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match &self.material {
            KeyMaterial::Rsa { n, e } => DecodingKey::from_rsa_components(n, e).map_err(|err| {
                tracing::error!(
                    target: "helpdesk.auth.jwks",
                    kid = %self.key_id,
                    error = %err,
                    "Invalid RSA key components"
                );
                AuthError::KeyFetchError("invalid RSA key material".to_string())
            }),
            KeyMaterial::Ed25519 { x } => {
                let bytes = decode_ed25519_public_key_jwk(x).map_err(|err| {
                    tracing::error!(
                        target: "helpdesk.auth.jwks",
                        kid = %self.key_id,
                        error = %err,
                        "Invalid Ed25519 public key encoding"
                    );
                    AuthError::KeyFetchError("invalid Ed25519 key material".to_string())
                })?;
                Ok(DecodingKey::from_ed_der(&bytes))
            }
        }
    }
}

/// A cached key with the instant it was fetched.
struct CachedKey {
    key: Arc<SigningKey>,
    fetched_at: Instant,
}

/// Rolling-minute window of completed remote fetches.
struct FetchWindow {
    recent: Vec<Instant>,
    max_per_minute: u32,
}

impl FetchWindow {
    /// Admit one fetch or fail fast when the window is full.
    fn admit(&mut self) -> Result<(), AuthError> {
        let cutoff = Instant::now().checked_sub(Duration::from_secs(60));
        if let Some(cutoff) = cutoff {
            self.recent.retain(|t| *t > cutoff);
        }

        if self.recent.len() >= self.max_per_minute as usize {
            tracing::warn!(
                target: "helpdesk.auth.jwks",
                max_per_minute = self.max_per_minute,
                "JWKS fetch rate limit exceeded, failing fast"
            );
            return Err(AuthError::KeyFetchError(
                "key fetch rate limit exceeded".to_string(),
            ));
        }

        self.recent.push(Instant::now());
        Ok(())
    }
}

/// Read-through cache of signing keys with single-flight remote fetches.
///
/// Safe under concurrent access: lookups take a read lock, a fetch holds the
/// fetch mutex, and waiters re-check the cache generation after acquiring it,
/// so concurrent `resolve()` calls for an unresolved key perform exactly one
/// HTTP request.
pub struct KeyResolver {
    /// URL to the JWKS discovery endpoint.
    jwks_url: String,

    /// HTTP client for fetching the key set.
    http_client: reqwest::Client,

    /// Cached keys by key ID.
    cache: RwLock<HashMap<String, CachedKey>>,

    /// Serializes remote fetches and guards the rate-limit window.
    fetch_window: Mutex<FetchWindow>,

    /// Bumped after every completed fetch; lets waiters detect that another
    /// task already refreshed the cache while they were queued.
    generation: AtomicU64,

    /// How long a fetched key may be served without a refresh attempt.
    cache_ttl: Duration,

    /// Bound on cached keys; excess keys in one response are dropped.
    max_keys: usize,
}

impl KeyResolver {
    /// Create a resolver with default TTL, rate limit, and size bound.
    #[must_use]
    pub fn new(jwks_url: String) -> Self {
        Self::with_limits(
            jwks_url,
            DEFAULT_CACHE_TTL,
            DEFAULT_FETCHES_PER_MINUTE,
            DEFAULT_MAX_KEYS,
        )
    }

    /// Create a resolver with explicit cache and rate-limit settings.
    #[must_use]
    pub fn with_limits(
        jwks_url: String,
        cache_ttl: Duration,
        max_fetches_per_minute: u32,
        max_keys: usize,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    target: "helpdesk.auth.jwks",
                    error = %e,
                    "Failed to build HTTP client with custom config, using defaults"
                );
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(HashMap::new()),
            fetch_window: Mutex::new(FetchWindow {
                recent: Vec::new(),
                max_per_minute: max_fetches_per_minute,
            }),
            generation: AtomicU64::new(0),
            cache_ttl,
            max_keys,
        }
    }

    /// Resolve a signing key by key ID.
    ///
    /// Serves fresh cache entries immediately; otherwise fetches the full key
    /// set, subject to the rate limit, and re-checks the cache.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyFetchError` - fetch failed or the rate limit tripped
    /// - `AuthError::KeyNotFound` - key absent even after a fresh fetch
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.cached_fresh(kid).await {
            tracing::debug!(target: "helpdesk.auth.jwks", kid = %kid, "JWKS cache hit");
            return Ok(key);
        }

        let observed = self.generation.load(Ordering::Acquire);
        {
            let mut window = self.fetch_window.lock().await;

            // A fetch that completed while this task waited for the mutex
            // already refreshed the cache; its result answers this lookup too.
            if self.generation.load(Ordering::Acquire) == observed {
                window.admit()?;
                let keys = self.fetch_keys().await?;
                self.install(keys).await;
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
        }

        // The cache was just repopulated (by this task or the flight it
        // waited behind), so this lookup needs no TTL filter.
        let cache = self.cache.read().await;
        match cache.get(kid) {
            Some(entry) => Ok(Arc::clone(&entry.key)),
            None => {
                tracing::warn!(
                    target: "helpdesk.auth.jwks",
                    kid = %kid,
                    "Key not found in JWKS after refresh"
                );
                Err(AuthError::KeyNotFound)
            }
        }
    }

    /// Look up a cache entry that is still within its TTL.
    async fn cached_fresh(&self, kid: &str) -> Option<Arc<SigningKey>> {
        let cache = self.cache.read().await;
        cache
            .get(kid)
            .filter(|entry| entry.fetched_at.elapsed() <= self.cache_ttl)
            .map(|entry| Arc::clone(&entry.key))
    }

    /// Fetch the full key set from the discovery endpoint.
    #[instrument(skip(self))]
    async fn fetch_keys(&self) -> Result<Vec<SigningKey>, AuthError> {
        tracing::debug!(target: "helpdesk.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "helpdesk.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::KeyFetchError(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "helpdesk.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeyFetchError(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "helpdesk.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeyFetchError(e.to_string())
        })?;

        Ok(jwks
            .keys
            .into_iter()
            .filter_map(SigningKey::from_jwk)
            .collect())
    }

    /// Replace the cache with a freshly fetched key set.
    ///
    /// The fetched set is authoritative: keys that disappeared from it (e.g.
    /// after rotation) drop out of the cache here.
    async fn install(&self, mut keys: Vec<SigningKey>) {
        if keys.len() > self.max_keys {
            tracing::warn!(
                target: "helpdesk.auth.jwks",
                fetched = keys.len(),
                max_keys = self.max_keys,
                "JWKS response exceeds cache bound, dropping excess keys"
            );
            keys.truncate(self.max_keys);
        }

        let now = Instant::now();
        let fresh: HashMap<String, CachedKey> = keys
            .into_iter()
            .map(|key| {
                (
                    key.key_id.clone(),
                    CachedKey {
                        key: Arc::new(key),
                        fetched_at: now,
                    },
                )
            })
            .collect();

        tracing::info!(
            target: "helpdesk.auth.jwks",
            key_count = fresh.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        *cache = fresh;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rsa_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": "sXchJ2tjbqnd7dKnlHFI5cSN9GE5Vf1JqlVVSSenPhN5Tvwm9rrpmBwOUILR0fUyLl2SgqSdS_nqOte1gQzu5w",
            "e": "AQAB"
        })
    }

    fn okp_jwk(kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": kid,
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo",
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    async fn mock_jwks(server: &MockServer, keys: Vec<serde_json::Value>, expected_hits: u64) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })),
            )
            .expect(expected_hits)
            .mount(server)
            .await;
    }

    fn resolver_for(server: &MockServer) -> KeyResolver {
        KeyResolver::new(format!("{}/.well-known/jwks.json", server.uri()))
    }

    #[test]
    fn test_jwk_deserialization_rsa() {
        let jwk: Jwk = serde_json::from_value(rsa_jwk("rsa-key-01")).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "rsa-key-01");
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert!(jwk.n.is_some());
        assert!(jwk.e.is_some());
        assert!(jwk.x.is_none());
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let json = r#"{"kty": "RSA", "kid": "key-02"}"#;
        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kid, "key-02");
        assert!(jwk.alg.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_signing_key_skips_unsupported_kty() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "EC",
            "kid": "ec-key",
            "crv": "P-256"
        }))
        .unwrap();

        assert!(SigningKey::from_jwk(jwk).is_none());
    }

    #[test]
    fn test_signing_key_skips_rsa_without_components() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "kid": "partial-key",
            "n": "abc"
        }))
        .unwrap();

        assert!(SigningKey::from_jwk(jwk).is_none());
    }

    #[test]
    fn test_okp_decoding_key_from_jwk() {
        let jwk: Jwk = serde_json::from_value(okp_jwk("ed-key")).unwrap();
        let key = SigningKey::from_jwk(jwk).unwrap();

        assert!(key.decoding_key().is_ok());
    }

    #[test]
    fn test_okp_decoding_key_invalid_base64() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "OKP",
            "kid": "bad-key",
            "x": "!!!not-base64!!!"
        }))
        .unwrap();
        let key = SigningKey::from_jwk(jwk).unwrap();

        assert!(matches!(
            key.decoding_key(),
            Err(AuthError::KeyFetchError(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_fetches_and_caches() {
        let server = MockServer::start().await;
        mock_jwks(&server, vec![rsa_jwk("rsa-key-01"), okp_jwk("ed-key-01")], 1).await;

        let resolver = resolver_for(&server);

        let key = resolver.resolve("rsa-key-01").await.unwrap();
        assert_eq!(key.key_id, "rsa-key-01");
        assert_eq!(key.algorithm.as_deref(), Some("RS256"));

        // Second lookup for a different key from the same fetch: cache hit,
        // no extra HTTP request (the mock expects exactly one).
        let other = resolver.resolve("ed-key-01").await.unwrap();
        assert_eq!(other.key_id, "ed-key-01");
    }

    #[tokio::test]
    async fn test_resolve_unknown_kid_is_key_not_found() {
        let server = MockServer::start().await;
        mock_jwks(&server, vec![rsa_jwk("rsa-key-01")], 1).await;

        let resolver = resolver_for(&server);

        let result = resolver.resolve("no-such-key").await;
        assert!(matches!(result, Err(AuthError::KeyNotFound)));
    }

    #[tokio::test]
    async fn test_resolve_fetch_failure_is_key_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);

        let result = resolver.resolve("any-key").await;
        assert!(matches!(result, Err(AuthError::KeyFetchError(_))));
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_refetch() {
        let server = MockServer::start().await;
        mock_jwks(&server, vec![rsa_jwk("rsa-key-01")], 2).await;

        // Zero TTL: every lookup after the first sees a stale entry.
        let resolver = KeyResolver::with_limits(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_secs(0),
            DEFAULT_FETCHES_PER_MINUTE,
            DEFAULT_MAX_KEYS,
        );

        resolver.resolve("rsa-key-01").await.unwrap();
        resolver.resolve("rsa-key-01").await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_fails_fast_without_fetching() {
        let server = MockServer::start().await;
        // Key set never contains the requested key; only one fetch is allowed.
        mock_jwks(&server, vec![rsa_jwk("rsa-key-01")], 1).await;

        let resolver = KeyResolver::with_limits(
            format!("{}/.well-known/jwks.json", server.uri()),
            DEFAULT_CACHE_TTL,
            1,
            DEFAULT_MAX_KEYS,
        );

        let first = resolver.resolve("unknown-1").await;
        assert!(matches!(first, Err(AuthError::KeyNotFound)));

        // Second miss would need another fetch; the window is exhausted.
        let second = resolver.resolve("unknown-2").await;
        assert!(matches!(second, Err(AuthError::KeyFetchError(_))));
    }

    #[tokio::test]
    async fn test_cache_bound_drops_excess_keys() {
        let server = MockServer::start().await;
        let keys: Vec<serde_json::Value> =
            (0..5).map(|i| rsa_jwk(&format!("key-{i}"))).collect();
        mock_jwks(&server, keys, 1).await;

        let resolver = KeyResolver::with_limits(
            format!("{}/.well-known/jwks.json", server.uri()),
            DEFAULT_CACHE_TTL,
            DEFAULT_FETCHES_PER_MINUTE,
            3,
        );

        resolver.resolve("key-0").await.unwrap();

        let cache = resolver.cache.read().await;
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let server = MockServer::start().await;
        mock_jwks(&server, vec![rsa_jwk("rsa-key-01")], 1).await;

        let resolver = Arc::new(resolver_for(&server));

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("rsa-key-01").await })
            })
            .collect();

        for task in tasks {
            let key = task.await.unwrap().unwrap();
            assert_eq!(key.key_id, "rsa-key-01");
        }
        // The mock's expect(1) verifies exactly one remote fetch on drop.
    }
}
