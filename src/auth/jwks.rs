//! JWKS cache for identity-provider JWT verification

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    cached_at: Instant,
}

/// Verifies bearer tokens against the provider's published RSA keys.
#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<RwLock<JwksCacheInner>>,
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

struct JwksCacheInner {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

impl JwksCache {
    pub fn new(
        http: reqwest::Client,
        jwks_url: String,
        issuer: String,
        audience: String,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(JwksCacheInner {
                keys: HashMap::new(),
                last_fetch: None,
            })),
            http,
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Verify a JWT and return its claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        // The kid picks the signing key out of the provider's key set
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;

        let decoding_key = self.get_or_fetch_key(&kid).await?;

        // Issuer and audience pin tokens to this deployment's auth project
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).context("JWT validation failed")?;

        Ok(token_data.claims)
    }

    async fn get_or_fetch_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.inner.read();
            if let Some(cached) = cache.keys.get(kid) {
                if cached.cached_at.elapsed() < self.ttl {
                    return Ok(cached.key.clone());
                }
            }
        }

        // Unknown or stale kid: the provider may have rotated its keys
        self.refresh_keys().await?;

        let cache = self.inner.read();
        cache
            .keys
            .get(kid)
            .map(|c| c.key.clone())
            .context("Key not found in JWKS")
    }

    async fn refresh_keys(&self) -> Result<()> {
        {
            let cache = self.inner.read();
            if let Some(last) = cache.last_fetch {
                // At most one fetch per second, unknown kids must not hammer the provider
                if last.elapsed() < Duration::from_secs(1) {
                    return Ok(());
                }
            }
        }

        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Failed to fetch JWKS")?;

        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }

        let jwks: JwksResponse = response.json().await.context("Failed to parse JWKS")?;

        let fetched = rsa_keys(jwks);
        let now = Instant::now();

        let mut cache = self.inner.write();
        cache.last_fetch = Some(now);
        // Keys dropped from the set stay until their TTL runs out, so tokens
        // signed just before a rotation still verify
        for (kid, key) in fetched {
            cache.keys.insert(kid, CachedKey { key, cached_at: now });
        }

        tracing::info!(keys = cache.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Pre-warm the cache by fetching keys
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh_keys().await
    }
}

/// Decoding keys by kid. Only RSA keys carrying modulus and exponent can
/// verify RS256 signatures; anything else in the set is skipped.
fn rsa_keys(jwks: JwksResponse) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" {
            tracing::debug!(kid = %jwk.kid, kty = %jwk.kty, "Skipping non-RSA JWK");
            continue;
        }
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::warn!(kid = %jwk.kid, "RSA JWK without modulus or exponent");
            continue;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                tracing::debug!(kid = %jwk.kid, "Cached JWKS key");
                keys.insert(jwk.kid, key);
            }
            Err(e) => {
                tracing::warn!(kid = %jwk.kid, error = %e, "Failed to parse JWK");
            }
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwks(value: serde_json::Value) -> JwksResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn only_complete_rsa_keys_are_kept() {
        let keys = rsa_keys(jwks(serde_json::json!({
            "keys": [
                { "kid": "rsa-1", "kty": "RSA", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri", "e": "AQAB" },
                { "kid": "ec-1", "kty": "EC", "crv": "P-256", "x": "abc", "y": "def" },
                { "kid": "rsa-partial", "kty": "RSA", "e": "AQAB" }
            ]
        })));

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("rsa-1"));
    }

    #[test]
    fn malformed_components_are_skipped() {
        let keys = rsa_keys(jwks(serde_json::json!({
            "keys": [{ "kid": "bad", "kty": "RSA", "n": "not base64!", "e": "AQAB" }]
        })));

        assert!(keys.is_empty());
    }
}
