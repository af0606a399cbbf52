use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Query parameter carrying `timestamp-nonce-0-hash`.
pub const AUTH_PARAM: &str = "auth_key";

/// Signs CDN download URLs with a shared secret.
///
/// The signed string is `/{path}-{timestamp}-{nonce}-0-{secret}`; the edge
/// recomputes its SHA-256 from the query parameter and the request path.
/// Timestamps never go backwards, even if the wall clock does.
#[derive(Debug)]
pub struct UrlSigner {
    base_url: String,
    secret:   String,
    last_ts:  AtomicI64,
}

impl UrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret:   secret.into(),
            last_ts:  AtomicI64::new(0),
        }
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    pub fn sign(&self, path: &str) -> String {
        let nonce: u32 = rand::thread_rng().r#gen();
        self.sign_with(path, self.timestamp(), &format!("{nonce:08x}"))
    }

    pub fn sign_with(&self, path: &str, timestamp: i64, nonce: &str) -> String {
        let path = path.trim_start_matches('/');
        let hash = self.digest(path, timestamp, nonce);
        format!(
            "{}/{path}?{AUTH_PARAM}={timestamp}-{nonce}-0-{hash}",
            self.base_url
        )
    }

    /// Check an `auth_key` value for `path`. Rejects keys older than
    /// `max_age_secs` relative to `now`.
    pub fn verify(&self, path: &str, auth_key: &str, now: i64, max_age_secs: i64) -> bool {
        let mut parts = auth_key.splitn(4, '-');
        let (Some(ts), Some(nonce), Some("0"), Some(hash)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Ok(ts) = ts.parse::<i64>() else {
            return false;
        };
        if now - ts > max_age_secs {
            return false;
        }
        self.digest(path.trim_start_matches('/'), ts, nonce) == hash
    }

    fn digest(&self, path: &str, timestamp: i64, nonce: &str) -> String {
        let canonical = format!("/{path}-{timestamp}-{nonce}-0-{}", self.secret);
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    fn timestamp(&self) -> i64 {
        let now = Utc::now().timestamp();
        let prev = self.last_ts.fetch_max(now, Ordering::SeqCst);
        prev.max(now)
    }
}
