//! Kraken Futures request authentication.
//!
//! `Authent = base64(HMAC-SHA512(base64decode(secret), SHA256(body + nonce + path)))`
//! where `path` has the `/derivatives` routing prefix removed.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::clock::{SystemTimeProvider, TimeProvider};
use crate::exchange::error::ExchangeError;

/// Public routing prefix that is not part of the signed message.
pub const ROUTING_PREFIX: &str = "/derivatives";

const COUNTER_MODULUS: u32 = 10_000;

#[derive(Clone)]
pub struct Credentials {
    pub key: String,
    /// Base64-encoded API secret.
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Millisecond timestamp followed by a zero-padded rolling counter.
///
/// The counter wraps from 9999 back to 0, so ordering is only guaranteed across
/// millisecond boundaries or for fewer than 10 000 nonces within one millisecond.
pub struct NonceGenerator {
    clock: Arc<dyn TimeProvider>,
    counter: AtomicU32,
}

impl NonceGenerator {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self::with_counter(clock, 0)
    }

    pub fn with_counter(clock: Arc<dyn TimeProvider>, start: u32) -> Self {
        Self {
            clock,
            counter: AtomicU32::new(start % COUNTER_MODULUS),
        }
    }

    pub fn next(&self) -> String {
        let sequence = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some((c + 1) % COUNTER_MODULUS)
            })
            .unwrap_or_default();
        format!("{}{:05}", self.clock.now_millis(), sequence)
    }
}

pub struct Signer {
    mac: Hmac<Sha512>,
    nonces: NonceGenerator,
}

impl Signer {
    pub fn new(secret_b64: &str) -> Result<Self, ExchangeError> {
        Self::with_clock(secret_b64, Arc::new(SystemTimeProvider))
    }

    pub fn with_clock(secret_b64: &str, clock: Arc<dyn TimeProvider>) -> Result<Self, ExchangeError> {
        Self::with_nonce_generator(secret_b64, NonceGenerator::new(clock))
    }

    pub fn with_nonce_generator(secret_b64: &str, nonces: NonceGenerator) -> Result<Self, ExchangeError> {
        let secret = general_purpose::STANDARD
            .decode(secret_b64.trim())
            .map_err(|e| ExchangeError::Signing(format!("API secret is not valid base64: {}", e)))?;
        let mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        Ok(Self { mac, nonces })
    }

    pub fn next_nonce(&self) -> String {
        self.nonces.next()
    }

    pub fn sign(&self, path: &str, nonce: &str, body: &str) -> String {
        let path = canonical_path(path);

        let mut sha256 = Sha256::new();
        sha256.update(body.as_bytes());
        sha256.update(nonce.as_bytes());
        sha256.update(path.as_bytes());
        let digest = sha256.finalize();

        let mut mac = self.mac.clone();
        mac.update(&digest);
        general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

pub fn canonical_path(path: &str) -> &str {
    path.strip_prefix(ROUTING_PREFIX).unwrap_or(path)
}
