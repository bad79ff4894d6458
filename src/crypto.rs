//! Session key material for the tunnel.
//!
//! A fresh X25519 keypair is generated once per session and never persisted.
//! The secret key is zeroized on drop and redacted in every rendered form;
//! only the public key ever leaves the process (via the directory record and
//! the generated tunnel configuration).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;

thread_local! {
    static RNG: RefCell<ChaCha20Rng> = RefCell::new(ChaCha20Rng::from_os_rng());
}

pub fn random_bytes(buf: &mut [u8]) {
    RNG.with(|rng| {
        rng.borrow_mut().fill_bytes(buf);
    });
}

/// X25519 secret key. Zeroized on drop; `Debug`, `Display`, and `Serialize`
/// never expose the key bytes.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub fn generate() -> Self {
        let mut seed = [0u8; KEY_LEN];
        random_bytes(&mut seed);
        // clamp through the dalek type so the stored bytes are a valid scalar
        let secret = X25519StaticSecret::from(seed);
        seed.zeroize();
        Self(secret.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        let secret = X25519StaticSecret::from(self.0);
        PublicKey(*X25519PublicKey::from(&secret).as_bytes())
    }

    /// Base64 rendering for the tunnel configuration. Callers must treat the
    /// returned string as secret.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([redacted])")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl Serialize for SecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[redacted]")
    }
}

/// X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Session keypair, generated once at startup and owned by the session.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub sk: SecretKey,
    pub pk: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let sk = SecretKey::generate();
        let pk = sk.public_key();
        Self { sk, pk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_differ() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.pk, b.pk);
    }

    #[test]
    fn public_key_base64_is_stable() {
        let kp = KeyPair::generate();
        assert_eq!(kp.pk.to_base64(), kp.sk.public_key().to_base64());
        // 32 bytes of standard base64 with padding
        assert_eq!(kp.pk.to_base64().len(), 44);
    }

    #[test]
    fn secret_key_is_redacted() {
        let kp = KeyPair::generate();
        let b64 = kp.sk.to_base64();
        assert!(!format!("{:?}", kp.sk).contains(&b64));
        assert!(!format!("{}", kp.sk).contains(&b64));
        assert!(!serde_json::to_string(&kp.sk).unwrap().contains(&b64));
    }
}
