use std::fmt;
use std::hash::{Hash, Hasher};

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::Result;

/// Bits used when a caller doesn't care; tests use a smaller size so
/// keypair generation doesn't dominate test wall time.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// A voter/validator identity. Wraps an RSA public key but is keyed,
/// compared, hashed and serialized purely in terms of its PKCS#1 DER
/// encoding so that `PublicKey` can live in `HashMap`s and structural
/// `Transaction`/`Contract` equality exactly as the wire format round-trips
/// it (hex of PKCS#1 DER, per the signing string and wire format).
#[derive(Clone)]
pub struct PublicKey {
    der: Vec<u8>,
}

impl PublicKey {
    pub fn from_rsa(key: &RsaPublicKey) -> Result<Self> {
        let der = key
            .to_pkcs1_der()
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self {
            der: der.as_bytes().to_vec(),
        })
    }

    pub fn to_rsa(&self) -> Result<RsaPublicKey> {
        RsaPublicKey::from_pkcs1_der(&self.der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.der)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let der = hex::decode(s)?;
        // Round-trip through RsaPublicKey to reject malformed DER early.
        RsaPublicKey::from_pkcs1_der(&der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self { der })
    }

    /// Verify `signature` over `message` under this public key, RSA-PKCS1v1.5/SHA-256.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = self.to_rsa() else {
            return false;
        };
        let hashed = sha2::Sha256::digest(message);
        key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
            .is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}
impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.der.hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}…)", &self.to_hex()[..16.min(self.to_hex().len())])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A signing identity. Never serialized onto the wire — only used locally
/// to produce signatures and to reconstruct a matching `PublicKey`.
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn to_rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }

    pub fn to_pem(&self) -> Result<String> {
        use rsa::pkcs1::LineEnding;
        self.inner
            .to_pkcs1_pem(LineEnding::LF)
            .map(|p| p.to_string())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Sign `message`, RSA-PKCS1v1.5/SHA-256.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let hashed = sha2::Sha256::digest(message);
        self.inner
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))
    }
}

/// A (private, public) RSA pair for a single identity (a voter or a
/// validator). The original source draws fresh 512-bit keys per demo actor
/// with Python's `rsa.newkeys`; we default to 2048 bits, the minimum size
/// most RSA-PKCS1v1.5 guidance still treats as current, and let callers ask
/// for smaller keys explicitly when generation speed matters (tests).
pub struct Keypair {
    private: PrivateKey,
    public: PublicKey,
}

impl Keypair {
    pub fn generate(bits: usize) -> Result<Self> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        let public = PublicKey::from_rsa(&public_key)?;
        Ok(Self {
            private: PrivateKey { inner: private_key },
            public,
        })
    }

    pub fn generate_default() -> Result<Self> {
        Self::generate(DEFAULT_KEY_BITS)
    }

    /// Rebuilds a `Keypair` from a `PrivateKey` loaded from disk, deriving
    /// the matching public key the same way `generate` does.
    pub fn from_private_key(private: PrivateKey) -> Result<Self> {
        let public_key = RsaPublicKey::from(&private.inner);
        let public = PublicKey::from_rsa(&public_key)?;
        Ok(Self { private, public })
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.private.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.public.verify(message, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keypair() -> Keypair {
        // 512 bits: fast enough for unit tests, never used for real signing.
        Keypair::generate(512).unwrap()
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let kp = test_keypair();
        let message = b"hello voters";
        let sig = kp.sign(message).unwrap();
        assert!(kp.verify(message, &sig));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let kp = test_keypair();
        let sig = kp.sign(b"candidate=alice").unwrap();
        assert!(!kp.verify(b"candidate=bob", &sig));
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let kp = test_keypair();
        let hex = kp.public_key().to_hex();
        let restored = PublicKey::from_hex(&hex).unwrap();
        assert_eq!(kp.public_key(), &restored);
    }

    #[test]
    fn public_key_json_roundtrip() {
        let kp = test_keypair();
        let json = serde_json::to_string(kp.public_key()).unwrap();
        let restored: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(kp.public_key(), &restored);
    }

    #[test]
    fn distinct_keypairs_have_distinct_public_keys() {
        let a = test_keypair();
        let b = test_keypair();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn from_private_key_recovers_the_same_public_key() {
        let kp = test_keypair();
        let pem = kp.private_key().to_pem().unwrap();
        let restored_private = PrivateKey::from_pem(&pem).unwrap();
        let restored = Keypair::from_private_key(restored_private).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }
}
