use commerce_core::types::{PublicKeyHex, SignatureHex};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// An Ed25519 keypair. The signing key is held in a `Zeroizing<[u8; 32]>`
/// so its bytes are wiped from memory on drop.
pub struct KeyPair {
    signing_key_bytes: Zeroizing<[u8; 32]>,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key_bytes: Zeroizing::new(signing_key.to_bytes()),
            verifying_key,
        }
    }

    /// Restore a KeyPair from a raw 32-byte seed (e.g. loaded from a wallet file).
    pub fn from_raw(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key_bytes: Zeroizing::new(seed),
            verifying_key,
        }
    }

    pub fn public_key_hex(&self) -> PublicKeyHex {
        PublicKeyHex(hex::encode(self.verifying_key.to_bytes()))
    }

    /// Sign `message` using this keypair's signing key.
    pub fn sign(&self, message: &[u8]) -> SignatureHex {
        let signing_key = SigningKey::from_bytes(&self.signing_key_bytes);
        let sig = signing_key.sign(message);
        SignatureHex(hex::encode(sig.to_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {} }}", self.public_key_hex())
    }
}

/// Verify a detached signature against a message and a hex-encoded public key.
/// Returns `false` (never panics) on malformed hex or key material.
pub fn verify(pubkey: &PublicKeyHex, message: &[u8], signature: &SignatureHex) -> bool {
    let Ok(pk_bytes) = hex::decode(&pubkey.0) else {
        return false;
    };
    let Ok(pk_bytes): Result<[u8; 32], _> = pk_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(&signature.0) else {
        return false;
    };
    let Ok(sig_bytes): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(verify(&kp.public_key_hex(), b"hello", &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello");
        assert!(!verify(&kp.public_key_hex(), b"goodbye", &sig));
    }
}
