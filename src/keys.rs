//! Curve-specific keypairs built from TEE-derived material.
//!
//! [`Ed25519Keypair`] backs Solana-family signing; [`EvmAccount`] is a
//! secp256k1 account with Ethereum-style message and typed-data signing.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use k256::ecdsa::SigningKey as K256SigningKey;
use rand::rngs::OsRng;

use crate::error::{Result, TeeError};
use crate::utils::{calculate_keccak256, to_checksum_address};

/// Ed25519 signing keypair.
#[derive(Clone)]
pub struct Ed25519Keypair {
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Base58 public key, as Solana renders it.
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// 64-byte `secret || public` layout accepted by Solana keypair loaders.
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    /// Sign `message` with this key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Check a signature made by this key.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        verify_ed25519(&self.public_key_bytes(), message, signature)
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("public_key", &self.public_key_base58())
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature against a raw public key.
pub fn verify_ed25519(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(signature))
        .is_ok()
}

/// secp256k1 account with an Ethereum address.
#[derive(Clone)]
pub struct EvmAccount {
    signing_key: K256SigningKey,
    address: [u8; 20],
}

impl EvmAccount {
    /// Build an account from a 32-byte private key.
    ///
    /// # Errors
    ///
    /// Returns a crypto error if the scalar is zero or not below the curve order.
    pub fn from_private_key(private_key: &[u8; 32]) -> Result<Self> {
        let signing_key = K256SigningKey::from_bytes(&(*private_key).into())
            .map_err(|e| TeeError::crypto(format!("invalid secp256k1 private key: {}", e)))?;
        let address = address_of(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Raw 20-byte address.
    pub fn address_bytes(&self) -> [u8; 20] {
        self.address
    }

    /// EIP-55 checksummed address.
    pub fn address(&self) -> String {
        to_checksum_address(&self.address)
    }

    /// Raw secp256k1 private key.
    pub fn private_key_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    /// Uncompressed SEC1 public key (65 bytes, leading 0x04).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Sign a 32-byte digest. Returns `r || s || v` with `v` in {27, 28}.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; 65]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| TeeError::crypto(format!("signing failed: {}", e)))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(out)
    }

    /// EIP-191 personal message signature.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65]> {
        self.sign_hash(&hash_message(message))
    }

    /// EIP-712 signature from precomputed hashes.
    ///
    /// Callers encode the typed data themselves: `domain_separator` is
    /// `hashStruct(EIP712Domain)` and `struct_hash` is `hashStruct(message)`.
    /// The signed digest is `keccak256(0x1901 || domain_separator || struct_hash)`.
    pub fn sign_typed_data_hash(
        &self,
        domain_separator: &[u8; 32],
        struct_hash: &[u8; 32],
    ) -> Result<[u8; 65]> {
        self.sign_hash(&typed_data_digest(domain_separator, struct_hash))
    }
}

impl fmt::Debug for EvmAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmAccount")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn address_of(signing_key: &K256SigningKey) -> [u8; 20] {
    address_from_key(signing_key.verifying_key())
}

fn address_from_key(key: &k256::ecdsa::VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    let hash = calculate_keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    calculate_keccak256(&data)
}

/// `keccak256(0x19 0x01 || domainSeparator || hashStruct(message))`
pub fn typed_data_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(66);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain_separator);
    data.extend_from_slice(struct_hash);
    calculate_keccak256(&data)
}

/// Recover the address that produced a `r || s || v` signature over `hash`.
pub fn recover_address(hash: &[u8; 32], signature: &[u8; 65]) -> Result<[u8; 20]> {
    use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey as K256VerifyingKey};

    let sig = K256Signature::from_slice(&signature[..64])
        .map_err(|e| TeeError::crypto(format!("malformed signature: {}", e)))?;
    let v = signature[64];
    let recovery_id = RecoveryId::from_byte(v.checked_sub(27).unwrap_or(v))
        .ok_or_else(|| TeeError::crypto(format!("invalid recovery id: {}", v)))?;
    let key = K256VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| TeeError::crypto(format!("recovery failed: {}", e)))?;
    Ok(address_from_key(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{bytes_to_hex, calculate_sha256};
    use pretty_assertions::assert_eq;

    fn key_one() -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = 1;
        k
    }

    #[test]
    fn test_evm_account_known_vector() {
        let account = EvmAccount::from_private_key(&key_one()).unwrap();
        assert_eq!(account.address(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
        assert_eq!(account.public_key_bytes().len(), 65);
    }

    #[test]
    fn test_zero_private_key_is_rejected() {
        assert!(matches!(
            EvmAccount::from_private_key(&[0u8; 32]),
            Err(TeeError::Crypto(_))
        ));
    }

    #[test]
    fn test_hash_message_vector() {
        assert_eq!(
            bytes_to_hex(&hash_message(b"hello")),
            "50b2c43fd39106bafbba0da34fc430e1f91e3c96ea2acee2bc34119f92b37750"
        );
    }

    #[test]
    fn test_sign_message_recovers_signer() {
        let account = EvmAccount::from_private_key(&calculate_keccak256(b"signer")).unwrap();
        let signature = account.sign_message(b"hello").unwrap();
        assert!(signature[64] == 27 || signature[64] == 28);

        let recovered = recover_address(&hash_message(b"hello"), &signature).unwrap();
        assert_eq!(recovered, account.address_bytes());
    }

    #[test]
    fn test_sign_typed_data_hash_recovers_signer() {
        let account = EvmAccount::from_private_key(&calculate_keccak256(b"typed")).unwrap();
        let domain = calculate_keccak256(b"domain");
        let message = calculate_keccak256(b"message");
        let signature = account.sign_typed_data_hash(&domain, &message).unwrap();

        let recovered = recover_address(&typed_data_digest(&domain, &message), &signature).unwrap();
        assert_eq!(recovered, account.address_bytes());
    }

    #[test]
    fn test_ed25519_from_seed_is_deterministic() {
        let seed = calculate_sha256(&[0xAA; 32]);
        let a = Ed25519Keypair::from_seed(&seed);
        let b = Ed25519Keypair::from_seed(&seed);
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
        assert_eq!(
            a.public_key_base58(),
            "9PXVXGhBZcRQiJ9WMbtNacscZUCF3zkEE2HYdXBjGg6D"
        );
        assert_eq!(&a.to_keypair_bytes()[..32], &seed[..]);
        assert_eq!(&a.to_keypair_bytes()[32..], &a.public_key_bytes()[..]);
    }

    #[test]
    fn test_ed25519_sign_and_verify() {
        let keypair = Ed25519Keypair::generate();
        let signature = keypair.sign(b"transfer 1 SOL");
        assert!(keypair.verify(b"transfer 1 SOL", &signature));
        assert!(!keypair.verify(b"transfer 2 SOL", &signature));
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let account = EvmAccount::from_private_key(&key_one()).unwrap();
        let rendered = format!("{:?}", account);
        assert!(rendered.contains("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"));
        assert!(!rendered.contains("0000000000000000000000000000000000000000000000000000000000000001"));
    }
}
