// sbcredit-common/src/codec.rs

//! Per-field sealed encryption to a holder's X25519 key.
//!
//! Every call generates a fresh ephemeral key pair and nonce. The symmetric key is
//! derived with BLAKE3 in key-derivation mode from the shared secret and both public
//! keys, then used for AES-256-GCM over the big-endian `u64` plaintext.
//!
//! Wire layout: `version(1) || ephemeral_pubkey(32) || nonce(12) || ciphertext(8) || tag(16)`.
//! The version byte and ephemeral key are authenticated as associated data.

use std::{fmt, str::FromStr};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::{hex_serde, EncodingError};

pub const CODEC_VERSION: u8 = 1;
const KDF_CONTEXT: &str = "sbcredit field encryption v1";

const PUBKEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const PLAINTEXT_LEN: usize = 8;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + PUBKEY_LEN;

pub const ENCRYPTED_FIELD_LEN: usize = HEADER_LEN + NONCE_LEN + PLAINTEXT_LEN + TAG_LEN;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Tag mismatch, wrong key, unknown version or a degenerate ephemeral key.
    #[error("encrypted field failed integrity check")]
    Integrity,
    #[error("encrypted field has length {len}, expected {ENCRYPTED_FIELD_LEN}")]
    Malformed { len: usize },
    #[error("failed to seal field")]
    Seal,
}

/// Opaque ciphertext for one profile value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncryptedField(Vec<u8>);

impl EncryptedField {
    /// Wrap bytes received from storage or the wire. Length is checked on decrypt.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedField({} bytes)", self.0.len())
    }
}

impl FromStr for EncryptedField {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(trimmed)
            .map(Self)
            .map_err(|err| EncodingError::Hex(err.to_string()))
    }
}

hex_serde!(EncryptedField);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderPublicKey([u8; PUBKEY_LEN]);

impl HolderPublicKey {
    pub fn from_bytes(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }
}

impl fmt::Display for HolderPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for HolderPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HolderPublicKey({self})")
    }
}

impl FromStr for HolderPublicKey {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::decode_hex::<PUBKEY_LEN>(s).map(Self)
    }
}

hex_serde!(HolderPublicKey);

/// Holder's long-term decryption key. Zeroized on drop.
#[derive(Clone)]
pub struct HolderSecretKey(StaticSecret);

impl HolderSecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        crate::decode_hex::<32>(s.trim()).map(Self::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> HolderPublicKey {
        HolderPublicKey(PublicKey::from(&self.0).to_bytes())
    }
}

impl fmt::Debug for HolderSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HolderSecretKey(..)")
    }
}

#[derive(Clone, Debug)]
pub struct HolderKeypair {
    pub secret: HolderSecretKey,
    pub public: HolderPublicKey,
}

impl HolderKeypair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = HolderSecretKey(StaticSecret::random_from_rng(rng));
        let public = secret.public_key();
        Self { secret, public }
    }
}

pub fn encrypt<R: RngCore + CryptoRng>(
    recipient: &HolderPublicKey,
    value: u64,
    rng: &mut R,
) -> Result<EncryptedField, CodecError> {
    let ephemeral = EphemeralSecret::random_from_rng(&mut *rng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.0));
    if !shared.was_contributory() {
        return Err(CodecError::Seal);
    }

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), &recipient.0);

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let mut out = Vec::with_capacity(ENCRYPTED_FIELD_LEN);
    out.push(CODEC_VERSION);
    out.extend_from_slice(ephemeral_public.as_bytes());

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &value.to_be_bytes(),
                aad: &out[..HEADER_LEN],
            },
        )
        .map_err(|_| CodecError::Seal)?;

    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(EncryptedField(out))
}

pub fn decrypt(secret: &HolderSecretKey, field: &EncryptedField) -> Result<u64, CodecError> {
    let bytes = field.as_bytes();
    if bytes.len() != ENCRYPTED_FIELD_LEN {
        return Err(CodecError::Malformed { len: bytes.len() });
    }
    if bytes[0] != CODEC_VERSION {
        return Err(CodecError::Integrity);
    }

    let (header, rest) = bytes.split_at(HEADER_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let mut ephemeral = [0u8; PUBKEY_LEN];
    ephemeral.copy_from_slice(&header[1..]);

    let shared = secret.0.diffie_hellman(&PublicKey::from(ephemeral));
    if !shared.was_contributory() {
        return Err(CodecError::Integrity);
    }

    let recipient = PublicKey::from(&secret.0);
    let key = derive_key(shared.as_bytes(), &ephemeral, recipient.as_bytes());

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: header,
            },
        )
        .map_err(|_| CodecError::Integrity)?;

    let value: [u8; PLAINTEXT_LEN] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| CodecError::Malformed {
            len: plaintext.len(),
        })?;
    Ok(u64::from_be_bytes(value))
}

fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(0x5b_c0de)
    }

    #[test]
    fn round_trip_across_value_range() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        for value in [0, 1, 45, 3_100, 1_717_200_000, u64::MAX - 1, u64::MAX] {
            let sealed = encrypt(&keys.public, value, &mut rng).unwrap();
            assert_eq!(sealed.as_bytes().len(), ENCRYPTED_FIELD_LEN);
            assert_eq!(decrypt(&keys.secret, &sealed), Ok(value));
        }
    }

    #[test]
    fn encryption_is_randomized() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let first = encrypt(&keys.public, 45, &mut rng).unwrap();
        let second = encrypt(&keys.public, 45, &mut rng).unwrap();
        assert_ne!(first, second);
        assert_ne!(first.as_bytes()[1..HEADER_LEN], second.as_bytes()[1..HEADER_LEN]);
    }

    #[test]
    fn decryption_is_deterministic() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let sealed = encrypt(&keys.public, 3_100, &mut rng).unwrap();
        assert_eq!(decrypt(&keys.secret, &sealed), decrypt(&keys.secret, &sealed));
    }

    #[test]
    fn every_flipped_byte_is_an_integrity_error() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let sealed = encrypt(&keys.public, 45, &mut rng).unwrap();

        for idx in 0..ENCRYPTED_FIELD_LEN {
            let mut tampered = sealed.clone().into_bytes();
            tampered[idx] ^= 0x01;
            assert_eq!(
                decrypt(&keys.secret, &EncryptedField::from_bytes(tampered)),
                Err(CodecError::Integrity),
                "byte {idx}"
            );
        }
    }

    #[test]
    fn wrong_key_is_an_integrity_error() {
        let mut rng = rng();
        let holder = HolderKeypair::generate(&mut rng);
        let other = HolderKeypair::generate(&mut rng);
        let sealed = encrypt(&holder.public, 45, &mut rng).unwrap();
        assert_eq!(decrypt(&other.secret, &sealed), Err(CodecError::Integrity));
    }

    #[test]
    fn truncated_field_is_malformed() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let mut bytes = encrypt(&keys.public, 45, &mut rng).unwrap().into_bytes();
        bytes.pop();
        assert_eq!(
            decrypt(&keys.secret, &EncryptedField::from_bytes(bytes)),
            Err(CodecError::Malformed {
                len: ENCRYPTED_FIELD_LEN - 1
            })
        );
    }

    #[test]
    fn low_order_ephemeral_key_is_rejected() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let mut bytes = encrypt(&keys.public, 45, &mut rng).unwrap().into_bytes();
        // The all-zero point has small order; the shared secret is all zeros.
        bytes[1..HEADER_LEN].fill(0);
        assert_eq!(
            decrypt(&keys.secret, &EncryptedField::from_bytes(bytes)),
            Err(CodecError::Integrity)
        );
    }

    #[test]
    fn secret_key_hex_round_trip() {
        let keys = HolderKeypair::generate(&mut rng());
        let restored = HolderSecretKey::from_hex(&keys.secret.to_hex()).unwrap();
        assert_eq!(restored.public_key(), keys.public);
    }

    #[test]
    fn field_json_is_hex() {
        let mut rng = rng();
        let keys = HolderKeypair::generate(&mut rng);
        let sealed = encrypt(&keys.public, 7, &mut rng).unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        let back: EncryptedField = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn public_key_json_is_prefixed_hex() {
        let keys = HolderKeypair::generate(&mut rng());
        let json = serde_json::to_string(&keys.public).unwrap();
        assert_eq!(json, format!("\"{}\"", keys.public));
        assert!(json.starts_with("\"0x"));

        let back: HolderPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keys.public);
        assert!(serde_json::from_str::<HolderPublicKey>("\"0x1234\"").is_err());
    }
}
