// sbcredit-common/src/lib.rs

//! Shared types for the soulbound credit attestation workspace: addresses,
//! commitments, public signals, proof bundles and the field encodings that move
//! between the ledger, the prover and the verifier.

pub mod artifacts;
pub mod codec;
pub mod commitment;
pub mod prepare;

use std::{fmt, str::FromStr};

use halo2curves_axiom::{
    bn256::Fr,
    ff::{Field, PrimeField},
};
use sbcredit_circuit::{CreditCircuitInput, CreditProfileWitness, PublicInputs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sbcredit_circuit::ConstraintViolation;

pub const CIRCUIT_VERSION: u32 = 1;

/// Number of public signals a credit proof carries.
pub const PUBLIC_SIGNAL_COUNT: usize = 3;

pub const ADDRESS_LEN: usize = 20;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("value is not a canonical bn256 scalar")]
    NonCanonical,
    #[error("{label} does not fit in {bits} bits")]
    OutOfRange { label: &'static str, bits: usize },
    #[error("expected {expected} public signals, got {actual}")]
    Arity { expected: usize, actual: usize },
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], EncodingError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|err| EncodingError::Hex(err.to_string()))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| EncodingError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let s = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(<D::Error as ::serde::de::Error>::custom)
            }
        }
    };
}
pub(crate) use hex_serde;

/// 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// The address as a 160-bit big-endian integer in the scalar field.
    pub fn to_fr(&self) -> Fr {
        let mut padded = [0u8; 32];
        padded[32 - ADDRESS_LEN..].copy_from_slice(&self.0);
        reduce_be_bytes_to_fr(&padded)
    }

    /// Inverse of `to_fr`; rejects values wider than 160 bits.
    pub fn from_fr(value: &Fr) -> Result<Self, EncodingError> {
        let be = fr_to_be_bytes(value);
        Self::from_be_word(&be)
    }

    fn from_be_word(word: &[u8; 32]) -> Result<Self, EncodingError> {
        let (high, low) = word.split_at(32 - ADDRESS_LEN);
        if high.iter().any(|b| *b != 0) {
            return Err(EncodingError::OutOfRange {
                label: "owner",
                bits: ADDRESS_LEN * 8,
            });
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(low);
        Ok(Self(bytes))
    }

    fn to_be_word(self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[32 - ADDRESS_LEN..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<ADDRESS_LEN>(s).map(Self)
    }
}

hex_serde!(Address);

/// Poseidon commitment over a credit profile, stored as a canonical 32-byte
/// big-endian scalar.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn from_fr(value: &Fr) -> Self {
        Self(fr_to_be_bytes(value))
    }

    pub fn to_fr(&self) -> Fr {
        // Construction guarantees a canonical encoding.
        reduce_be_bytes_to_fr(&self.0)
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Result<Self, EncodingError> {
        fr_from_be_bytes(&bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({self})")
    }
}

impl FromStr for Commitment {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_be_bytes(decode_hex::<32>(s)?)
    }
}

hex_serde!(Commitment);

/// Plaintext credit profile. Never persisted by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub owner: Address,
    pub credit_score: u64,
    pub income: u64,
    pub report_date: u64,
}

/// Public signals of a credit proof, in instance column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    pub commitment: Commitment,
    pub owner: Address,
    pub threshold: u64,
}

impl PublicSignals {
    /// Parse a raw signal array of 32-byte big-endian words.
    ///
    /// Arity and per-signal widths are validated here so a malformed submission
    /// never reaches the pairing check.
    pub fn from_raw(raw: &[[u8; 32]]) -> Result<Self, EncodingError> {
        let [commitment, owner, threshold]: [[u8; 32]; PUBLIC_SIGNAL_COUNT] =
            raw.try_into().map_err(|_| EncodingError::Arity {
                expected: PUBLIC_SIGNAL_COUNT,
                actual: raw.len(),
            })?;

        let commitment = Commitment::from_be_bytes(commitment)?;
        let owner = Address::from_be_word(&owner)?;

        let (high, low) = threshold.split_at(24);
        if high.iter().any(|b| *b != 0) {
            return Err(EncodingError::OutOfRange {
                label: "threshold",
                bits: 64,
            });
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(low);

        Ok(Self {
            commitment,
            owner,
            threshold: u64::from_be_bytes(buf),
        })
    }

    pub fn to_raw(&self) -> [[u8; 32]; PUBLIC_SIGNAL_COUNT] {
        let mut threshold = [0u8; 32];
        threshold[24..].copy_from_slice(&self.threshold.to_be_bytes());
        [self.commitment.to_be_bytes(), self.owner.to_be_word(), threshold]
    }

    pub fn to_public_inputs(&self) -> PublicInputs {
        PublicInputs {
            commitment: self.commitment.to_fr(),
            owner: self.owner.to_fr(),
            threshold: self.threshold,
        }
    }

    pub fn instances(&self) -> Vec<Vec<Fr>> {
        sbcredit_circuit::public_instances(&self.to_public_inputs())
    }
}

/// Proof plus the signals it was generated for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub circuit_version: u32,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    pub public_signals: PublicSignals,
}

impl ProofBundle {
    pub fn new(proof: Vec<u8>, public_signals: PublicSignals) -> Self {
        Self {
            circuit_version: CIRCUIT_VERSION,
            proof,
            public_signals,
        }
    }
}

/// Everything the holder feeds into proof generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditWitness {
    pub profile: Profile,
    pub commitment: Commitment,
    pub threshold: u64,
}

impl CreditWitness {
    pub fn public_signals(&self) -> PublicSignals {
        PublicSignals {
            commitment: self.commitment,
            owner: self.profile.owner,
            threshold: self.threshold,
        }
    }

    pub fn to_circuit_input(&self) -> CreditCircuitInput {
        CreditCircuitInput {
            profile: CreditProfileWitness {
                owner: self.profile.owner.to_fr(),
                credit_score: self.profile.credit_score,
                income: self.profile.income,
                report_date: self.profile.report_date,
            },
            public: self.public_signals().to_public_inputs(),
        }
    }

    /// Evaluate the circuit's constraints natively.
    pub fn check(&self) -> Result<(), ConstraintViolation> {
        self.to_circuit_input().check_constraints()
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

pub fn fr_from_bytes(bytes: &[u8; 32]) -> Result<Fr, EncodingError> {
    Fr::from_bytes(bytes)
        .into_option()
        .ok_or(EncodingError::NonCanonical)
}

pub fn fr_to_bytes(fr: &Fr) -> [u8; 32] {
    let repr = fr.to_repr();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

pub fn fr_from_be_bytes(bytes: &[u8; 32]) -> Result<Fr, EncodingError> {
    let mut le = *bytes;
    le.reverse();
    fr_from_bytes(&le)
}

pub fn fr_to_be_bytes(fr: &Fr) -> [u8; 32] {
    let mut bytes = fr_to_bytes(fr);
    bytes.reverse();
    bytes
}

pub fn reduce_be_bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    let mut acc = Fr::ZERO;
    let base = Fr::from(256);
    for byte in bytes.iter() {
        acc = acc * base + Fr::from(*byte as u64);
    }
    acc
}
