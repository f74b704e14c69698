// sbcredit-common/src/prepare.rs

//! Issuance data preparation and the holder-side inverse.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, CodecError, EncryptedField, HolderPublicKey, HolderSecretKey},
    commitment::hash_profile,
    Address, Commitment, CreditWitness, Profile,
};

/// Everything the issuing authority submits to the ledger for one profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuancePayload {
    pub owner: Address,
    pub commitment: Commitment,
    pub enc_credit_score: EncryptedField,
    pub enc_income: EncryptedField,
    pub enc_report_date: EncryptedField,
}

/// Ledger entry for one soulbound token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub token_id: u64,
    pub owner: Address,
    pub commitment: Commitment,
    pub enc_credit_score: EncryptedField,
    pub enc_income: EncryptedField,
    pub enc_report_date: EncryptedField,
}

impl AttestationRecord {
    pub fn from_payload(token_id: u64, payload: IssuancePayload) -> Self {
        Self {
            token_id,
            owner: payload.owner,
            commitment: payload.commitment,
            enc_credit_score: payload.enc_credit_score,
            enc_income: payload.enc_income,
            enc_report_date: payload.enc_report_date,
        }
    }
}

pub fn prepare_issuance<R: RngCore + CryptoRng>(
    profile: &Profile,
    holder: &HolderPublicKey,
    rng: &mut R,
) -> Result<IssuancePayload, CodecError> {
    Ok(IssuancePayload {
        owner: profile.owner,
        commitment: hash_profile(profile),
        enc_credit_score: codec::encrypt(holder, profile.credit_score, rng)?,
        enc_income: codec::encrypt(holder, profile.income, rng)?,
        enc_report_date: codec::encrypt(holder, profile.report_date, rng)?,
    })
}

/// Recover the plaintext profile from a ledger record.
pub fn decrypt_profile(
    secret: &HolderSecretKey,
    record: &AttestationRecord,
) -> Result<Profile, CodecError> {
    Ok(Profile {
        owner: record.owner,
        credit_score: codec::decrypt(secret, &record.enc_credit_score)?,
        income: codec::decrypt(secret, &record.enc_income)?,
        report_date: codec::decrypt(secret, &record.enc_report_date)?,
    })
}

/// True when `profile` is the opening of `commitment`.
pub fn verify_opening(profile: &Profile, commitment: &Commitment) -> bool {
    hash_profile(profile) == *commitment
}

/// Decrypt a record and assemble the prover witness for `threshold`.
pub fn witness_from_record(
    secret: &HolderSecretKey,
    record: &AttestationRecord,
    threshold: u64,
) -> Result<CreditWitness, CodecError> {
    Ok(CreditWitness {
        profile: decrypt_profile(secret, record)?,
        commitment: record.commitment,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HolderKeypair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn profile() -> Profile {
        Profile {
            owner: Address::new([0xa1; 20]),
            credit_score: 45,
            income: 3_100,
            report_date: 1_717_200_000,
        }
    }

    #[test]
    fn prepared_payload_opens_to_profile() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let keys = HolderKeypair::generate(&mut rng);
        let payload = prepare_issuance(&profile(), &keys.public, &mut rng).unwrap();
        let record = AttestationRecord::from_payload(1, payload);

        let opened = decrypt_profile(&keys.secret, &record).unwrap();
        assert_eq!(opened, profile());
        assert!(verify_opening(&opened, &record.commitment));
    }

    #[test]
    fn altered_profile_does_not_open_commitment() {
        let commitment = hash_profile(&profile());
        let mut forged = profile();
        forged.credit_score = 55;
        assert!(!verify_opening(&forged, &commitment));
    }

    #[test]
    fn witness_from_record_respects_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let keys = HolderKeypair::generate(&mut rng);
        let payload = prepare_issuance(&profile(), &keys.public, &mut rng).unwrap();
        let record = AttestationRecord::from_payload(1, payload);

        let ok = witness_from_record(&keys.secret, &record, 40).unwrap();
        assert_eq!(ok.check(), Ok(()));

        let too_high = witness_from_record(&keys.secret, &record, 46).unwrap();
        assert!(too_high.check().is_err());
    }

    #[test]
    fn record_json_round_trip() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let keys = HolderKeypair::generate(&mut rng);
        let payload = prepare_issuance(&profile(), &keys.public, &mut rng).unwrap();
        let record = AttestationRecord::from_payload(9, payload);
        let json = serde_json::to_vec(&record).unwrap();
        let decoded: AttestationRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(decoded, record);
    }
}
