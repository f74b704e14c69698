// sbcredit-common/src/commitment.rs

use halo2curves_axiom::bn256::Fr;
use sbcredit_circuit::commitment_native;

use crate::{Commitment, Profile};

/// Commit to raw field inputs in canonical order.
pub fn commit_fields(owner: Fr, credit_score: u64, income: u64, report_date: u64) -> Fr {
    commitment_native(owner, credit_score, income, report_date)
}

pub fn hash_profile(profile: &Profile) -> Commitment {
    let digest = commit_fields(
        profile.owner.to_fr(),
        profile.credit_score,
        profile.income,
        profile.report_date,
    );
    Commitment::from_fr(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    fn profile() -> Profile {
        Profile {
            owner: Address::new([0x11; 20]),
            credit_score: 45,
            income: 3_100,
            report_date: 1_717_200_000,
        }
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_profile(&profile()), hash_profile(&profile()));
    }

    #[test]
    fn every_field_is_bound() {
        let base = hash_profile(&profile());
        let mutations: [fn(&mut Profile); 4] = [
            |p| p.owner = Address::new([0x12; 20]),
            |p| p.credit_score += 1,
            |p| p.income -= 1,
            |p| p.report_date += 86_400,
        ];
        for mutate in mutations {
            let mut changed = profile();
            mutate(&mut changed);
            assert_ne!(hash_profile(&changed), base);
        }
    }

    #[test]
    fn commitment_encoding_is_canonical() {
        let commitment = hash_profile(&profile());
        let reparsed = Commitment::from_be_bytes(commitment.to_be_bytes()).unwrap();
        assert_eq!(reparsed, commitment);
        assert_eq!(reparsed.to_fr(), commit_fields(
            profile().owner.to_fr(),
            45,
            3_100,
            1_717_200_000,
        ));
    }
}
