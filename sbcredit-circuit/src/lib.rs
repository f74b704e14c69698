// sbcredit-circuit/src/lib.rs

pub mod gadgets;
pub mod native;

use halo2_base::{
    gates::{
        circuit::builder::BaseCircuitBuilder,
        circuit::{BaseCircuitParams, BaseConfig, CircuitBuilderStage},
        range::RangeChip,
        RangeInstructions,
    },
    AssignedValue, Context,
};
use halo2_proofs_axiom::{
    circuit::{Layouter, SimpleFloorPlanner},
    plonk::{Circuit, ConstraintSystem, Error},
};
use halo2curves_axiom::{bn256::Fr, ff::PrimeField};
use once_cell::sync::Lazy;
use thiserror::Error;

pub use crate::native::commitment_native;

pub const DEFAULT_K: usize = 13;
const DEFAULT_LOOKUP_BITS: usize = 12;
pub const NUM_INSTANCE_COLUMNS: usize = 3;
const DEFAULT_ADVICE_PER_PHASE: usize = 4;
const DEFAULT_FIXED_COLUMNS: usize = 1;
const DEFAULT_LOOKUP_ADVICE_PER_PHASE: usize = 1;

/// Owners are 20-byte account addresses folded into the field.
pub const OWNER_BITS: usize = 160;
pub const VALUE_BITS: usize = 64;

/// Instance column order. Verifiers and provers must agree on it.
pub const INSTANCE_COMMITMENT: usize = 0;
pub const INSTANCE_OWNER: usize = 1;
pub const INSTANCE_THRESHOLD: usize = 2;

pub fn default_params() -> BaseCircuitParams {
    BaseCircuitParams {
        k: DEFAULT_K,
        num_advice_per_phase: vec![DEFAULT_ADVICE_PER_PHASE],
        num_fixed: DEFAULT_FIXED_COLUMNS,
        num_lookup_advice_per_phase: vec![DEFAULT_LOOKUP_ADVICE_PER_PHASE],
        lookup_bits: Some(DEFAULT_LOOKUP_BITS),
        num_instance_columns: NUM_INSTANCE_COLUMNS,
    }
}

/// Private profile values known only to the holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreditProfileWitness {
    pub owner: Fr,
    pub credit_score: u64,
    pub income: u64,
    pub report_date: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs {
    pub commitment: Fr,
    pub owner: Fr,
    pub threshold: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreditCircuitInput {
    pub profile: CreditProfileWitness,
    pub public: PublicInputs,
}

/// The first constraint a witness fails, evaluated natively.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConstraintViolation {
    #[error("owner does not fit in {OWNER_BITS} bits")]
    OwnerOutOfRange,
    #[error("private owner differs from the public owner")]
    OwnerMismatch,
    #[error("profile does not hash to the public commitment")]
    CommitmentMismatch,
    #[error("credit score {score} is below threshold {threshold}")]
    BelowThreshold { score: u64, threshold: u64 },
}

impl CreditCircuitInput {
    /// Native mirror of every constraint in `build_constraints`, in the same order.
    ///
    /// A witness that passes here satisfies the circuit; one that fails would only yield
    /// a proof no verifier accepts.
    pub fn check_constraints(&self) -> Result<(), ConstraintViolation> {
        let profile = &self.profile;
        let public = &self.public;

        if !fits_in_bits(&profile.owner, OWNER_BITS) {
            return Err(ConstraintViolation::OwnerOutOfRange);
        }
        if profile.owner != public.owner {
            return Err(ConstraintViolation::OwnerMismatch);
        }

        let recomputed = commitment_native(
            profile.owner,
            profile.credit_score,
            profile.income,
            profile.report_date,
        );
        if recomputed != public.commitment {
            return Err(ConstraintViolation::CommitmentMismatch);
        }

        if profile.credit_score < public.threshold {
            return Err(ConstraintViolation::BelowThreshold {
                score: profile.credit_score,
                threshold: public.threshold,
            });
        }

        Ok(())
    }
}

fn fits_in_bits(value: &Fr, bits: usize) -> bool {
    // Little-endian canonical representation.
    let repr = value.to_repr();
    let bytes = repr.as_ref();
    let full_bytes = bits / 8;
    bytes[full_bytes..].iter().all(|b| *b == 0)
}

#[derive(Clone, Debug)]
pub struct CreditCircuit {
    pub input: Option<CreditCircuitInput>,
    params: BaseCircuitParams,
}

impl Default for CreditCircuit {
    fn default() -> Self {
        Self {
            input: None,
            params: default_params(),
        }
    }
}

impl CreditCircuit {
    pub fn new(input: Option<CreditCircuitInput>) -> Self {
        Self {
            input,
            params: default_params(),
        }
    }
}

pub fn public_instances(public: &PublicInputs) -> Vec<Vec<Fr>> {
    let mut columns = vec![Vec::new(); NUM_INSTANCE_COLUMNS];
    columns[INSTANCE_COMMITMENT].push(public.commitment);
    columns[INSTANCE_OWNER].push(public.owner);
    columns[INSTANCE_THRESHOLD].push(Fr::from(public.threshold));
    columns
}

impl Circuit<Fr> for CreditCircuit {
    type Config = BaseConfig<Fr>;
    type FloorPlanner = SimpleFloorPlanner;
    type Params = BaseCircuitParams;

    fn params(&self) -> Self::Params {
        self.params.clone()
    }

    fn without_witnesses(&self) -> Self {
        Self {
            input: None,
            params: self.params.clone(),
        }
    }

    fn configure_with_params(
        meta: &mut ConstraintSystem<Fr>,
        params: Self::Params,
    ) -> Self::Config {
        BaseConfig::configure(meta, params)
    }

    fn configure(_: &mut ConstraintSystem<Fr>) -> Self::Config {
        unreachable!("CreditCircuit must be configured with explicit parameters")
    }

    fn synthesize(&self, config: Self::Config, layouter: impl Layouter<Fr>) -> Result<(), Error> {
        let stage = if self.input.is_some() {
            CircuitBuilderStage::Mock
        } else {
            CircuitBuilderStage::Keygen
        };

        let input = self.input.as_ref().unwrap_or(&SAMPLE_INPUT);

        let mut builder = BaseCircuitBuilder::<Fr>::from_stage(stage)
            .use_params(self.params.clone())
            .use_instance_columns(self.params.num_instance_columns);

        if let Some(bits) = self.params.lookup_bits {
            builder = builder.use_lookup_bits(bits);
        }

        build_constraints(&mut builder, input);
        <BaseCircuitBuilder<Fr> as Circuit<Fr>>::synthesize(&builder, config, layouter)
    }
}

/// Shape-only witness for key generation.
static SAMPLE_INPUT: Lazy<CreditCircuitInput> = Lazy::new(|| {
    let owner = Fr::from(0x5b_c0_ed_17u64);
    let (credit_score, income, report_date) = (700, 4_200, 1_700_000_000);
    CreditCircuitInput {
        profile: CreditProfileWitness {
            owner,
            credit_score,
            income,
            report_date,
        },
        public: PublicInputs {
            commitment: commitment_native(owner, credit_score, income, report_date),
            owner,
            threshold: 600,
        },
    }
});

fn build_constraints(builder: &mut BaseCircuitBuilder<Fr>, input: &CreditCircuitInput) {
    let range = builder.range_chip();
    let gate = range.gate();

    let profile = &input.profile;
    let pub_in = &input.public;

    let ctx = builder.main(0);

    let owner = assign_bounded(ctx, &range, profile.owner, OWNER_BITS);
    let credit_score = assign_u64(ctx, &range, profile.credit_score);
    let income = assign_u64(ctx, &range, profile.income);
    let report_date = assign_u64(ctx, &range, profile.report_date);

    let public_commitment = ctx.load_witness(pub_in.commitment);
    let public_owner = assign_bounded(ctx, &range, pub_in.owner, OWNER_BITS);
    let threshold = assign_u64(ctx, &range, pub_in.threshold);

    ctx.constrain_equal(&owner, &public_owner);

    let digest = crate::gadgets::poseidon::hash_commitment(
        ctx,
        gate,
        owner,
        credit_score,
        income,
        report_date,
    );
    ctx.constrain_equal(&digest, &public_commitment);

    crate::gadgets::compare::enforce_geq(ctx, gate, &range, credit_score, threshold);

    let mut exposed = [public_commitment; NUM_INSTANCE_COLUMNS];
    exposed[INSTANCE_OWNER] = public_owner;
    exposed[INSTANCE_THRESHOLD] = threshold;
    expose_public_inputs(builder, exposed);
}

fn assign_u64(ctx: &mut Context<Fr>, range: &RangeChip<Fr>, value: u64) -> AssignedValue<Fr> {
    assign_bounded(ctx, range, Fr::from(value), VALUE_BITS)
}

fn assign_bounded(
    ctx: &mut Context<Fr>,
    range: &RangeChip<Fr>,
    value: Fr,
    bits: usize,
) -> AssignedValue<Fr> {
    let cell = ctx.load_witness(value);
    range.range_check(ctx, cell, bits);
    cell
}

fn expose_public_inputs(
    builder: &mut BaseCircuitBuilder<Fr>,
    values: [AssignedValue<Fr>; NUM_INSTANCE_COLUMNS],
) {
    for (idx, value) in values.into_iter().enumerate() {
        builder.assigned_instances[idx].push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CreditCircuitInput {
        SAMPLE_INPUT.clone()
    }

    #[test]
    fn sample_input_satisfies_native_checks() {
        assert_eq!(sample().check_constraints(), Ok(()));
    }

    #[test]
    fn native_check_reports_low_score() {
        let mut input = sample();
        input.public.threshold = input.profile.credit_score + 1;
        assert!(matches!(
            input.check_constraints(),
            Err(ConstraintViolation::BelowThreshold { .. })
        ));
    }

    #[test]
    fn native_check_reports_owner_mismatch() {
        let mut input = sample();
        input.public.owner = Fr::from(1u64);
        assert_eq!(
            input.check_constraints(),
            Err(ConstraintViolation::OwnerMismatch)
        );
    }

    #[test]
    fn native_check_reports_wide_owner() {
        let mut input = sample();
        let wide = Fr::from_u128(1u128 << 100) * Fr::from_u128(1u128 << 100);
        input.profile.owner = wide;
        input.public.owner = wide;
        assert_eq!(
            input.check_constraints(),
            Err(ConstraintViolation::OwnerOutOfRange)
        );
    }

    #[test]
    fn equal_score_and_threshold_is_accepted() {
        let mut input = sample();
        input.public.threshold = input.profile.credit_score;
        assert_eq!(input.check_constraints(), Ok(()));
    }

    #[test]
    fn instances_follow_column_order() {
        let input = sample();
        let instances = public_instances(&input.public);
        assert_eq!(instances.len(), NUM_INSTANCE_COLUMNS);
        assert_eq!(instances[INSTANCE_COMMITMENT], vec![input.public.commitment]);
        assert_eq!(instances[INSTANCE_OWNER], vec![input.public.owner]);
        assert_eq!(
            instances[INSTANCE_THRESHOLD],
            vec![Fr::from(input.public.threshold)]
        );
    }
}
