// sbcredit-circuit/src/gadgets/poseidon.rs

//! Poseidon parameters shared by the in-circuit gadget and the native hasher.
//!
//! Both sides hash with `halo2-base`'s fixed-length sponge over BN254 `Fr`. The
//! parameters below are the single source of truth; changing any of them changes
//! every commitment and requires new proving artifacts.

use halo2_base::{
    gates::flex_gate::GateChip,
    poseidon::hasher::{spec::OptimizedPoseidonSpec, PoseidonHasher},
    AssignedValue, Context,
};
use halo2curves_axiom::bn256::Fr;
use once_cell::sync::Lazy;

pub const POSEIDON_T: usize = 6;
pub const POSEIDON_RATE: usize = 5;
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Number of profile fields folded into a commitment.
pub const COMMITMENT_ARITY: usize = 4;

/// Hash the profile tuple in canonical order: owner, score, income, report date.
pub fn hash_commitment(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    owner: AssignedValue<Fr>,
    credit_score: AssignedValue<Fr>,
    income: AssignedValue<Fr>,
    report_date: AssignedValue<Fr>,
) -> AssignedValue<Fr> {
    hash_elements(ctx, gate, &[owner, credit_score, income, report_date])
}

pub fn hash_elements(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    inputs: &[AssignedValue<Fr>],
) -> AssignedValue<Fr> {
    let mut hasher = PoseidonHasher::<Fr, POSEIDON_T, POSEIDON_RATE>::new(
        OptimizedPoseidonSpec::new::<POSEIDON_FULL_ROUNDS, POSEIDON_PARTIAL_ROUNDS, 0>(),
    );
    hasher.initialize_consts(ctx, gate);
    hasher.hash_fix_len_array(ctx, gate, inputs)
}

static SPEC: Lazy<OptimizedPoseidonSpec<Fr, POSEIDON_T, POSEIDON_RATE>> =
    Lazy::new(|| OptimizedPoseidonSpec::new::<POSEIDON_FULL_ROUNDS, POSEIDON_PARTIAL_ROUNDS, 0>());

/// Cached spec used by the native permutation.
pub fn poseidon_spec() -> &'static OptimizedPoseidonSpec<Fr, POSEIDON_T, POSEIDON_RATE> {
    &SPEC
}
