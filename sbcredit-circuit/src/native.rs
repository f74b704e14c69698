// sbcredit-circuit/src/native.rs

//! Out-of-circuit Poseidon that reproduces `PoseidonHasher::hash_fix_len_array`
//! cell for cell, so commitments computed by the data preparer match the value the
//! circuit recomputes from the private witness.

use halo2_base::poseidon::hasher::spec::OptimizedPoseidonSpec;
use halo2curves_axiom::{
    bn256::Fr,
    ff::{Field, PrimeField},
};

use crate::gadgets::poseidon::{poseidon_spec, POSEIDON_RATE, POSEIDON_T};

/// Capacity element of the fixed-length sponge domain.
const FIX_LEN_CAPACITY: u128 = 1u128 << 64;

/// Native commitment over the canonical profile tuple.
pub fn commitment_native(owner: Fr, credit_score: u64, income: u64, report_date: u64) -> Fr {
    poseidon_hash(&[
        owner,
        Fr::from(credit_score),
        Fr::from(income),
        Fr::from(report_date),
    ])
}

pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    let spec = poseidon_spec();
    let mut state = [Fr::ZERO; POSEIDON_T];
    state[0] = Fr::from_u128(FIX_LEN_CAPACITY);

    for chunk in inputs.chunks(POSEIDON_RATE) {
        permute(&mut state, chunk, spec);
    }

    if inputs.len() % POSEIDON_RATE == 0 {
        permute(&mut state, &[], spec);
    }

    state[1]
}

fn permute(
    state: &mut [Fr; POSEIDON_T],
    inputs: &[Fr],
    spec: &OptimizedPoseidonSpec<Fr, POSEIDON_T, POSEIDON_RATE>,
) {
    let r_f = spec.r_f() / 2;
    let constants = spec.constants();
    let matrices = spec.mds_matrices();
    let start = constants.start();

    absorb(state, inputs, &start[0]);

    for coeffs in start.iter().skip(1).take(r_f - 1) {
        sbox_full(state, coeffs);
        apply_mds(state, matrices.mds().as_ref());
    }

    if let Some(last) = start.last() {
        sbox_full(state, last);
    }
    apply_mds(state, matrices.pre_sparse_mds().as_ref());

    for (constant, sparse) in constants
        .partial()
        .iter()
        .zip(matrices.sparse_matrices().iter())
    {
        sbox_part(state, constant);
        apply_sparse_mds(state, sparse.row(), sparse.col_hat());
    }

    for coeffs in constants.end().iter() {
        sbox_full(state, coeffs);
        apply_mds(state, matrices.mds().as_ref());
    }

    sbox_full(state, &[Fr::ZERO; POSEIDON_T]);
    apply_mds(state, matrices.mds().as_ref());
}

// Inputs are added together with the first round constants; the slot right after
// the last input receives the sponge padding `1`.
fn absorb(state: &mut [Fr; POSEIDON_T], inputs: &[Fr], pre_constants: &[Fr; POSEIDON_T]) {
    debug_assert!(inputs.len() < POSEIDON_T);

    state[0] += pre_constants[0];
    for (idx, input) in inputs.iter().enumerate() {
        state[idx + 1] += *input + pre_constants[idx + 1];
    }

    let offset = inputs.len() + 1;
    for (i, idx) in (offset..POSEIDON_T).enumerate() {
        let mut addend = pre_constants[idx];
        if i == 0 {
            addend += Fr::ONE;
        }
        state[idx] += addend;
    }
}

fn sbox_full(state: &mut [Fr; POSEIDON_T], constants: &[Fr; POSEIDON_T]) {
    for (value, constant) in state.iter_mut().zip(constants.iter()) {
        *value = value.pow_vartime([5]) + constant;
    }
}

fn sbox_part(state: &mut [Fr; POSEIDON_T], constant: &Fr) {
    state[0] = state[0].pow_vartime([5]) + constant;
}

fn apply_mds(state: &mut [Fr; POSEIDON_T], matrix: &[[Fr; POSEIDON_T]; POSEIDON_T]) {
    let current = *state;
    let mut next = [Fr::ZERO; POSEIDON_T];
    for (i, row) in matrix.iter().enumerate() {
        next[i] = row
            .iter()
            .zip(current.iter())
            .fold(Fr::ZERO, |acc, (coeff, value)| acc + *coeff * *value);
    }
    *state = next;
}

fn apply_sparse_mds(
    state: &mut [Fr; POSEIDON_T],
    row: &[Fr; POSEIDON_T],
    col_hat: &[Fr; POSEIDON_RATE],
) {
    let current = *state;
    let mut next = [Fr::ZERO; POSEIDON_T];

    next[0] = row
        .iter()
        .zip(current.iter())
        .fold(Fr::ZERO, |acc, (coeff, value)| acc + *coeff * *value);

    for (i, (coeff, value)) in col_hat.iter().zip(current.iter().skip(1)).enumerate() {
        next[i + 1] = current[0] * *coeff + *value;
    }

    *state = next;
}
