// sbcredit-prover/src/lib.rs

use halo2_proofs_axiom::{
    plonk::{self, create_proof, keygen_pk, keygen_vk},
    poly::kzg::{
        commitment::{KZGCommitmentScheme, ParamsKZG},
        multiopen::ProverGWC,
    },
    transcript::{Blake2bWrite, Challenge255, TranscriptWriterBuffer},
};
use halo2curves_axiom::bn256::{Bn256, Fr, G1Affine};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::{debug, info};

use sbcredit_circuit::CreditCircuit;
use sbcredit_common::{ConstraintViolation, CreditWitness, ProofBundle};

pub struct ProverParams {
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
    pub pk: plonk::ProvingKey<G1Affine>,
}

#[derive(Debug, Error)]
pub enum ProveError {
    /// The private inputs cannot satisfy the circuit; no proof is produced.
    #[error("constraint unsatisfied: {0}")]
    ConstraintUnsatisfied(#[from] ConstraintViolation),
    #[error("proving backend error: {0}")]
    Backend(String),
}

impl From<plonk::Error> for ProveError {
    fn from(err: plonk::Error) -> Self {
        ProveError::Backend(format!("{err:?}"))
    }
}

pub fn setup(k: u32) -> Result<ProverParams, ProveError> {
    setup_with_rng(k, OsRng)
}

/// Trusted setup with a caller-provided RNG. Only deterministic in tests.
pub fn setup_with_rng<R: RngCore>(k: u32, rng: R) -> Result<ProverParams, ProveError> {
    let params = ParamsKZG::<Bn256>::setup(k, rng);
    let empty_circuit = CreditCircuit::default();
    let vk = keygen_vk(&params, &empty_circuit)?;
    let pk = keygen_pk(&params, vk.clone(), &empty_circuit)?;
    info!(k, "generated proving and verifying keys");
    Ok(ProverParams { params, vk, pk })
}

/// Reject witnesses the circuit would not accept.
pub fn check_witness(witness: &CreditWitness) -> Result<(), ProveError> {
    witness.check().map_err(|violation| {
        debug!(%violation, "witness rejected before proving");
        ProveError::from(violation)
    })
}

pub fn prove(
    params: &ParamsKZG<Bn256>,
    pk: &plonk::ProvingKey<G1Affine>,
    witness: &CreditWitness,
) -> Result<Vec<u8>, ProveError> {
    check_witness(witness)?;
    create_proof_bytes(params, pk, witness)
}

pub fn prove_bundle(
    params: &ParamsKZG<Bn256>,
    pk: &plonk::ProvingKey<G1Affine>,
    witness: &CreditWitness,
) -> Result<ProofBundle, ProveError> {
    let proof = prove(params, pk, witness)?;
    let signals = witness.public_signals();
    info!(
        owner = %signals.owner,
        threshold = signals.threshold,
        proof_len = proof.len(),
        "credit proof generated"
    );
    Ok(ProofBundle::new(proof, signals))
}

fn create_proof_bytes(
    params: &ParamsKZG<Bn256>,
    pk: &plonk::ProvingKey<G1Affine>,
    witness: &CreditWitness,
) -> Result<Vec<u8>, ProveError> {
    let input = witness.to_circuit_input();
    let instance_slices = sbcredit_circuit::public_instances(&input.public);
    let instance_refs: Vec<&[Fr]> = instance_slices.iter().map(|col| col.as_slice()).collect();

    let circuit = CreditCircuit::new(Some(input));

    let mut transcript = Blake2bWrite::<_, G1Affine, Challenge255<_>>::init(vec![]);
    create_proof::<KZGCommitmentScheme<Bn256>, ProverGWC<'_, Bn256>, _, _, _, _>(
        params,
        pk,
        &[circuit],
        &[instance_refs.as_slice()],
        OsRng,
        &mut transcript,
    )?;
    Ok(transcript.finalize())
}
