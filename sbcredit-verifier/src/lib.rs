// sbcredit-verifier/src/lib.rs

use anyhow::{ensure, Result};
use halo2_proofs_axiom::{
    plonk::{verify_proof, VerifyingKey},
    poly::kzg::{
        commitment::{KZGCommitmentScheme, ParamsKZG},
        multiopen::VerifierGWC,
        strategy::SingleStrategy,
    },
    transcript::{Blake2bRead, Challenge255, TranscriptReadBuffer},
};
use halo2curves_axiom::bn256::{Bn256, Fr, G1Affine};
use sbcredit_common::{
    artifacts::VerifierArtifacts, ProofBundle, PublicSignals, CIRCUIT_VERSION,
};
use tracing::debug;

pub fn verify(
    params: &ParamsKZG<Bn256>,
    vk: &VerifyingKey<G1Affine>,
    proof_bytes: &[u8],
    instances: &[Vec<Fr>],
) -> bool {
    let mut transcript = Blake2bRead::<_, G1Affine, Challenge255<_>>::init(proof_bytes);

    let instance_columns: Vec<&[Fr]> = instances.iter().map(|col| col.as_slice()).collect();
    let prepared_instances = vec![instance_columns.as_slice()];

    verify_proof::<KZGCommitmentScheme<Bn256>, VerifierGWC<'_, Bn256>, _, _, _>(
        params,
        vk,
        SingleStrategy::new(params),
        &prepared_instances,
        &mut transcript,
    )
    .is_ok()
}

pub fn verify_signals(
    artifacts: &VerifierArtifacts,
    proof_bytes: &[u8],
    signals: &PublicSignals,
) -> bool {
    let ok = verify(&artifacts.params, &artifacts.vk, proof_bytes, &signals.instances());
    debug!(owner = %signals.owner, threshold = signals.threshold, ok, "proof checked");
    ok
}

/// Check a bundle against the loaded artifacts. A bundle built for another circuit
/// version is an error rather than a failed verification.
pub fn verify_bundle(artifacts: &VerifierArtifacts, bundle: &ProofBundle) -> Result<bool> {
    ensure!(
        bundle.circuit_version == CIRCUIT_VERSION,
        "circuit version mismatch: bundle {} vs verifier {}",
        bundle.circuit_version,
        CIRCUIT_VERSION
    );
    Ok(verify_signals(artifacts, &bundle.proof, &bundle.public_signals))
}
