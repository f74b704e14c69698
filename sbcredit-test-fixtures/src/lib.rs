// sbcredit-test-fixtures/src/lib.rs

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sbcredit_circuit::DEFAULT_K;
use sbcredit_common::{
    artifacts::{
        serialize_params, serialize_proving_key, serialize_verifying_key, write_artifacts,
        ArtifactFile, ArtifactManifest, ProverArtifacts, VerifierArtifacts, MANIFEST_VERSION,
        PARAMS_FILENAME, PK_FILENAME, VK_FILENAME,
    },
    codec::HolderKeypair,
    prepare::{prepare_issuance, IssuancePayload},
    Address, CreditWitness, ProofBundle, Profile, CIRCUIT_VERSION,
};
use sbcredit_prover::{prove_bundle, setup_with_rng, ProveError, ProverParams};

const CREATED_AT_UNIX: u64 = 1_700_000_000;
const SETUP_SEED: u64 = 0x5bc0_0001;
const HOLDER_SEED: u64 = 0x5bc0_0002;

pub const HOLDER: Address = Address::new([
    0xa1, 0x1c, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x01,
]);
pub const ISSUER: Address = Address::new([0x15; 20]);
pub const STRANGER: Address = Address::new([0x99; 20]);

pub const CREDIT_SCORE: u64 = 45;
pub const INCOME: u64 = 3_100;
pub const REPORT_DATE: u64 = 1_717_200_000;
pub const THRESHOLD: u64 = 40;

static FIXTURES: OnceCell<TestFixtures> = OnceCell::new();

/// Proving artifacts, a holder key pair, an issuance payload and a proof bundle
/// reused across crate tests. Setup is slow, so everything is built once.
pub struct TestFixtures {
    artifacts: Arc<ProverArtifacts>,
    verifier_artifacts: Arc<VerifierArtifacts>,
    holder_keys: HolderKeypair,
    payload: IssuancePayload,
    witness: CreditWitness,
    bundle: ProofBundle,
}

impl TestFixtures {
    pub fn artifacts(&self) -> Arc<ProverArtifacts> {
        Arc::clone(&self.artifacts)
    }

    pub fn verifier_artifacts(&self) -> Arc<VerifierArtifacts> {
        Arc::clone(&self.verifier_artifacts)
    }

    pub fn holder_keys(&self) -> &HolderKeypair {
        &self.holder_keys
    }

    pub fn profile(&self) -> &Profile {
        &self.witness.profile
    }

    /// Issuance payload for `profile()`, sealed to `holder_keys()`.
    pub fn payload(&self) -> &IssuancePayload {
        &self.payload
    }

    /// Witness for `profile()` at `THRESHOLD`.
    pub fn witness(&self) -> &CreditWitness {
        &self.witness
    }

    /// Proof bundle for `witness()`.
    pub fn bundle(&self) -> &ProofBundle {
        &self.bundle
    }

    pub fn prove(&self, witness: &CreditWitness) -> Result<ProofBundle, ProveError> {
        prove_bundle(&self.artifacts.params, &self.artifacts.pk, witness)
    }

    /// Write params, keys and manifest into `dir`; returns the manifest path.
    pub fn write_artifacts(&self, dir: &Path) -> Result<PathBuf> {
        write_artifacts(
            dir,
            self.artifacts.manifest.k,
            &self.artifacts.params,
            &self.artifacts.vk,
            &self.artifacts.pk,
        )
    }
}

pub fn sample_profile() -> Profile {
    Profile {
        owner: HOLDER,
        credit_score: CREDIT_SCORE,
        income: INCOME,
        report_date: REPORT_DATE,
    }
}

/// Deterministic RNG for tests that need their own randomness.
pub fn test_rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

/// Return lazily constructed test fixtures shared across crates.
pub fn fixtures() -> &'static TestFixtures {
    FIXTURES.get_or_init(|| build_fixtures().expect("failed to build sbcredit test fixtures"))
}

fn build_fixtures() -> Result<TestFixtures> {
    let k = DEFAULT_K as u32;
    let ProverParams { params, vk, pk } =
        setup_with_rng(k, test_rng(SETUP_SEED)).context("trusted setup")?;

    let params_bytes = serialize_params(&params).context("serialize params")?;
    let vk_bytes = serialize_verifying_key(&vk).context("serialize vk")?;
    let pk_bytes = serialize_proving_key(&pk).context("serialize pk")?;

    let manifest = ArtifactManifest {
        manifest_version: MANIFEST_VERSION,
        circuit_version: CIRCUIT_VERSION,
        k,
        created_at_unix: CREATED_AT_UNIX,
        params: ArtifactFile::from_bytes(PARAMS_FILENAME, &params_bytes),
        vk: ArtifactFile::from_bytes(VK_FILENAME, &vk_bytes),
        pk: ArtifactFile::from_bytes(PK_FILENAME, &pk_bytes),
    };
    let artifacts = ProverArtifacts {
        manifest,
        params,
        vk,
        pk,
    };

    let mut rng = test_rng(HOLDER_SEED);
    let holder_keys = HolderKeypair::generate(&mut rng);
    let profile = sample_profile();
    let payload =
        prepare_issuance(&profile, &holder_keys.public, &mut rng).context("seal profile")?;

    let witness = CreditWitness {
        profile,
        commitment: payload.commitment,
        threshold: THRESHOLD,
    };
    let bundle = prove_bundle(&artifacts.params, &artifacts.pk, &witness)
        .context("prove fixture witness")?;

    Ok(TestFixtures {
        verifier_artifacts: Arc::new(artifacts.verifier_artifacts()),
        artifacts: Arc::new(artifacts),
        holder_keys,
        payload,
        witness,
        bundle,
    })
}
