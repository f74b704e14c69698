// sbcredit-prover/src/main.rs

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sbcredit_common::{artifacts::load_prover_artifacts, CreditWitness, ProofBundle};
use sbcredit_prover::prove_bundle;

#[derive(Parser)]
#[command(name = "sbcredit-prover", about = "Generate a credit threshold proof")]
struct Args {
    /// Holder witness: profile, commitment and threshold.
    #[arg(long)]
    witness_json: PathBuf,
    #[arg(long, default_value = "artifacts/manifest.json")]
    manifest: PathBuf,
    /// Where to write the proof bundle (proof + public signals + circuit version).
    #[arg(long)]
    bundle_json: PathBuf,
    /// Optional path to write the raw proof bytes.
    #[arg(long)]
    output_proof: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sbcredit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let json = fs::read_to_string(&args.witness_json)
        .with_context(|| format!("failed to read {}", args.witness_json.display()))?;
    let witness: CreditWitness =
        serde_json::from_str(&json).context("failed to parse witness json")?;

    let artifacts = load_prover_artifacts(&args.manifest)
        .with_context(|| format!("failed to load manifest {}", args.manifest.display()))?;
    let bundle = prove_bundle(&artifacts.params, &artifacts.pk, &witness)
        .context("proof generation failed")?;

    if let Some(path) = args.output_proof.as_ref() {
        fs::write(path, &bundle.proof)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    write_bundle_json(&args.bundle_json, &bundle)
}

fn write_bundle_json(path: &PathBuf, bundle: &ProofBundle) -> Result<()> {
    let json = serde_json::to_vec_pretty(bundle).context("failed to serialize proof bundle")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
