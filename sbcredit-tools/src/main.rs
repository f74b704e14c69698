// sbcredit-tools/src/main.rs

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::OsRng;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sbcredit_circuit::DEFAULT_K;
use sbcredit_common::{
    artifacts::{
        load_prover_artifacts, load_verifier_artifacts, read_manifest, write_artifacts,
        ProverArtifacts,
    },
    codec::{HolderKeypair, HolderPublicKey, HolderSecretKey},
    prepare::{
        decrypt_profile, prepare_issuance, verify_opening, witness_from_record,
        AttestationRecord, IssuancePayload,
    },
    Address, ProofBundle, Profile,
};
use sbcredit_ledger::{AttestationLedger, EligibilityVerifier, LedgerConfig};
use sbcredit_prover::setup;

const DEFAULT_OUTPUT_DIR: &str = "artifacts";
const DEFAULT_MANIFEST_PATH: &str = "artifacts/manifest.json";

#[derive(Parser)]
#[command(
    name = "sbcredit-tools",
    about = "Artifact, key and ledger utilities for soulbound credit attestations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trusted setup and write params/vk/pk plus a manifest.
    GenParams(GenParamsArgs),
    /// Print metadata about params.bin based on the manifest path.
    DumpParams(DumpArgs),
    /// Print metadata about vk.bin based on the manifest path.
    DumpVk(DumpArgs),
    /// Generate a holder encryption key pair.
    Keygen(KeygenArgs),
    /// Commit to a profile and encrypt its fields for the holder.
    Prepare(PrepareArgs),
    /// Decrypt a ledger record with the holder's secret key.
    Decrypt(DecryptArgs),
    /// Operate on the attestation ledger configured through SBCREDIT_* variables.
    #[command(subcommand)]
    Ledger(LedgerCommand),
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// Issue a token from a prepared payload.
    Issue {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        payload_json: PathBuf,
    },
    /// Print the record stored for a token.
    Show {
        #[arg(long)]
        token_id: u64,
    },
    /// Print the token ids held by an address.
    Tokens {
        #[arg(long)]
        owner: Address,
    },
    /// Burn a token. Holder or issuer only.
    Revoke {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        token_id: u64,
    },
    /// Decrypt a token's record and write a prover witness for `threshold`.
    Witness {
        #[arg(long)]
        token_id: u64,
        #[arg(long)]
        secret_key: PathBuf,
        #[arg(long)]
        threshold: u64,
        #[arg(long)]
        output: PathBuf,
    },
    /// Verify a proof bundle against a token and record the proved threshold.
    Verify {
        #[arg(long)]
        token_id: u64,
        #[arg(long)]
        bundle_json: PathBuf,
    },
    /// Print the highest threshold an address has proved.
    Eligibility {
        #[arg(long)]
        owner: Address,
    },
}

#[derive(Args)]
struct GenParamsArgs {
    /// Circuit k parameter (log2 of circuit size).
    #[arg(long, default_value_t = DEFAULT_K as u32)]
    k: u32,
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

#[derive(Args)]
struct DumpArgs {
    #[arg(long, default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct KeygenArgs {
    /// File that receives the hex secret key.
    #[arg(long)]
    secret_out: PathBuf,
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct PrepareArgs {
    #[arg(long)]
    profile_json: PathBuf,
    /// Holder public key, 0x-prefixed hex.
    #[arg(long)]
    holder_key: HolderPublicKey,
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args)]
struct DecryptArgs {
    /// Ledger record as printed by `ledger show`.
    #[arg(long)]
    record_json: PathBuf,
    #[arg(long)]
    secret_key: PathBuf,
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sbcredit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::GenParams(args) => gen_params(args),
        Commands::DumpParams(args) => dump_params(args),
        Commands::DumpVk(args) => dump_vk(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Prepare(args) => prepare(args),
        Commands::Decrypt(args) => decrypt(args),
        Commands::Ledger(command) => ledger(command),
    }
}

fn gen_params(args: GenParamsArgs) -> Result<()> {
    info!(k = args.k, "running trusted setup, this may take a while");
    let params = setup(args.k).context("trusted setup failed")?;
    let manifest_path = write_artifacts(
        &args.output_dir,
        args.k,
        &params.params,
        &params.vk,
        &params.pk,
    )?;

    let manifest = read_manifest(&manifest_path)?;
    println!(
        "Generated artifacts for circuit v{} (k={}) at {}",
        manifest.circuit_version,
        manifest.k,
        args.output_dir.display()
    );
    println!("\nArtifact Summary:");
    for (name, file) in [
        ("params.bin", &manifest.params),
        ("vk.bin", &manifest.vk),
        ("pk.bin", &manifest.pk),
    ] {
        println!("  {name}: {} bytes, blake3: {}", file.size, file.blake3);
    }
    Ok(())
}

fn dump_params(args: DumpArgs) -> Result<()> {
    let artifacts = load_artifacts(&args.manifest)?;
    let summary = ParamsSummary {
        manifest_path: args.manifest.display().to_string(),
        circuit_version: artifacts.manifest.circuit_version,
        manifest_version: artifacts.manifest.manifest_version,
        params_hash: artifacts.manifest.params.blake3.clone(),
        params_size: artifacts.manifest.params.size,
        k: artifacts.manifest.k,
        n: 1u64 << artifacts.manifest.k,
    };
    output_summary(&summary, args.json)
}

fn dump_vk(args: DumpArgs) -> Result<()> {
    let artifacts = load_artifacts(&args.manifest)?;
    let cs = artifacts.vk.cs();
    let summary = VkSummary {
        manifest_path: args.manifest.display().to_string(),
        circuit_version: artifacts.manifest.circuit_version,
        manifest_version: artifacts.manifest.manifest_version,
        vk_hash: artifacts.manifest.vk.blake3.clone(),
        vk_size: artifacts.manifest.vk.size,
        num_instance_columns: cs.num_instance_columns(),
        num_advice_columns: cs.num_advice_columns(),
        num_fixed_columns: cs.num_fixed_columns(),
        num_selectors: cs.num_selectors(),
        num_gates: cs.gates().len(),
    };
    output_summary(&summary, args.json)
}

fn keygen(args: KeygenArgs) -> Result<()> {
    if args.secret_out.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.secret_out.display()
        );
    }
    let keys = HolderKeypair::generate(&mut OsRng);
    fs::write(&args.secret_out, keys.secret.to_hex())
        .with_context(|| format!("failed to write {}", args.secret_out.display()))?;
    println!("{}", keys.public);
    Ok(())
}

fn prepare(args: PrepareArgs) -> Result<()> {
    let profile: Profile = read_json(&args.profile_json)?;
    let payload = prepare_issuance(&profile, &args.holder_key, &mut OsRng)
        .context("failed to encrypt profile fields")?;
    info!(owner = %payload.owner, commitment = %payload.commitment, "prepared issuance payload");
    write_json(&args.output, &payload)
}

fn decrypt(args: DecryptArgs) -> Result<()> {
    let record: AttestationRecord = read_json(&args.record_json)?;
    let secret = read_secret_key(&args.secret_key)?;
    let profile = decrypt_profile(&secret, &record).context("failed to decrypt record")?;
    if !verify_opening(&profile, &record.commitment) {
        bail!("decrypted profile does not open commitment {}", record.commitment);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("owner: {}", profile.owner);
        println!("credit_score: {}", profile.credit_score);
        println!("income: {}", profile.income);
        println!("report_date: {}", profile.report_date);
    }
    Ok(())
}

fn ledger(command: LedgerCommand) -> Result<()> {
    let config = LedgerConfig::from_env()?;
    let ledger = AttestationLedger::from_config(&config)
        .with_context(|| format!("failed to open ledger at {}", config.db_path.display()))?;

    match command {
        LedgerCommand::Issue {
            caller,
            payload_json,
        } => {
            let payload: IssuancePayload = read_json(&payload_json)?;
            let token_id = ledger.issue_payload(caller, payload)?;
            ledger.store().flush()?;
            println!("{token_id}");
        }
        LedgerCommand::Show { token_id } => {
            let record = ledger.get_record(token_id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        LedgerCommand::Tokens { owner } => {
            for token_id in ledger.tokens_of(&owner)? {
                println!("{token_id}");
            }
        }
        LedgerCommand::Revoke { caller, token_id } => {
            ledger.revoke(caller, token_id)?;
            ledger.store().flush()?;
        }
        LedgerCommand::Witness {
            token_id,
            secret_key,
            threshold,
            output,
        } => {
            let record = ledger.get_record(token_id)?;
            let secret = read_secret_key(&secret_key)?;
            let witness = witness_from_record(&secret, &record, threshold)
                .context("failed to decrypt record")?;
            write_json(&output, &witness)?;
        }
        LedgerCommand::Verify {
            token_id,
            bundle_json,
        } => {
            let bundle: ProofBundle = read_json(&bundle_json)?;
            let artifacts = load_verifier_artifacts(&config.manifest_path).with_context(|| {
                format!(
                    "failed to load manifest {}",
                    config.manifest_path.display()
                )
            })?;
            let verifier = EligibilityVerifier::new(Arc::new(ledger), Arc::new(artifacts));
            let threshold = verifier.verify_and_record(&bundle, token_id)?;
            verifier.ledger().store().flush()?;
            println!("{threshold}");
        }
        LedgerCommand::Eligibility { owner } => {
            println!("{}", ledger.query_eligibility(&owner)?);
        }
    }
    Ok(())
}

fn read_secret_key(path: &Path) -> Result<HolderSecretKey> {
    let hex = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    HolderSecretKey::from_hex(&hex).context("secret key file is not 32 bytes of hex")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn load_artifacts(path: &Path) -> Result<ProverArtifacts> {
    load_prover_artifacts(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))
}

fn output_summary<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

#[derive(Serialize)]
struct ParamsSummary {
    manifest_path: String,
    circuit_version: u32,
    manifest_version: u32,
    params_hash: String,
    params_size: u64,
    k: u32,
    n: u64,
}

impl fmt::Display for ParamsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "manifest: {}", self.manifest_path)?;
        writeln!(f, "circuit_version: {}", self.circuit_version)?;
        writeln!(f, "manifest_version: {}", self.manifest_version)?;
        writeln!(f, "params_hash: {}", self.params_hash)?;
        writeln!(f, "params_size: {} bytes", self.params_size)?;
        writeln!(f, "k: {}", self.k)?;
        writeln!(f, "n: {}", self.n)
    }
}

#[derive(Serialize)]
struct VkSummary {
    manifest_path: String,
    circuit_version: u32,
    manifest_version: u32,
    vk_hash: String,
    vk_size: u64,
    num_instance_columns: usize,
    num_advice_columns: usize,
    num_fixed_columns: usize,
    num_selectors: usize,
    num_gates: usize,
}

impl fmt::Display for VkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "manifest: {}", self.manifest_path)?;
        writeln!(f, "circuit_version: {}", self.circuit_version)?;
        writeln!(f, "manifest_version: {}", self.manifest_version)?;
        writeln!(f, "vk_hash: {}", self.vk_hash)?;
        writeln!(f, "vk_size: {} bytes", self.vk_size)?;
        writeln!(f, "instance columns: {}", self.num_instance_columns)?;
        writeln!(f, "advice columns: {}", self.num_advice_columns)?;
        writeln!(f, "fixed columns: {}", self.num_fixed_columns)?;
        writeln!(f, "selectors: {}", self.num_selectors)?;
        writeln!(f, "gates: {}", self.num_gates)
    }
}
