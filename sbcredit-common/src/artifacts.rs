// sbcredit-common/src/artifacts.rs

//! KZG parameters, keys and the manifest that pins them by BLAKE3 hash.

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{ensure, Context, Result};
use halo2_proofs_axiom::{
    plonk::{self, Circuit},
    poly::{commitment::Params, kzg::commitment::ParamsKZG},
    SerdeFormat,
};
use halo2curves_axiom::bn256::{Bn256, G1Affine};
use sbcredit_circuit::CreditCircuit;
use serde::{Deserialize, Serialize};

use crate::CIRCUIT_VERSION;

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const PARAMS_FILENAME: &str = "params.bin";
pub const VK_FILENAME: &str = "vk.bin";
pub const PK_FILENAME: &str = "pk.bin";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub blake3: String,
    pub size: u64,
}

impl ArtifactFile {
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            blake3: hash_bytes_hex(bytes),
            size: bytes.len() as u64,
        }
    }

    fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub manifest_version: u32,
    pub circuit_version: u32,
    pub k: u32,
    pub created_at_unix: u64,
    pub params: ArtifactFile,
    pub vk: ArtifactFile,
    pub pk: ArtifactFile,
}

/// Read-only material a verifier needs. Loaded once and shared.
#[derive(Clone, Debug)]
pub struct VerifierArtifacts {
    pub manifest: ArtifactManifest,
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
}

#[derive(Clone, Debug)]
pub struct ProverArtifacts {
    pub manifest: ArtifactManifest,
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
    pub pk: plonk::ProvingKey<G1Affine>,
}

impl ProverArtifacts {
    pub fn verifier_artifacts(&self) -> VerifierArtifacts {
        VerifierArtifacts {
            manifest: self.manifest.clone(),
            params: self.params.clone(),
            vk: self.vk.clone(),
        }
    }
}

pub fn serialize_params(params: &ParamsKZG<Bn256>) -> Result<Vec<u8>> {
    let mut buf = vec![];
    params
        .write(&mut buf)
        .context("failed to serialize KZG params")?;
    Ok(buf)
}

pub fn deserialize_params(bytes: &[u8]) -> Result<ParamsKZG<Bn256>> {
    let mut reader = Cursor::new(bytes);
    ParamsKZG::<Bn256>::read(&mut reader).context("failed to deserialize KZG params")
}

pub fn serialize_verifying_key(vk: &plonk::VerifyingKey<G1Affine>) -> Result<Vec<u8>> {
    let mut buf = vec![];
    vk.write(&mut buf, SerdeFormat::Processed)
        .context("failed to serialize verifying key")?;
    Ok(buf)
}

pub fn deserialize_verifying_key(bytes: &[u8]) -> Result<plonk::VerifyingKey<G1Affine>> {
    let params = CreditCircuit::default().params();
    let mut reader = Cursor::new(bytes);
    plonk::VerifyingKey::read::<_, CreditCircuit>(&mut reader, SerdeFormat::Processed, params)
        .context("failed to deserialize verifying key")
}

pub fn serialize_proving_key(pk: &plonk::ProvingKey<G1Affine>) -> Result<Vec<u8>> {
    let mut buf = vec![];
    pk.write(&mut buf, SerdeFormat::Processed)
        .context("failed to serialize proving key")?;
    Ok(buf)
}

pub fn deserialize_proving_key(bytes: &[u8]) -> Result<plonk::ProvingKey<G1Affine>> {
    let params = CreditCircuit::default().params();
    let mut reader = Cursor::new(bytes);
    plonk::ProvingKey::read::<_, CreditCircuit>(&mut reader, SerdeFormat::Processed, params)
        .context("failed to deserialize proving key")
}

pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn write_manifest(path: impl AsRef<Path>, manifest: &ArtifactManifest) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(path.as_ref(), json).context("failed to write manifest")
}

pub fn read_manifest(path: impl AsRef<Path>) -> Result<ArtifactManifest> {
    let bytes = fs::read(path.as_ref()).context("failed to read manifest file")?;
    serde_json::from_slice(&bytes).context("failed to parse manifest json")
}

/// Serialize params and keys into `output_dir` and write a manifest next to them.
/// Returns the manifest path.
pub fn write_artifacts(
    output_dir: impl AsRef<Path>,
    k: u32,
    params: &ParamsKZG<Bn256>,
    vk: &plonk::VerifyingKey<G1Affine>,
    pk: &plonk::ProvingKey<G1Affine>,
) -> Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let params_bytes = serialize_params(params)?;
    let vk_bytes = serialize_verifying_key(vk)?;
    let pk_bytes = serialize_proving_key(pk)?;

    write_binary(&output_dir.join(PARAMS_FILENAME), &params_bytes)?;
    write_binary(&output_dir.join(VK_FILENAME), &vk_bytes)?;
    write_binary(&output_dir.join(PK_FILENAME), &pk_bytes)?;

    let manifest = ArtifactManifest {
        manifest_version: MANIFEST_VERSION,
        circuit_version: CIRCUIT_VERSION,
        k,
        created_at_unix: current_unix_timestamp(),
        params: ArtifactFile::from_bytes(PARAMS_FILENAME, &params_bytes),
        vk: ArtifactFile::from_bytes(VK_FILENAME, &vk_bytes),
        pk: ArtifactFile::from_bytes(PK_FILENAME, &pk_bytes),
    };

    let manifest_path = output_dir.join(MANIFEST_FILE);
    write_manifest(&manifest_path, &manifest)?;
    Ok(manifest_path)
}

pub fn load_verifier_artifacts(path: impl AsRef<Path>) -> Result<VerifierArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest)?;
    let base_dir = manifest_dir(manifest_path);

    let params_bytes = read_artifact_file(&base_dir, &manifest.params, "params")?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;

    Ok(VerifierArtifacts {
        params: deserialize_params(&params_bytes)?,
        vk: deserialize_verifying_key(&vk_bytes)?,
        manifest,
    })
}

pub fn load_prover_artifacts(path: impl AsRef<Path>) -> Result<ProverArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest)?;
    let base_dir = manifest_dir(manifest_path);

    let params_bytes = read_artifact_file(&base_dir, &manifest.params, "params")?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;
    let pk_bytes = read_artifact_file(&base_dir, &manifest.pk, "proving key")?;

    Ok(ProverArtifacts {
        params: deserialize_params(&params_bytes)?,
        vk: deserialize_verifying_key(&vk_bytes)?,
        pk: deserialize_proving_key(&pk_bytes)?,
        manifest,
    })
}

fn read_artifact_file(base_dir: &Path, entry: &ArtifactFile, label: &str) -> Result<Vec<u8>> {
    let path = entry.resolve_path(base_dir);
    let bytes = fs::read(&path)
        .with_context(|| format!("failed to read {} at {}", label, path.display()))?;
    ensure!(
        bytes.len() as u64 == entry.size,
        "{} size mismatch, manifest recorded {} bytes but found {}",
        label,
        entry.size,
        bytes.len(),
    );
    ensure_hash(&bytes, &entry.blake3, label)?;
    Ok(bytes)
}

fn ensure_hash(bytes: &[u8], expected_hex: &str, label: &str) -> Result<()> {
    let actual = hash_bytes_hex(bytes);
    ensure!(
        actual == expected_hex,
        "{} hash mismatch, expected {} but computed {}",
        label,
        expected_hex,
        actual
    );
    Ok(())
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn ensure_manifest_compat(manifest: &ArtifactManifest) -> Result<()> {
    ensure!(
        manifest.manifest_version == MANIFEST_VERSION,
        "unsupported manifest version {}, expected {}",
        manifest.manifest_version,
        MANIFEST_VERSION
    );
    ensure!(
        manifest.circuit_version == CIRCUIT_VERSION,
        "circuit version mismatch: manifest {} vs crate {}",
        manifest.circuit_version,
        CIRCUIT_VERSION
    );
    Ok(())
}

fn write_binary(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with(entry: ArtifactFile) -> ArtifactManifest {
        ArtifactManifest {
            manifest_version: MANIFEST_VERSION,
            circuit_version: CIRCUIT_VERSION,
            k: 13,
            created_at_unix: 0,
            params: entry.clone(),
            vk: entry.clone(),
            pk: entry,
        }
    }

    #[test]
    fn artifact_file_records_hash_and_size() {
        let entry = ArtifactFile::from_bytes("params.bin", b"abc");
        assert_eq!(entry.size, 3);
        assert_eq!(entry.blake3, blake3::hash(b"abc").to_hex().to_string());
    }

    #[test]
    fn manifest_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let manifest = manifest_with(ArtifactFile::from_bytes(PARAMS_FILENAME, b"params"));
        write_manifest(&path, &manifest).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), manifest);
    }

    #[test]
    fn tampered_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let entry = ArtifactFile::from_bytes(PARAMS_FILENAME, b"params");
        fs::write(dir.path().join(PARAMS_FILENAME), b"paramz").unwrap();
        let err = read_artifact_file(dir.path(), &entry, "params").unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn truncated_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let entry = ArtifactFile::from_bytes(PARAMS_FILENAME, b"params");
        fs::write(dir.path().join(PARAMS_FILENAME), b"param").unwrap();
        let err = read_artifact_file(dir.path(), &entry, "params").unwrap_err();
        assert!(err.to_string().contains("size mismatch"));
    }

    #[test]
    fn foreign_circuit_version_is_rejected() {
        let mut manifest = manifest_with(ArtifactFile::from_bytes(PARAMS_FILENAME, b""));
        manifest.circuit_version = CIRCUIT_VERSION + 1;
        assert!(ensure_manifest_compat(&manifest).is_err());
    }
}
