//! Bundle archive assembly (§4.5 build protocol step 3, §6's archive
//! format): GZIP-compressed TAR, one entry per policy document plus a
//! distinguished `.manifest` entry, content-addressed by the SHA-256 of
//! the compressed bytes.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tar::{Builder, Header};

use bundle_service_core::domains::bundle::domain::model::PolicyDocument;
use bundle_service_core::domains::bundle::domain::service::build_manifest;

/// The assembled archive: compressed bytes, their hex-encoded SHA-256,
/// and the manifest that was embedded as the `.manifest` entry.
pub struct BuiltArchive {
    pub bytes: Vec<u8>,
    pub checksum: String,
    pub manifest: serde_json::Value,
}

/// Builds the TAR+GZIP archive for a bundle from its policy documents, in
/// the order given. Deterministic in content (not in timestamps — tar
/// headers carry a fixed mtime of 0 so two builds of the same inputs
/// produce byte-identical archives, matching §4.5's "idempotent w.r.t.
/// the (bundle_name, version) path" requirement as closely as gzip's own
/// framing allows).
pub fn build_archive(name: &str, version: &str, policies: &[PolicyDocument]) -> Result<BuiltArchive, shared_error::AppError> {
    let manifest = build_manifest(name, version, policies);
    let manifest_json = serde_json::to_value(&manifest)
        .map_err(|e| shared_error::AppError::Internal(format!("failed to serialize bundle manifest: {e}")))?;
    let manifest_bytes = serde_json::to_vec_pretty(&manifest_json)
        .map_err(|e| shared_error::AppError::Internal(format!("failed to serialize bundle manifest: {e}")))?;

    let gz_buf = Vec::new();
    let encoder = GzEncoder::new(gz_buf, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    for policy in policies {
        append_entry(&mut tar_builder, &policy.archive_filename(), policy.content.as_bytes())?;
    }
    append_entry(&mut tar_builder, ".manifest", &manifest_bytes)?;

    let encoder = tar_builder
        .into_inner()
        .map_err(|e| shared_error::AppError::Internal(format!("failed to finalize bundle tar stream: {e}")))?;
    let bytes = encoder
        .finish()
        .map_err(|e| shared_error::AppError::Internal(format!("failed to finalize bundle gzip stream: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let checksum = hex::encode(hasher.finalize());

    Ok(BuiltArchive { bytes, checksum, manifest: manifest_json })
}

fn append_entry<W: Write>(builder: &mut Builder<W>, name: &str, content: &[u8]) -> Result<(), shared_error::AppError> {
    let mut header = Header::new_gnu();
    header.set_path(name).map_err(|e| shared_error::AppError::Internal(format!("invalid archive entry name '{name}': {e}")))?;
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append(&header, content)
        .map_err(|e| shared_error::AppError::Internal(format!("failed to append '{name}' to bundle archive: {e}")))?;
    Ok(())
}

/// Verifies that `bytes`'s SHA-256 matches `expected_checksum`, for the
/// "bundle's stored checksum equals SHA-256 of the bytes at its storage
/// path" testable property (§8).
pub fn verify_checksum(bytes: &[u8], expected_checksum: &str) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize()) == expected_checksum
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_service_core::domains::bundle::domain::model::PolicyKind;
    use std::io::Read;

    fn sample_policy() -> PolicyDocument {
        PolicyDocument::new(
            None,
            "users-read".to_string(),
            None,
            "heimdall/authz/users".to_string(),
            PolicyKind::Rego,
            "package heimdall.authz.users\nallow = true".to_string(),
        )
    }

    #[test]
    fn checksum_matches_produced_bytes() {
        let archive = build_archive("checkout-policy", "1.0.0", &[sample_policy()]).unwrap();
        assert!(verify_checksum(&archive.bytes, &archive.checksum));
        assert!(!verify_checksum(&archive.bytes, "deadbeef"));
    }

    #[test]
    fn extracting_yields_exactly_the_manifest_listed_policies() {
        let policy = sample_policy();
        let archive = build_archive("checkout-policy", "1.0.0", std::slice::from_ref(&policy)).unwrap();

        let decoder = flate2::read::GzDecoder::new(&archive.bytes[..]);
        let mut tar = tar::Archive::new(decoder);
        let mut names = Vec::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            if path == ".manifest" {
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                let manifest: serde_json::Value = serde_json::from_str(&content).unwrap();
                assert_eq!(manifest["policies"], serde_json::json!([policy.archive_filename()]));
            } else {
                names.push(path);
            }
        }
        assert_eq!(names, vec![policy.archive_filename()]);
    }

    #[test]
    fn rebuilding_same_inputs_is_idempotent_in_content() {
        let policy = sample_policy();
        let a = build_archive("checkout-policy", "1.0.0", std::slice::from_ref(&policy)).unwrap();
        let b = build_archive("checkout-policy", "1.0.0", std::slice::from_ref(&policy)).unwrap();
        assert_eq!(a.checksum, b.checksum);
    }
}
