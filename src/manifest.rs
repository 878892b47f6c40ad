//! Artifact manifest loading and validation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::PipelineError;
use crate::types::ArtifactSpec;

/// On-disk manifest shapes: either a `url -> digest` object or a list of
/// artifact entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Table(BTreeMap<String, String>),
    List(Vec<ArtifactSpec>),
}

/// Built-in artifact table: the LLVM/Clang release tarballs this tool was
/// written to mirror. Used when no manifest file is supplied.
const DEFAULT_ARTIFACTS: &[(&str, &str)] = &[
    (
        "https://github.com/llvm/llvm-project/releases/download/llvmorg-14.0.0/clang+llvm-14.0.0-x86_64-linux-gnu-ubuntu-18.04.tar.xz",
        "61582215dafafb7b576ea30cc136be92c877ba1f1c31ddbbd372d6d65622fef5",
    ),
    (
        "https://github.com/llvm/llvm-project/releases/download/llvmorg-13.0.0/clang+llvm-13.0.0-x86_64-linux-gnu-ubuntu-16.04.tar.xz",
        "76d0bf002ede7a893f69d9ad2c4e101d15a8f4186fbfe24e74856c8449acd7c1",
    ),
];

/// The built-in artifact table.
pub fn default_artifacts() -> Vec<ArtifactSpec> {
    DEFAULT_ARTIFACTS
        .iter()
        .map(|(url, digest)| ArtifactSpec {
            url: (*url).to_string(),
            expected_sha256: (*digest).to_string(),
        })
        .collect()
}

/// Loads an artifact manifest from a JSON file.
///
/// The file is either a single JSON object mapping source URL to expected
/// SHA-256 digest:
///
/// ```json
/// { "https://example.com/pkg.tar.xz": "61582215dafa…" }
/// ```
///
/// or a list of `{ "url": …, "expected_sha256": … }` entries. Every entry is
/// validated (http/https URL, 64 hex chars) and digests are normalized to
/// lowercase; the object form comes back sorted by URL so runs are
/// deterministic. Any defect is fatal to the whole run.
pub async fn load_manifest(path: &Path) -> Result<Vec<ArtifactSpec>, PipelineError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::Manifest(format!("cannot read {}: {}", path.display(), e))
    })?;

    let manifest: ManifestFile = serde_json::from_str(&contents).map_err(|e| {
        PipelineError::Manifest(format!(
            "{} is not a url -> sha256 object or entry list: {}",
            path.display(),
            e
        ))
    })?;

    let entries: Vec<(String, String)> = match manifest {
        ManifestFile::Table(table) => table.into_iter().collect(),
        ManifestFile::List(list) => list
            .into_iter()
            .map(|spec| (spec.url, spec.expected_sha256))
            .collect(),
    };

    if entries.is_empty() {
        return Err(PipelineError::Manifest(format!(
            "{} lists no artifacts",
            path.display()
        )));
    }

    entries
        .into_iter()
        .map(|(url, digest)| validate_entry(&url, &digest))
        .collect()
}

fn validate_entry(url: &str, digest: &str) -> Result<ArtifactSpec, PipelineError> {
    let parsed =
        Url::parse(url).map_err(|e| PipelineError::Manifest(format!("bad url {}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::Manifest(format!(
            "unsupported scheme in {}",
            url
        )));
    }

    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(PipelineError::Manifest(format!(
            "digest for {} is not 64 hex chars: {:?}",
            url, digest
        )));
    }

    Ok(ArtifactSpec {
        url: url.to_string(),
        expected_sha256: digest.to_ascii_lowercase(),
    })
}
