//! On-disk form of an index snapshot.
//!
//! An index directory holds three artifacts that must agree:
//!
//! | File | Contents |
//! |------|----------|
//! | `index.bin` | similarity index: `DOCIDX1\0`, u32 dims, u64 rows, rows×dims LE f32 |
//! | `metadata.json` | ordered chunk records |
//! | `vectors.bin` | normalized vector table: `DOCVEC1\0`, same header and payload |
//!
//! [`save`] writes every artifact to a `*.tmp` sibling first, moves the
//! current artifacts aside to `*.bak`, then renames the new ones into place.
//! If any step fails the previous triple is restored. [`load`] treats a
//! missing directory, or a directory with none of the artifacts, as the
//! empty corpus; anything partially present or disagreeing is an
//! [`Error::Consistency`].

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use docent_core::embedding::{blob_to_vec, vec_to_blob};
use docent_core::index::IndexSnapshot;
use docent_core::models::Chunk;
use docent_core::vector::{FlatIpIndex, VectorTable};
use docent_core::{Error, Result};

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const VECTORS_FILE: &str = "vectors.bin";

const INDEX_MAGIC: &[u8; 8] = b"DOCIDX1\0";
const VECTORS_MAGIC: &[u8; 8] = b"DOCVEC1\0";
/// magic + u32 dims + u64 rows
const HEADER_LEN: usize = 8 + 4 + 8;

fn encode_table(magic: &[u8; 8], table: &VectorTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + table.as_slice().len() * 4);
    out.extend_from_slice(magic);
    out.extend_from_slice(&(table.dims() as u32).to_le_bytes());
    out.extend_from_slice(&(table.rows() as u64).to_le_bytes());
    out.extend_from_slice(&vec_to_blob(table.as_slice()));
    out
}

fn decode_table(magic: &[u8; 8], bytes: &[u8], file: &str) -> Result<VectorTable> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != magic {
        return Err(Error::Consistency(format!(
            "{} has an unrecognized header",
            file
        )));
    }
    let mut dims_raw = [0u8; 4];
    dims_raw.copy_from_slice(&bytes[8..12]);
    let mut rows_raw = [0u8; 8];
    rows_raw.copy_from_slice(&bytes[12..20]);
    let dims = u32::from_le_bytes(dims_raw) as usize;
    let rows = u64::from_le_bytes(rows_raw) as usize;

    let payload = &bytes[HEADER_LEN..];
    let expected = rows
        .checked_mul(dims)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::Consistency(format!("{} header is out of range", file)))?;
    if payload.len() != expected {
        return Err(Error::Consistency(format!(
            "{} declares {} rows of dimension {} ({} bytes) but holds {} bytes",
            file,
            rows,
            dims,
            expected,
            payload.len()
        )));
    }
    VectorTable::new(dims, blob_to_vec(payload))
}

fn artifact_paths(dir: &Path) -> [PathBuf; 3] {
    [
        dir.join(INDEX_FILE),
        dir.join(METADATA_FILE),
        dir.join(VECTORS_FILE),
    ]
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

/// Put the backed-up artifacts back and drop whatever was installed.
fn rollback(finals: &[PathBuf], backed_up: &[usize], installed: &[usize]) {
    for &i in installed {
        let _ = std::fs::remove_file(&finals[i]);
    }
    for &i in backed_up {
        if let Err(e) = std::fs::rename(backup_path(&finals[i]), &finals[i]) {
            warn!(path = %finals[i].display(), error = %e, "failed to restore index artifact");
        }
    }
}

fn discard(tmps: &[PathBuf]) {
    for t in tmps {
        let _ = std::fs::remove_file(t);
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::Consistency(format!("failed to read {}: {}", path.display(), e)))
}

/// Whether `dir` holds any of the three artifacts.
pub fn exists(dir: &Path) -> bool {
    artifact_paths(dir).iter().any(|p| p.exists())
}

/// Persist `snapshot` into `dir`, creating the directory if needed.
///
/// # Errors
///
/// [`Error::Consistency`] if the snapshot does not validate;
/// [`Error::Ingestion`] on any I/O failure. Either way the artifacts already
/// in `dir` are left as they were.
pub fn save(dir: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    save_with(dir, snapshot, |from, to| std::fs::rename(from, to))
}

fn save_with<F>(dir: &Path, snapshot: &IndexSnapshot, rename: F) -> Result<()>
where
    F: Fn(&Path, &Path) -> std::io::Result<()>,
{
    snapshot.validate()?;
    let io_err = |what: &str, path: &Path, e: std::io::Error| {
        Error::Ingestion(format!("failed to {} {}: {}", what, path.display(), e))
    };

    std::fs::create_dir_all(dir).map_err(|e| io_err("create", dir, e))?;

    let metadata = serde_json::to_vec_pretty(&snapshot.chunks)
        .map_err(|e| Error::Ingestion(format!("failed to serialize chunk metadata: {}", e)))?;
    let payloads = [
        encode_table(INDEX_MAGIC, snapshot.index.vectors()),
        metadata,
        encode_table(VECTORS_MAGIC, &snapshot.vectors),
    ];
    let finals = artifact_paths(dir);

    let mut written = Vec::with_capacity(3);
    for (path, bytes) in finals.iter().zip(payloads.iter()) {
        let tmp = tmp_path(path);
        if let Err(e) = std::fs::write(&tmp, bytes) {
            discard(&written);
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err("write", &tmp, e));
        }
        written.push(tmp);
    }

    let mut backed_up = Vec::with_capacity(3);
    for (i, path) in finals.iter().enumerate() {
        if !path.exists() {
            continue;
        }
        if let Err(e) = rename(path, &backup_path(path)) {
            rollback(&finals, &backed_up, &[]);
            discard(&written);
            return Err(io_err("back up", path, e));
        }
        backed_up.push(i);
    }

    let mut installed = Vec::with_capacity(3);
    for (i, (tmp, path)) in written.iter().zip(finals.iter()).enumerate() {
        if let Err(e) = rename(tmp, path) {
            rollback(&finals, &backed_up, &installed);
            discard(&written);
            return Err(io_err("replace", path, e));
        }
        installed.push(i);
    }

    for &i in &backed_up {
        let backup = backup_path(&finals[i]);
        if let Err(e) = std::fs::remove_file(&backup) {
            warn!(path = %backup.display(), error = %e, "failed to remove previous index artifact");
        }
    }

    info!(dir = %dir.display(), chunks = snapshot.len(), dims = snapshot.dims(), "index saved");
    Ok(())
}

/// Load the snapshot stored in `dir`.
///
/// When `expected_dims` is non-zero, a non-empty stored index must have that
/// dimensionality.
///
/// # Errors
///
/// [`Error::Consistency`] if only some artifacts exist, a header or payload
/// is malformed, the parts disagree on rows or dimension, or the dimension
/// differs from `expected_dims`.
pub fn load(dir: &Path, expected_dims: usize) -> Result<IndexSnapshot> {
    let paths = artifact_paths(dir);
    let present: Vec<bool> = paths.iter().map(|p| p.exists()).collect();
    if present.iter().all(|p| !p) {
        debug!(dir = %dir.display(), "no index found, starting empty");
        return Ok(IndexSnapshot::default());
    }
    if !present.iter().all(|p| *p) {
        let missing: Vec<String> = paths
            .iter()
            .zip(present.iter())
            .filter(|(_, p)| !**p)
            .map(|(path, _)| path.display().to_string())
            .collect();
        return Err(Error::Consistency(format!(
            "index directory {} is incomplete, missing: {}",
            dir.display(),
            missing.join(", ")
        )));
    }

    let index_table = decode_table(INDEX_MAGIC, &read_artifact(&paths[0])?, INDEX_FILE)?;
    let chunks: Vec<Chunk> = serde_json::from_slice(&read_artifact(&paths[1])?)
        .map_err(|e| Error::Consistency(format!("{} is malformed: {}", METADATA_FILE, e)))?;
    let vectors = decode_table(VECTORS_MAGIC, &read_artifact(&paths[2])?, VECTORS_FILE)?;

    let snapshot = IndexSnapshot {
        index: FlatIpIndex::build(index_table),
        chunks,
        vectors,
    };
    snapshot.validate()?;

    if expected_dims != 0 && !snapshot.is_empty() && snapshot.dims() != expected_dims {
        return Err(Error::Consistency(format!(
            "stored index has dimension {} but the embedding model produces {}",
            snapshot.dims(),
            expected_dims
        )));
    }

    info!(dir = %dir.display(), chunks = snapshot.len(), "index loaded");
    Ok(snapshot)
}
