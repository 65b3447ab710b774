// Single-item transfer: download one remote file (plus an optional JSON
// sidecar with its raw record) or upload one local file.
//
// Local file names embed a microsecond timestamp and the remote id, so
// re-running a download never overwrites an earlier copy.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::DriveClient;
use crate::error::{Error, Result};
use crate::model::RemoteEntry;

pub const SIDECAR_SUFFIX: &str = "_metadata.json";

/// Keep only ASCII letters, digits and dots.
pub fn sanitise(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect()
}

/// Timestamp prefix for generated local names, e.g. `20240301T10_15_42.123456`.
pub fn transfer_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%dT%H_%M_%S%.6f").to_string()
}

/// `<stamp>-<id>-<sanitised name>`
pub fn local_file_name(stamp: &str, id: &str, remote_name: &str) -> String {
    format!("{stamp}-{id}-{}", sanitise(remote_name))
}

/// Sidecar path for a downloaded file: the file path plus `_metadata.json`.
pub fn sidecar_path(file_path: &Path) -> PathBuf {
    let mut s = file_path.as_os_str().to_owned();
    s.push(SIDECAR_SUFFIX);
    PathBuf::from(s)
}

/// Create `dir` and any missing parents; an existing directory is fine.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| Error::local_io(dir, e))
}

/// Write a record as pretty JSON.
pub fn write_sidecar(path: &Path, record: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(record)
        .map_err(|e| Error::Malformed(format!("cannot serialise record: {e}")))?;
    fs::write(path, text).map_err(|e| Error::local_io(path, e))
}

#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub store_metadata: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            store_metadata: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
    pub sidecar: Option<PathBuf>,
}

/// Download item `id` into `dest_dir`.
pub fn download_item<C: DriveClient + ?Sized>(
    client: &C,
    id: &str,
    dest_dir: &Path,
    opts: TransferOptions,
) -> Result<Downloaded> {
    info!(id, "retrieving item data");
    let item = client.get_metadata(id)?;
    let stamp = transfer_stamp(Local::now());

    ensure_dir(dest_dir)?;

    let path = dest_dir.join(local_file_name(&stamp, id, &item.name));
    info!(
        name = %item.name,
        id = %item.id,
        dest = %path.display(),
        "downloading item"
    );
    let bytes = client.download_content(id, &path)?;

    // The file is already on disk; a missing sidecar does not undo that.
    let sidecar = if opts.store_metadata {
        let meta = sidecar_path(&path);
        match write_sidecar(&meta, &item.raw) {
            Ok(()) => Some(meta),
            Err(e) => {
                warn!(dest = %meta.display(), error = %e, "cannot write item metadata");
                None
            }
        }
    } else {
        None
    };

    info!(id, bytes, dest = %path.display(), "download complete");
    Ok(Downloaded {
        path,
        bytes,
        sidecar,
    })
}

/// Upload `local` to `remote_dest` (folder path plus file name).
pub fn upload_file<C: DriveClient + ?Sized>(
    client: &C,
    local: &Path,
    remote_dest: &str,
) -> Result<RemoteEntry> {
    let remote_dest = remote_dest.trim_matches('/');
    if remote_dest.is_empty() {
        return Err(Error::Transfer("upload destination is empty".into()));
    }
    if !local.is_file() {
        return Err(Error::local_io(
            local,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a readable file"),
        ));
    }
    info!(
        local = %local.display(),
        remote = remote_dest,
        "uploading file"
    );
    let created = client.upload_content(remote_dest, local)?;
    info!(remote = remote_dest, id = %created.id, "upload complete");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitise_strips_separators_and_spaces() {
        assert_eq!(sanitise("../etc/passwd"), "..etcpasswd");
        assert_eq!(sanitise("my report (v2).pdf"), "myreportv2.pdf");
        assert_eq!(sanitise("Grüße.txt"), "Gre.txt");
    }

    #[test]
    fn sanitise_is_idempotent() {
        for s in ["", "a b/c\\d:e*f?.g", "日本語.doc", "x.jpg", "..", "tab\tname"] {
            let once = sanitise(s);
            assert_eq!(sanitise(&once), once);
            assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'));
        }
    }

    #[test]
    fn local_name_embeds_stamp_and_id() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 10, 15, 42).unwrap();
        let stamp = transfer_stamp(now);
        assert_eq!(stamp, "20240301T10_15_42.000000");
        assert_eq!(
            local_file_name(&stamp, "I1", "a.txt"),
            "20240301T10_15_42.000000-I1-a.txt"
        );
    }

    #[test]
    fn sidecar_sits_next_to_file() {
        let p = sidecar_path(Path::new("/tmp/out/stamp-I1-a.txt"));
        assert_eq!(p, PathBuf::from("/tmp/out/stamp-I1-a.txt_metadata.json"));
    }

    #[test]
    fn ensure_dir_tolerates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_fails_on_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let err = ensure_dir(&blocker.join("sub")).unwrap_err();
        assert!(matches!(err, Error::LocalIo { .. }));
    }
}
