// Recursive folder mirror.
//
// Walks a remote subtree depth-first by path (never by id: special folders
// such as shared or virtual roots do not hold their nominal children) and
// reproduces it under a local directory. Each folder path is entered at
// most once per run, and each local directory is claimed by at most one
// remote folder: siblings whose names sanitise to the same string get the
// remote id appended. A failure on one child is logged and counted, and
// the walk carries on with the next sibling.

use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::api::DriveClient;
use crate::model::EntryKind;
use crate::path_state::{display_path, join_remote};
use crate::transfer::{self, TransferOptions, SIDECAR_SUFFIX};

/// Local folder name used when mirroring the drive root.
pub const ROOT_FOLDER_NAME: &str = "ROOT";
const FALLBACK_FOLDER_NAME: &str = "unnamed";

/// Counters for one mirror run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Local directories that did not exist before the run.
    pub folders_created: usize,
    pub files_downloaded: usize,
    pub failures: usize,
    pub revisits_skipped: usize,
    pub unknown_skipped: usize,
}

/// Local directory name for a remote folder path.
pub fn local_folder_name(remote_path: &str) -> String {
    let trimmed = remote_path.trim_end_matches('/');
    if trimmed.is_empty() {
        return ROOT_FOLDER_NAME.to_string();
    }
    let tail = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = transfer::sanitise(tail);
    // "", "." and ".." would land outside the intended folder.
    if name.chars().all(|c| c == '.') {
        FALLBACK_FOLDER_NAME.to_string()
    } else {
        name
    }
}

pub struct FolderMirror<'a, C: DriveClient + ?Sized> {
    client: &'a C,
    opts: TransferOptions,
    visited: HashSet<String>,
    claimed: HashSet<PathBuf>,
    report: MirrorReport,
}

impl<'a, C: DriveClient + ?Sized> FolderMirror<'a, C> {
    pub fn new(client: &'a C, opts: TransferOptions) -> Self {
        FolderMirror {
            client,
            opts,
            visited: HashSet::new(),
            claimed: HashSet::new(),
            report: MirrorReport::default(),
        }
    }

    pub fn report(&self) -> &MirrorReport {
        &self.report
    }

    pub fn into_report(self) -> MirrorReport {
        self.report
    }

    /// Mirror the folder at `remote_path` into a directory under `dest`
    /// that no other folder of this run uses. `record` is the folder's own raw record, written as a
    /// sidecar when metadata storage is on.
    pub fn mirror(&mut self, remote_path: &str, dest: &Path, record: Option<&Value>) {
        if !self.visited.insert(remote_path.to_string()) {
            warn!(
                path = display_path(remote_path),
                "skipping folder path, already visited"
            );
            self.report.revisits_skipped += 1;
            return;
        }

        let (folder_name, local_dir) = self.claim_local_dir(remote_path, dest, record);
        let existed = local_dir.is_dir();
        if let Err(e) = transfer::ensure_dir(&local_dir) {
            error!(
                path = display_path(remote_path),
                error = %e,
                "cannot create local folder"
            );
            self.report.failures += 1;
            return;
        }
        if !existed {
            self.report.folders_created += 1;
        }
        info!(
            path = display_path(remote_path),
            dest = %local_dir.display(),
            "downloading folder path"
        );

        if self.opts.store_metadata {
            if let Some(record) = record {
                self.store_folder_record(&local_dir, &folder_name, record);
            }
        }

        let children = match self.client.list_by_path(remote_path) {
            Ok(children) => children,
            Err(e) if e.is_not_found() => {
                error!(path = display_path(remote_path), "folder path not found");
                self.report.failures += 1;
                return;
            }
            Err(e) => {
                error!(
                    path = display_path(remote_path),
                    error = %e,
                    "cannot list folder"
                );
                self.report.failures += 1;
                return;
            }
        };

        for child in &children {
            match child.kind {
                EntryKind::Folder => {
                    let sub_path = join_remote(remote_path, &child.name);
                    self.mirror(&sub_path, &local_dir, Some(&child.raw));
                }
                EntryKind::File => {
                    match transfer::download_item(self.client, &child.id, &local_dir, self.opts) {
                        Ok(_) => self.report.files_downloaded += 1,
                        Err(e) => {
                            error!(
                                name = %child.name,
                                id = %child.id,
                                path = display_path(remote_path),
                                error = %e,
                                "file download failed, continuing"
                            );
                            self.report.failures += 1;
                        }
                    }
                }
                EntryKind::Unknown => {
                    warn!(name = %child.name, id = %child.id, "unknown item type, skipping");
                    self.report.unknown_skipped += 1;
                }
            }
        }
    }

    /// Pick a local directory no other folder of this run has taken.
    fn claim_local_dir(
        &mut self,
        remote_path: &str,
        dest: &Path,
        record: Option<&Value>,
    ) -> (String, PathBuf) {
        let base = local_folder_name(remote_path);
        let id = record
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(transfer::sanitise)
            .filter(|id| !id.is_empty());

        let claimed = &mut self.claimed;
        let name = std::iter::once(base.clone())
            .chain(id.map(|id| format!("{base}-{id}")))
            .chain((2u32..).map(|n| format!("{base}-{n}")))
            .find(|name| claimed.insert(dest.join(name)))
            .unwrap_or_else(|| base.clone());
        if name != base {
            warn!(
                path = display_path(remote_path),
                name = %name,
                "local folder name already used in this run, renamed"
            );
        }
        let dir = dest.join(&name);
        (name, dir)
    }

    fn store_folder_record(&mut self, local_dir: &Path, folder_name: &str, record: &Value) {
        let meta: PathBuf = local_dir.join(format!("{folder_name}{SIDECAR_SUFFIX}"));
        if let Err(e) = transfer::write_sidecar(&meta, record) {
            error!(dest = %meta.display(), error = %e, "cannot write folder metadata");
            self.report.failures += 1;
        }
    }
}

/// Mirror one remote folder with a fresh visited set.
pub fn mirror_folder<C: DriveClient + ?Sized>(
    client: &C,
    remote_path: &str,
    dest: &Path,
    record: Option<&Value>,
    opts: TransferOptions,
) -> MirrorReport {
    let mut mirror = FolderMirror::new(client, opts);
    mirror.mirror(remote_path, dest, record);
    let report = mirror.into_report();
    info!(
        path = display_path(remote_path),
        folders = report.folders_created,
        files = report.files_downloaded,
        failures = report.failures,
        "folder download finished"
    );
    report
}
