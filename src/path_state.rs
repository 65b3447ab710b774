// Path state tracker: the current remote folder (slash separated, `""` is
// the drive root) and the listing last fetched for it.
//
// The listing is `None` whenever it is stale. Every change of path clears
// it, so a listing is never shown for a folder other than the one it was
// fetched from.

use tracing::{error, info};

use crate::api::DriveClient;
use crate::error::Result;
use crate::model::RemoteEntry;

/// Join a remote folder path and a child name. The root has no leading
/// separator, and slashes around the child name are dropped.
pub fn join_remote(parent: &str, child: &str) -> String {
    let child = child.trim_matches('/');
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

/// Parent of a remote folder path; the root and single-segment paths
/// collapse to the root.
pub fn parent_remote(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => {
            let parent = &trimmed[..idx];
            if parent == "." || parent == "/" {
                String::new()
            } else {
                parent.to_string()
            }
        }
        None => String::new(),
    }
}

/// Human-facing name of a remote path.
pub fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<ROOT>"
    } else {
        path
    }
}

/// Result of asking the drive for the current folder's listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Listed,
    /// The path did not exist; state was reset to the root.
    ResetToRoot,
}

#[derive(Debug, Default, Clone)]
pub struct PathState {
    current_path: String,
    listing: Option<Vec<RemoteEntry>>,
}

impl PathState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn listing(&self) -> Option<&[RemoteEntry]> {
        self.listing.as_deref()
    }

    pub fn is_stale(&self) -> bool {
        self.listing.is_none()
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.current_path = path.into();
        self.listing = None;
    }

    /// Mark the cached listing stale without moving.
    pub fn invalidate(&mut self) {
        self.listing = None;
    }

    pub fn go_to_root(&mut self) {
        self.set_path(String::new());
    }

    pub fn ascend(&mut self) {
        if !self.current_path.is_empty() {
            self.current_path = parent_remote(&self.current_path);
        }
        self.listing = None;
    }

    pub fn descend(&mut self, child: &str) {
        self.current_path = join_remote(&self.current_path, child);
        self.listing = None;
    }

    /// Fetch the listing for the current path. A missing path resets the
    /// state to the root; other failures leave the listing stale and are
    /// returned to the caller.
    pub fn refresh<C: DriveClient + ?Sized>(&mut self, client: &C) -> Result<Refresh> {
        self.listing = None;
        info!(
            path = display_path(&self.current_path),
            "listing drive directory contents"
        );
        match client.list_by_path(&self.current_path) {
            Ok(entries) => {
                self.listing = Some(entries);
                Ok(Refresh::Listed)
            }
            Err(e) if e.is_not_found() => {
                error!(
                    path = display_path(&self.current_path),
                    "invalid folder path, resetting to root"
                );
                self.go_to_root();
                Ok(Refresh::ResetToRoot)
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh only when the cached listing is stale.
    pub fn ensure_listing<C: DriveClient + ?Sized>(&mut self, client: &C) -> Result<Refresh> {
        if self.is_stale() {
            self.refresh(client)
        } else {
            Ok(Refresh::Listed)
        }
    }
}
