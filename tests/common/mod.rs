#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use onedrive_cli::api::{Connector, DriveClient};
use onedrive_cli::error::{Error, Result as DriveResult};
use onedrive_cli::model::RemoteEntry;
use onedrive_cli::path_state::parent_remote;
use onedrive_cli::transfer::sidecar_path;
use onedrive_cli::ui::Prompter;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

//===============
// Fake drive
//===============

#[derive(Default)]
struct Inner {
    /// folder path -> child records, in listing order
    folders: HashMap<String, Vec<Value>>,
    records: HashMap<String, Value>,
    contents: HashMap<String, Vec<u8>>,
    failing_downloads: HashSet<String>,
    /// ids whose metadata file location is taken by a directory
    blocked_sidecars: HashSet<String>,
    list_calls: Vec<String>,
    uploads: Vec<(String, Vec<u8>)>,
}

/// In-memory drive addressed by path. Clones share state.
#[derive(Clone)]
pub struct FakeDrive {
    inner: Rc<RefCell<Inner>>,
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl FakeDrive {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.folders.insert(String::new(), Vec::new());
        FakeDrive {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    fn push_child(&self, parent: &str, record: Value) {
        let mut inner = self.inner.borrow_mut();
        let id = record["id"].as_str().unwrap().to_string();
        inner
            .folders
            .entry(parent.to_string())
            .or_default()
            .push(record.clone());
        inner.records.insert(id, record);
    }

    /// Folder at `path`, listed in its parent and listable itself.
    pub fn folder(self, path: &str, id: &str) -> Self {
        self.folder_entry(&parent_remote(path), id, last_segment(path));
        self.inner
            .borrow_mut()
            .folders
            .entry(path.to_string())
            .or_default();
        self
    }

    /// Folder that shows up in `parent`'s listing but cannot be listed.
    pub fn folder_entry(&self, parent: &str, id: &str, name: &str) {
        self.push_child(
            parent,
            json!({
                "id": id,
                "name": name,
                "folder": { "childCount": 0 },
                "lastModifiedDateTime": (Utc::now() - Duration::days(400)).to_rfc3339(),
                "parentReference": { "id": "PARENT" },
            }),
        );
    }

    /// File in folder `parent`, modified today.
    pub fn file(self, parent: &str, id: &str, name: &str, bytes: &[u8]) -> Self {
        self.push_child(
            parent,
            json!({
                "id": id,
                "name": name,
                "file": { "mimeType": "application/octet-stream" },
                "size": bytes.len(),
                "lastModifiedDateTime": Utc::now().to_rfc3339(),
            }),
        );
        self.inner
            .borrow_mut()
            .contents
            .insert(id.to_string(), bytes.to_vec());
        self
    }

    /// Item with neither a file nor a folder facet.
    pub fn unknown(self, parent: &str, id: &str, name: &str) -> Self {
        self.push_child(
            parent,
            json!({ "id": id, "name": name, "package": { "type": "oneNote" } }),
        );
        self
    }

    pub fn fail_download(self, id: &str) -> Self {
        self.inner
            .borrow_mut()
            .failing_downloads
            .insert(id.to_string());
        self
    }

    /// Occupy the sidecar location of `id`'s download with a directory.
    pub fn block_sidecar(self, id: &str) -> Self {
        self.inner
            .borrow_mut()
            .blocked_sidecars
            .insert(id.to_string());
        self
    }

    pub fn record(&self, id: &str) -> Value {
        self.inner.borrow().records[id].clone()
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.inner.borrow().list_calls.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.borrow().uploads.clone()
    }
}

impl DriveClient for FakeDrive {
    fn list_by_path(&self, path: &str) -> DriveResult<Vec<RemoteEntry>> {
        let mut inner = self.inner.borrow_mut();
        inner.list_calls.push(path.to_string());
        let records = inner
            .folders
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(path))?;
        records.into_iter().map(RemoteEntry::from_record).collect()
    }

    fn get_metadata(&self, id: &str) -> DriveResult<RemoteEntry> {
        let record = self
            .inner
            .borrow()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))?;
        RemoteEntry::from_record(record)
    }

    fn download_content(&self, id: &str, local_path: &Path) -> DriveResult<u64> {
        let inner = self.inner.borrow();
        if inner.failing_downloads.contains(id) {
            return Err(Error::Transfer(format!("connection reset while fetching {id}")));
        }
        let bytes = inner.contents.get(id).ok_or_else(|| Error::not_found(id))?;
        fs::write(local_path, bytes).map_err(|e| Error::local_io(local_path, e))?;
        if inner.blocked_sidecars.contains(id) {
            let meta = sidecar_path(local_path);
            fs::create_dir(&meta).map_err(|e| Error::local_io(&meta, e))?;
        }
        Ok(bytes.len() as u64)
    }

    fn upload_content(&self, remote_path: &str, local_path: &Path) -> DriveResult<RemoteEntry> {
        let bytes = fs::read(local_path).map_err(|e| Error::local_io(local_path, e))?;
        let mut inner = self.inner.borrow_mut();
        inner.uploads.push((remote_path.to_string(), bytes));
        let id = format!("U{}", inner.uploads.len());
        RemoteEntry::from_record(json!({
            "id": id,
            "name": last_segment(remote_path),
            "file": {},
        }))
    }
}

/// Accepts exactly one token and hands out the shared fake drive.
pub struct FakeConnector {
    pub drive: FakeDrive,
    pub accepted: String,
}

impl FakeConnector {
    pub fn new(drive: FakeDrive) -> Self {
        FakeConnector {
            drive,
            accepted: "good-token".to_string(),
        }
    }
}

impl Connector for FakeConnector {
    type Client = FakeDrive;

    fn connect(&self, token: &str) -> DriveResult<FakeDrive> {
        if token == self.accepted {
            Ok(self.drive.clone())
        } else {
            Err(Error::Auth("401 Unauthorized: InvalidAuthenticationToken".into()))
        }
    }
}

//===============
// Scripted prompts
//===============

#[derive(Debug, Clone)]
pub enum Answer {
    /// Pick the item whose label is (or contains) this text.
    Pick(&'static str),
    PickIndex(usize),
    Text(String),
    /// Accept the offered default.
    Default,
    Cancel,
}

pub fn text(s: impl Into<String>) -> Answer {
    Answer::Text(s.into())
}

#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    /// Titles and items of every select prompt shown.
    pub menus: Vec<(String, Vec<String>)>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Answer>) -> Self {
        ScriptedPrompter {
            answers: answers.into(),
            menus: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self) -> Result<Answer> {
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow!("prompt script exhausted"))
    }

    fn text_answer(&mut self, default: Option<&str>) -> Result<Option<String>> {
        match self.next()? {
            Answer::Text(s) => Ok(Some(s)),
            Answer::Default => Ok(default.map(str::to_string)),
            Answer::Cancel => Ok(None),
            other => Err(anyhow!("expected a text answer, got {other:?}")),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, title: &str, items: &[String]) -> Result<Option<usize>> {
        self.menus.push((title.to_string(), items.to_vec()));
        match self.next()? {
            Answer::Pick(label) => items
                .iter()
                .position(|i| i == label)
                .or_else(|| items.iter().position(|i| i.contains(label)))
                .map(Some)
                .ok_or_else(|| anyhow!("no item {label:?} in {items:?}")),
            Answer::PickIndex(i) => Ok(Some(i)),
            Answer::Cancel => Ok(None),
            other => Err(anyhow!("expected a selection, got {other:?}")),
        }
    }

    fn input(&mut self, _title: &str, default: Option<&str>) -> Result<Option<String>> {
        self.text_answer(default)
    }

    fn secret(&mut self, _title: &str) -> Result<Option<String>> {
        self.text_answer(None)
    }
}

//===============
// Local tree helpers
//===============

/// Names of the entries directly inside `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read dir")
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// The single entry in `dir` whose name ends with `suffix`.
pub fn find_one(dir: &Path, suffix: &str) -> PathBuf {
    let hits: Vec<String> = dir_names(dir)
        .into_iter()
        .filter(|n| n.ends_with(suffix))
        .collect();
    assert_eq!(hits.len(), 1, "expected one *{suffix} in {}: {hits:?}", dir.display());
    dir.join(&hits[0])
}

/// Every directory below `root`, relative, sorted.
pub fn all_dirs(root: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        for e in fs::read_dir(dir).unwrap() {
            let p = e.unwrap().path();
            if p.is_dir() {
                out.push(p.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"));
                walk(base, &p, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
