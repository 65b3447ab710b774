// UI layer: the prompt surface and the interactive loop that drives
// navigation and transfers.
//
// `Prompter` is the seam between the loop and the terminal. The shipped
// implementation uses `dialoguer`; tests script the answers instead. A
// cancelled prompt (Esc, Ctrl-C, empty input) comes back as `None` and is
// always treated as "do nothing".
//
// Ctrl-C never ends the process: `install_interrupt_handler` replaces the
// default SIGINT action with a flag that the next prompt read consumes.

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::style::Stylize;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::Connector;
use crate::config::Settings;
use crate::logging;
use crate::menu::{Menu, NavChoice};
use crate::mirror;
use crate::model::{EntryKind, RemoteEntry};
use crate::path_state::{display_path, join_remote, PathState, Refresh};
use crate::session::Session;
use crate::transfer;

pub trait Prompter {
    /// Single choice from `items`; `None` when cancelled.
    fn select(&mut self, title: &str, items: &[String]) -> Result<Option<usize>>;

    /// Free text; `None` when cancelled or left empty.
    fn input(&mut self, title: &str, default: Option<&str>) -> Result<Option<String>>;

    /// Free text that is not echoed.
    fn secret(&mut self, title: &str) -> Result<Option<String>>;
}

/// Keyboard-driven prompts on the controlling terminal.
#[derive(Default)]
pub struct TerminalPrompter;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Route SIGINT to a flag. Must run before the first prompt.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(note_interrupt).context("Failed to install Ctrl-C handler")
}

fn note_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// A prompt may leave the cursor hidden when it is torn down mid-read.
fn restore_cursor() {
    let mut err = io::stderr();
    let _ = crossterm::execute!(err, crossterm::cursor::Show);
    eprintln!();
}

/// Ctrl-C while a prompt is open surfaces as `Interrupted` or as a raised
/// flag; both are a cancellation, not a failure.
fn cancel_on_interrupt<T>(res: io::Result<T>) -> Result<Option<T>> {
    let interrupted = take_interrupt();
    match res {
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
            restore_cursor();
            Ok(None)
        }
        _ if interrupted => {
            restore_cursor();
            Ok(None)
        }
        Ok(v) => Ok(Some(v)),
        Err(e) => Err(e.into()),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, title: &str, items: &[String]) -> Result<Option<usize>> {
        take_interrupt();
        let res = Select::new()
            .with_prompt(title)
            .items(items)
            .default(0)
            .interact_opt();
        Ok(cancel_on_interrupt(res)?.flatten())
    }

    fn input(&mut self, title: &str, default: Option<&str>) -> Result<Option<String>> {
        take_interrupt();
        let mut input = Input::<String>::new();
        input.with_prompt(title).allow_empty(true);
        if let Some(d) = default {
            input.default(d.to_string());
        }
        Ok(non_empty(cancel_on_interrupt(input.interact_text())?))
    }

    fn secret(&mut self, title: &str) -> Result<Option<String>> {
        take_interrupt();
        let res = Password::new()
            .with_prompt(title)
            .allow_empty_password(true)
            .interact();
        Ok(non_empty(cancel_on_interrupt(res)?))
    }
}

/// Spinner on stderr while a blocking call runs. Log lines printed while
/// it is alive suspend it; dropping it clears the line.
struct Spinner(ProgressBar);

impl Spinner {
    fn start(msg: String) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(120));
        logging::set_active_spinner(Some(pb.clone()));
        Spinner(pb)
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        logging::set_active_spinner(None);
        self.0.finish_and_clear();
    }
}

/// Top-level actions, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReplaceToken,
    Chdir,
    List,
    Download,
    DownloadFolder,
    Upload,
    Config,
    Exit,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::ReplaceToken,
        Action::Chdir,
        Action::List,
        Action::Download,
        Action::DownloadFolder,
        Action::Upload,
        Action::Config,
        Action::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::ReplaceToken => "replace_token",
            Action::Chdir => "chdir",
            Action::List => "list",
            Action::Download => "download",
            Action::DownloadFolder => "download_folder",
            Action::Upload => "upload",
            Action::Config => "config",
            Action::Exit => "exit",
        }
    }
}

/// Whether the loop keeps going after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct App<K: Connector, P: Prompter> {
    connector: K,
    prompter: P,
    session: Session<K::Client>,
    state: PathState,
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl<K: Connector, P: Prompter> App<K, P> {
    pub fn new(connector: K, prompter: P, settings: Settings) -> Self {
        App {
            connector,
            prompter,
            session: Session::new(),
            state: PathState::new(),
            settings,
            settings_path: None,
        }
    }

    /// Where `config` saves settings.
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    pub fn state(&self) -> &PathState {
        &self.state
    }

    pub fn session(&self) -> &Session<K::Client> {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn login(&mut self, token: &str) -> bool {
        self.session.authenticate(&self.connector, token)
    }

    /// Ask for a token and swap the session on success.
    pub fn replace_token(&mut self) -> Result<()> {
        let Some(token) = self.prompter.secret("Enter access token")? else {
            warn!("replace token canceled by user");
            return Ok(());
        };
        if !self.session.authenticate(&self.connector, &token) {
            error!("replace token failed, keeping the previous session");
        }
        Ok(())
    }

    /// Run the main menu until the user picks `exit`.
    pub fn run(&mut self) -> Result<()> {
        let labels: Vec<String> = Action::ALL.iter().map(|a| a.label().to_string()).collect();
        loop {
            let Some(idx) = self
                .prompter
                .select("OneDrive Interactive Client", &labels)?
            else {
                info!("cancelled at main menu");
                continue;
            };
            let Some(action) = Action::ALL.get(idx).copied() else {
                continue;
            };
            if self.perform(action)? == Flow::Exit {
                info!("exiting");
                return Ok(());
            }
        }
    }

    /// Execute one top-level action.
    pub fn perform(&mut self, action: Action) -> Result<Flow> {
        match action {
            Action::ReplaceToken => self.replace_token()?,
            Action::Chdir => self.chdir()?,
            Action::List => self.list(),
            Action::Download => self.download()?,
            Action::DownloadFolder => self.download_folder()?,
            Action::Upload => self.upload()?,
            Action::Config => self.configure()?,
            Action::Exit => return Ok(Flow::Exit),
        }
        Ok(Flow::Continue)
    }

    /// Make sure a listing for the current path is cached. Returns `false`
    /// when there is nothing to show: no session, path reset to root, or
    /// a failed request (already logged).
    fn listing_ready(&mut self, force: bool) -> bool {
        let Some(client) = self.session.client() else {
            error!("no active drive session, use replace_token to log in");
            return false;
        };
        let spinner =
            Spinner::start(format!("Listing {}", display_path(self.state.current_path())));
        // `chdir` and `list` always hit the server; the pickers reuse the cache.
        let res = if force {
            self.state.refresh(client)
        } else {
            self.state.ensure_listing(client)
        };
        drop(spinner);
        match res {
            Ok(Refresh::Listed) => true,
            Ok(Refresh::ResetToRoot) => false,
            Err(e) => {
                error!(
                    path = display_path(self.state.current_path()),
                    error = %e,
                    "listing failed"
                );
                false
            }
        }
    }

    /// Show the navigation menu for the cached listing.
    fn pick(&mut self) -> Result<NavChoice> {
        let now = Utc::now();
        let menu = Menu::build(&self.state, now);
        let rendered: Vec<String> = menu
            .items()
            .iter()
            .map(|item| {
                if item.recent {
                    item.label.clone().yellow().to_string()
                } else {
                    item.label.clone()
                }
            })
            .collect();
        let picked = self.prompter.select(menu.title(), &rendered)?;
        let choice = menu.resolve_index(picked);
        if choice == NavChoice::Cancelled {
            info!("directory navigation canceled by user");
        }
        Ok(choice)
    }

    /// Apply a control choice to the path state. Returns the selected
    /// entry, if the choice was one.
    fn apply_control(&mut self, choice: NavChoice) -> Option<RemoteEntry> {
        match choice {
            NavChoice::AscendOneLevel => {
                self.state.ascend();
                info!(path = display_path(self.state.current_path()), "moved up one level");
                None
            }
            NavChoice::GoToRoot => {
                self.state.go_to_root();
                info!("moved to root");
                None
            }
            NavChoice::Exit | NavChoice::Cancelled => None,
            NavChoice::Entry(entry) => Some(entry),
        }
    }

    fn enter_folder(&mut self, entry: &RemoteEntry) {
        self.state.descend(&entry.name);
        info!(
            path = display_path(self.state.current_path()),
            "changed directory into folder"
        );
    }

    /// Pick one entry at the current path; folders are entered, files and
    /// unknown items leave the path alone.
    fn chdir(&mut self) -> Result<()> {
        if !self.listing_ready(true) {
            return Ok(());
        }
        let choice = self.pick()?;
        let Some(entry) = self.apply_control(choice) else {
            return Ok(());
        };
        match entry.kind {
            EntryKind::Folder => self.enter_folder(&entry),
            EntryKind::File => info!(name = %entry.name, "selected a file, no directory change done"),
            EntryKind::Unknown => warn!(name = %entry.name, id = %entry.id, "unknown item type"),
        }
        Ok(())
    }

    /// Print the current listing, one line per entry.
    fn list(&mut self) {
        if !self.listing_ready(true) {
            return;
        }
        let now = Utc::now();
        for entry in self.state.listing().unwrap_or(&[]) {
            let recent = entry.is_recent(now);
            info!(recent, "{}", entry.listing_line());
        }
    }

    /// Local destination: the configured output directory, or ask.
    fn destination(&mut self, what: &str) -> Result<Option<PathBuf>> {
        if let Some(dir) = &self.settings.output_dir {
            return Ok(Some(dir.clone()));
        }
        let answer = self
            .prompter
            .input(&format!("Enter the local directory path to save {what} into"), None)?;
        if answer.is_none() {
            warn!("download canceled by user");
        }
        Ok(answer.map(PathBuf::from))
    }

    /// Download a file at the current path. Picking a folder only enters it.
    fn download(&mut self) -> Result<()> {
        if !self.listing_ready(false) {
            return Ok(());
        }
        let choice = self.pick()?;
        let Some(entry) = self.apply_control(choice) else {
            return Ok(());
        };
        match entry.kind {
            // One level per invocation; the user calls download again to go deeper.
            EntryKind::Folder => self.enter_folder(&entry),
            EntryKind::File => {
                let Some(dest) = self.destination("the file")? else {
                    return Ok(());
                };
                self.download_one(&entry, &dest);
            }
            EntryKind::Unknown => warn!(name = %entry.name, id = %entry.id, "unknown item type"),
        }
        Ok(())
    }

    /// Failures are logged here; the loop carries on either way.
    fn download_one(&mut self, entry: &RemoteEntry, dest: &Path) {
        let Some(client) = self.session.client() else {
            error!("no active drive session, use replace_token to log in");
            return;
        };
        let spinner = Spinner::start(format!("Downloading {}", entry.name));
        let res = transfer::download_item(client, &entry.id, dest, self.settings.transfer_options());
        drop(spinner);
        if let Err(e) = res {
            error!(name = %entry.name, id = %entry.id, error = %e, "download failed");
        }
    }

    /// Mirror a folder picked at the current path into a local directory.
    fn download_folder(&mut self) -> Result<()> {
        if !self.listing_ready(false) {
            return Ok(());
        }
        let choice = self.pick()?;
        let Some(entry) = self.apply_control(choice) else {
            return Ok(());
        };
        match entry.kind {
            EntryKind::Folder => {
                // The mirror walks by path, so resolve the picked name first.
                let folder_path = join_remote(self.state.current_path(), &entry.name);
                let Some(dest) = self.destination(&format!("folder '{folder_path}'"))? else {
                    return Ok(());
                };
                self.mirror(&folder_path, &dest, &entry);
            }
            EntryKind::File => {
                info!(name = %entry.name, "download_folder expects a folder, no action taken")
            }
            EntryKind::Unknown => warn!(name = %entry.name, id = %entry.id, "unknown item type"),
        }
        Ok(())
    }

    /// The mirror logs its own summary and per-item failures.
    fn mirror(&mut self, folder_path: &str, dest: &Path, entry: &RemoteEntry) {
        let Some(client) = self.session.client() else {
            error!("no active drive session, use replace_token to log in");
            return;
        };
        let spinner = Spinner::start(format!("Mirroring {folder_path}"));
        // The picked entry's record becomes the sidecar of the mirror root.
        mirror::mirror_folder(
            client,
            folder_path,
            dest,
            Some(&entry.raw),
            self.settings.transfer_options(),
        );
        drop(spinner);
    }

    /// Upload a local file. The default destination is the file name under
    /// the current remote path.
    fn upload(&mut self) -> Result<()> {
        if !self.session.is_active() {
            error!("no active drive session, use replace_token to log in");
            return Ok(());
        }
        let Some(src) = self.prompter.input("Enter the local source file path", None)? else {
            warn!("upload canceled by user");
            return Ok(());
        };
        let src = PathBuf::from(src);
        let default_dest = src
            .file_name()
            .map(|n| join_remote(self.state.current_path(), &n.to_string_lossy()));
        let Some(dest) = self
            .prompter
            .input("Enter the OneDrive destination path/filename", default_dest.as_deref())?
        else {
            warn!("upload canceled by user");
            return Ok(());
        };

        // Checked above; the borrow has to be taken after the prompts.
        let Some(client) = self.session.client() else {
            return Ok(());
        };
        let spinner = Spinner::start(format!("Uploading {}", src.display()));
        let res = transfer::upload_file(client, &src, &dest);
        drop(spinner);
        match res {
            // The new item may belong in the cached listing.
            Ok(_) => self.state.invalidate(),
            Err(e) => error!(local = %src.display(), remote = %dest, error = %e, "upload failed"),
        }
        Ok(())
    }

    /// Settings submenu. Changes apply to this run at once; `Save settings`
    /// also writes them to disk.
    fn configure(&mut self) -> Result<()> {
        loop {
            let items = vec![
                format!(
                    "Metadata sidecars: {} (toggle)",
                    if self.settings.store_metadata { "on" } else { "off" }
                ),
                format!(
                    "Output directory: {}",
                    self.settings
                        .output_dir
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<ask every time>".into())
                ),
                "Clear output directory".to_string(),
                "Save settings".to_string(),
                "Back".to_string(),
            ];
            // Cancel behaves like `Back`.
            let Some(idx) = self.prompter.select("Settings", &items)? else {
                return Ok(());
            };
            match idx {
                0 => {
                    self.settings.store_metadata = !self.settings.store_metadata;
                    info!(store_metadata = self.settings.store_metadata, "metadata setting changed");
                }
                1 => {
                    let current = self
                        .settings
                        .output_dir
                        .as_ref()
                        .map(|p| p.display().to_string());
                    if let Some(dir) = self.prompter.input("Output directory", current.as_deref())? {
                        info!(dir = %dir, "output directory set");
                        self.settings.output_dir = Some(PathBuf::from(dir));
                    }
                }
                2 => {
                    self.settings.output_dir = None;
                    info!("output directory cleared");
                }
                3 => {
                    let path = self
                        .settings_path
                        .clone()
                        .unwrap_or_else(Settings::default_path);
                    match self.settings.save(&path) {
                        Ok(()) => info!(path = %path.display(), "settings saved"),
                        Err(e) => error!(error = %e, "cannot save settings"),
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}
