// Navigation menu: which choices are legal from a given path state, and how
// a picked label maps back to what it stands for. Rendering and reading the
// user's pick is the prompt layer's job (see `ui`).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::RemoteEntry;
use crate::path_state::{display_path, PathState};

pub const LABEL_UP: &str = "[up one level]";
pub const LABEL_ROOT: &str = "[/ root]";
pub const LABEL_EXIT: &str = "[exit]";

/// Outcome of one trip through the navigation menu.
#[derive(Debug, Clone, PartialEq)]
pub enum NavChoice {
    AscendOneLevel,
    GoToRoot,
    Exit,
    /// The prompt was aborted. Callers treat this as "do nothing".
    Cancelled,
    Entry(RemoteEntry),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub label: String,
    /// Modified recently; only affects how the item is drawn.
    pub recent: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Ascend,
    Root,
    Exit,
    Entry(usize),
}

pub struct Menu<'a> {
    title: String,
    items: Vec<MenuItem>,
    targets: HashMap<String, Target>,
    entries: &'a [RemoteEntry],
}

impl<'a> Menu<'a> {
    /// Controls first (up, root, exit), then one item per listed entry.
    /// A stale or empty listing yields just the controls.
    pub fn build(state: &'a PathState, now: DateTime<Utc>) -> Self {
        let entries = state.listing().unwrap_or(&[]);
        let mut items = Vec::with_capacity(entries.len() + 3);
        let mut targets = HashMap::with_capacity(entries.len() + 3);

        for (label, target) in [
            (LABEL_UP, Target::Ascend),
            (LABEL_ROOT, Target::Root),
            (LABEL_EXIT, Target::Exit),
        ] {
            items.push(MenuItem {
                label: label.to_string(),
                recent: false,
            });
            targets.insert(label.to_string(), target);
        }

        for (idx, entry) in entries.iter().enumerate() {
            let label = entry.label();
            items.push(MenuItem {
                label: label.clone(),
                recent: entry.is_recent(now),
            });
            targets.insert(label, Target::Entry(idx));
        }

        Menu {
            title: format!(
                "Directory listing of [{}]",
                display_path(state.current_path())
            ),
            items,
            targets,
            entries,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Map an exact label back to its choice. Unknown labels resolve to
    /// `Cancelled`.
    pub fn resolve(&self, label: &str) -> NavChoice {
        match self.targets.get(label) {
            Some(Target::Ascend) => NavChoice::AscendOneLevel,
            Some(Target::Root) => NavChoice::GoToRoot,
            Some(Target::Exit) => NavChoice::Exit,
            Some(Target::Entry(idx)) => NavChoice::Entry(self.entries[*idx].clone()),
            None => NavChoice::Cancelled,
        }
    }

    /// Resolve a pick made by position in `items()`; `None` means the
    /// prompt was cancelled.
    pub fn resolve_index(&self, picked: Option<usize>) -> NavChoice {
        match picked.and_then(|i| self.items.get(i)) {
            Some(item) => self.resolve(&item.label),
            None => NavChoice::Cancelled,
        }
    }
}
