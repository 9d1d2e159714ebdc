//! Resident view snapshots.

use std::collections::HashMap;

/// Identifier of the view rendering `path`.
///
/// One leading and one trailing `/` are dropped, the root maps to `home` and
/// inner separators become `-`: `/friends/compare/` → `view-friends-compare`.
pub fn view_id(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let name = if trimmed.is_empty() { "home" } else { trimmed };
    format!("view-{}", name.replace('/', "-"))
}

/// Rendered page kept resident in the content region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub id: String,
    pub path: String,
    pub markup: String,
    pub visible: bool,
}

impl ViewSnapshot {
    pub fn new(path: &str, markup: impl Into<String>, visible: bool) -> Self {
        Self { id: view_id(path), path: path.to_string(), markup: markup.into(), visible }
    }
}

/// Every snapshot materialized so far, keyed by view id.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<String, ViewSnapshot>,
}

impl ViewRegistry {
    pub fn contains(&self, id: &str) -> bool {
        self.views.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ViewSnapshot> {
        self.views.get(id)
    }

    /// Add a snapshot. An existing snapshot with the same id is kept.
    pub fn insert(&mut self, snapshot: ViewSnapshot) {
        self.views.entry(snapshot.id.clone()).or_insert(snapshot);
    }

    /// Id of the visible snapshot, if any.
    pub fn visible_id(&self) -> Option<String> {
        self.views.values().find(|v| v.visible).map(|v| v.id.clone())
    }

    /// Make `id` the only visible snapshot.
    pub fn show_only(&mut self, id: &str) {
        for view in self.views.values_mut() {
            view.visible = view.id == id;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.views.len()
    }
}
