//! Extension-based file filtering.
//!
//! A [`FilterLibrary`] maps filter names to sets of lowercase
//! extensions. The `all` filter matches everything, `custom` is
//! editable at runtime, and the library round-trips through the
//! persisted configuration.

use std::collections::{BTreeMap, BTreeSet};

/// Name of the filter that matches every file.
pub const FILTER_ALL: &str = "all";
/// Name of the runtime-editable filter.
pub const FILTER_CUSTOM: &str = "custom";

/// Named extension sets, seeded with the built-in filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLibrary {
    sets: BTreeMap<String, BTreeSet<String>>,
}

impl Default for FilterLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterLibrary {
    /// Library with the built-in filter sets.
    pub fn new() -> Self {
        let mut sets = BTreeMap::new();
        sets.insert(FILTER_ALL.to_string(), BTreeSet::new());
        sets.insert(
            "images".to_string(),
            [".jpg", ".jpeg", ".png", ".gif", ".bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        sets.insert(
            "documents".to_string(),
            [".doc", ".docx", ".pdf", ".txt", ".xlsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        sets.insert(FILTER_CUSTOM.to_string(), BTreeSet::new());
        Self { sets }
    }

    /// Build a library from the persisted `filters` map, overlaying the
    /// built-ins. Entries are normalized; unparseable ones are dropped.
    pub fn from_config(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut library = Self::new();
        for (name, extensions) in map {
            let set = extensions
                .iter()
                .filter_map(|e| normalize_extension(e))
                .collect();
            library.sets.insert(name.clone(), set);
        }
        library
    }

    /// Serialize back into the persisted `filters` map shape.
    pub fn to_config(&self) -> BTreeMap<String, Vec<String>> {
        self.sets
            .iter()
            .map(|(name, set)| (name.clone(), set.iter().cloned().collect()))
            .collect()
    }

    /// Registered filter names.
    pub fn names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    /// Extensions of a named filter, if registered.
    pub fn extensions(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.sets.get(name)
    }

    /// Add an extension to the `custom` filter. Returns false when the
    /// normalized extension was already present or was empty.
    pub fn add_custom(&mut self, extension: &str) -> bool {
        let Some(ext) = normalize_extension(extension) else {
            return false;
        };
        self.sets
            .entry(FILTER_CUSTOM.to_string())
            .or_default()
            .insert(ext)
    }

    /// Remove an extension from the `custom` filter. Returns false when
    /// it was not present.
    pub fn remove_custom(&mut self, extension: &str) -> bool {
        let Some(ext) = normalize_extension(extension) else {
            return false;
        };
        self.sets
            .get_mut(FILTER_CUSTOM)
            .map(|set| set.remove(&ext))
            .unwrap_or(false)
    }

    /// Compile the named filter into an immutable matcher for one run.
    /// An unregistered name matches nothing.
    pub fn compile(&self, name: &str) -> FileFilter {
        if name == FILTER_ALL {
            return FileFilter::match_all();
        }
        FileFilter {
            name: name.to_string(),
            extensions: Some(self.sets.get(name).cloned().unwrap_or_default()),
        }
    }
}

/// Immutable per-run matcher compiled from a [`FilterLibrary`].
#[derive(Debug, Clone)]
pub struct FileFilter {
    name: String,
    /// `None` matches every file.
    extensions: Option<BTreeSet<String>>,
}

impl FileFilter {
    /// Filter that accepts every file.
    pub fn match_all() -> Self {
        Self {
            name: FILTER_ALL.to_string(),
            extensions: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the filename belongs to the active filter set.
    pub fn matches(&self, filename: &str) -> bool {
        let Some(set) = &self.extensions else {
            return true;
        };
        match extension_of(filename) {
            Some(ext) => set.contains(&ext),
            None => false,
        }
    }
}

/// Lowercased extension of a filename, split at the final dot, leading
/// dot included. A name without an extension (or starting with its only
/// dot) yields `None`.
pub fn extension_of(filename: &str) -> Option<String> {
    let idx = filename.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(filename[idx..].to_ascii_lowercase())
}

/// Trim, prepend the dot when missing, lowercase. Empty input is `None`.
fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let dotted = if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    };
    Some(dotted.to_ascii_lowercase())
}
