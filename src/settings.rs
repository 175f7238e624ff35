use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::Result;
use crate::unit_rect::UnitRect;

/// String key-value storage the per-document settings live in.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String);

    fn remove(&mut self, key: &str);

    /// Writes pending changes to the backing medium, if there is one.
    fn flush(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `key=value` lines in a state file.
///
/// The file is read on open. Changes are kept as a list of edits and applied
/// to a fresh read of the file on flush, so several stores sharing one file
/// (one per window, or one per process) only overwrite the keys they changed.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: MemoryStore,
    pending: BTreeMap<String, Option<String>>,
}

impl FileStore {
    /// Opens the store at its default location in the user's state directory.
    pub fn open_default() -> Result<Self> {
        Self::open(get_state_file_path()?)
    }

    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = read_values(&path)?;

        Ok(FileStore {
            path,
            values,
            pending: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_values(path: &Path) -> Result<MemoryStore> {
    let mut values = MemoryStore::new();
    if !path.exists() {
        return Ok(values);
    }

    for line in fs::read_to_string(path)?.lines() {
        match line.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                values.set(key, value.to_string());
            }
            _ => {
                if !line.trim().is_empty() {
                    log::warn!("skipping malformed line in {}: {line}", path.display());
                }
            }
        }
    }
    Ok(values)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.set(key, value.clone());
        self.pending.insert(key.to_string(), Some(value));
    }

    fn remove(&mut self, key: &str) {
        if self.values.get(key).is_some() {
            self.values.remove(key);
            self.pending.insert(key.to_string(), None);
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        if let Some(state_dir) = self.path.parent() {
            if !state_dir.exists() {
                fs::create_dir_all(state_dir)?;
            }
        }

        let mut merged = read_values(&self.path)?;
        for (key, value) in &self.pending {
            match value {
                Some(value) => merged.set(key, value.clone()),
                None => merged.remove(key),
            }
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        for (key, value) in &merged.values {
            writeln!(file, "{key}={value}")?;
        }

        file.flush()?;
        self.values = merged;
        self.pending.clear();
        log::debug!("settings written to {}", self.path.display());
        Ok(())
    }
}

fn get_state_file_path() -> Result<PathBuf> {
    let mut state_path = env::var("XDG_STATE_HOME")
        .or_else(|_| env::var("HOME").map(|home| format!("{}/.local/state", home)))
        .map(PathBuf::from)?;

    state_path.push("pagecurl");
    state_path.push("settings.ini");

    Ok(state_path)
}

/// Store keys of one document, derived from the md5 of its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsKeys {
    pub page: String,
    pub crop: String,
}

impl SettingsKeys {
    pub fn for_identity(identity: &[u8]) -> Self {
        let hash = format!("{:x}", md5::compute(identity));
        SettingsKeys {
            page: format!("{hash}_page"),
            crop: format!("{hash}_crop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DocumentSettings {
    pub last_page_index: usize,
    pub crop: UnitRect,
}

impl DocumentSettings {
    /// Reads the settings of the document with `identity`. Absent or
    /// unreadable values fall back to the defaults: page 0, no crop. The
    /// page is clamped later, once the page count is known.
    pub fn load(store: &dyn KeyValueStore, identity: &[u8], remember_page: bool) -> Self {
        let keys = SettingsKeys::for_identity(identity);
        let mut settings = DocumentSettings::default();

        if remember_page {
            if let Some(value) = store.get(&keys.page) {
                match value.trim().parse::<usize>() {
                    Ok(page) => settings.last_page_index = page,
                    Err(err) => log::warn!("ignoring stored page {value:?}: {err}"),
                }
            }
        }

        if let Some(value) = store.get(&keys.crop) {
            match value.parse::<UnitRect>() {
                Ok(crop) => settings.crop = crop.clamp_to_min_size(),
                Err(err) => log::warn!("ignoring stored crop: {err}"),
            }
        }

        settings
    }

    /// Writes the settings back. Default values remove their key instead of
    /// being stored.
    pub fn save(&self, store: &mut dyn KeyValueStore, identity: &[u8], remember_page: bool) {
        let keys = SettingsKeys::for_identity(identity);

        if remember_page && self.last_page_index != 0 {
            store.set(&keys.page, self.last_page_index.to_string());
        } else {
            store.remove(&keys.page);
        }

        if self.crop.is_full() {
            store.remove(&keys.crop);
        } else {
            store.set(&keys.crop, self.crop.to_string());
        }
    }
}
