//! File-system [`BankStore`]
//!
//! Every `*.md` file below a bank root is part of the bank, keyed by its
//! `/`-separated path relative to that root.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::layout::{BankLayout, is_bank_file};
use crate::cache::traits::{BankStore, StoreError};
use crate::cache::types::{BankContent, BankKey};

#[derive(Debug, Clone)]
pub struct FileBankStore {
    layout: BankLayout,
}

impl FileBankStore {
    pub fn new(storage_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            layout: BankLayout::new(storage_root),
        }
    }

    pub fn from_layout(layout: BankLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &BankLayout {
        &self.layout
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

impl BankStore for FileBankStore {
    fn load(&self, key: &BankKey) -> Result<Option<BankContent>, StoreError> {
        let root = self.layout.checked_bank_root(key)?;
        if !root.is_dir() {
            return Ok(None);
        }

        let mut content = BankContent::new();
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                StoreError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(relative) = relative_key(&root, path) else {
                continue;
            };
            if !is_bank_file(&relative) {
                continue;
            }
            let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
            content.insert(relative, text);
        }

        log::debug!("Loaded {} files for bank {}", content.len(), key);
        Ok(Some(content))
    }

    fn create(&self, key: &BankKey) -> Result<BankContent, StoreError> {
        let root = self.layout.checked_bank_root(key)?;
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        log::info!("Created bank {} at {}", key, root.display());
        Ok(BankContent::new())
    }

    fn write(&self, key: &BankKey, content: &BankContent) -> Result<(), StoreError> {
        let root = self.layout.checked_bank_root(key)?;
        // Resolve every path first so a bad one leaves the bank untouched.
        let files = content
            .iter()
            .map(|(relative, text)| Ok((self.layout.file_path(key, relative)?, text)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;

        for (path, text) in files {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            fs::write(&path, text).map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(())
    }
}
