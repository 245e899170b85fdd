//! Directory layout of the storage root

use std::path::{Component, Path, PathBuf};

use crate::cache::traits::StoreError;
use crate::cache::types::BankKey;

/// Resolves bank keys and bank-relative file paths against a storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankLayout {
    storage_root: PathBuf,
}

impl BankLayout {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// `{root}/global/{id}`, `{root}/projects/{id}` or `{root}/code/{id}`
    pub fn bank_root(&self, key: &BankKey) -> PathBuf {
        self.storage_root
            .join(key.bank_type.directory_name())
            .join(&key.bank_id)
    }

    /// Bank root of a key whose id is known to stay below its type directory
    pub fn checked_bank_root(&self, key: &BankKey) -> Result<PathBuf, StoreError> {
        if !is_contained(&key.bank_id) {
            return Err(StoreError::InvalidPath(key.bank_id.clone()));
        }
        Ok(self.bank_root(key))
    }

    /// Absolute path of a bank file, rejecting paths that leave the bank root
    /// or that a reload would not pick up
    pub fn file_path(&self, key: &BankKey, relative: &str) -> Result<PathBuf, StoreError> {
        validate_bank_file(relative)?;
        Ok(self.checked_bank_root(key)?.join(relative))
    }
}

/// Extension of every file that belongs to a bank
pub const BANK_FILE_EXTENSION: &str = "md";

/// Non-empty relative path made only of normal components
fn is_contained(relative: &str) -> bool {
    if relative.trim().is_empty() {
        return false;
    }
    let path = Path::new(relative);
    !path.is_absolute()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Bank ids become a directory below `{root}/{type}/`.
pub fn validate_bank_id(bank_id: &str) -> Result<(), StoreError> {
    if is_contained(bank_id) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(bank_id.to_string()))
    }
}

pub fn is_bank_file(relative: &str) -> bool {
    Path::new(relative)
        .extension()
        .and_then(|ext| ext.to_str())
        == Some(BANK_FILE_EXTENSION)
}

/// A relative path that is also a markdown file
pub fn validate_bank_file(relative: &str) -> Result<(), StoreError> {
    validate_relative_path(relative)?;
    if !is_bank_file(relative) {
        return Err(StoreError::InvalidPath(relative.to_string()));
    }
    Ok(())
}

/// Bank files are addressed by non-empty relative paths without `..`.
pub fn validate_relative_path(relative: &str) -> Result<(), StoreError> {
    if relative.trim().is_empty() {
        return Err(StoreError::InvalidPath(relative.to_string()));
    }
    let path = Path::new(relative);
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.is_absolute() {
        return Err(StoreError::InvalidPath(relative.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::BankType;

    #[test]
    fn bank_types_map_to_directories() {
        let layout = BankLayout::new("/data");
        assert_eq!(
            layout.bank_root(&BankKey::new(BankType::Project, "demo")),
            PathBuf::from("/data/projects/demo")
        );
        assert_eq!(
            layout.bank_root(&BankKey::new(BankType::Global, "default")),
            PathBuf::from("/data/global/default")
        );
        assert_eq!(
            layout.bank_root(&BankKey::new(BankType::Code, "repo")),
            PathBuf::from("/data/code/repo")
        );
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let layout = BankLayout::new("/data");
        let key = BankKey::new(BankType::Project, "demo");
        assert!(layout.file_path(&key, "doc/architecture.md").is_ok());
        assert!(layout.file_path(&key, "../other/readme.md").is_err());
        assert!(layout.file_path(&key, "/etc/passwd").is_err());
        assert!(layout.file_path(&key, "").is_err());
    }

    #[test]
    fn only_markdown_files_belong_to_a_bank() {
        let layout = BankLayout::new("/data");
        let key = BankKey::new(BankType::Project, "demo");
        assert!(layout.file_path(&key, "notes.txt").is_err());
        assert!(layout.file_path(&key, "notes").is_err());
        assert!(validate_bank_file("notes/meeting_notes.md").is_ok());
    }

    #[test]
    fn bank_ids_stay_below_their_type_directory() {
        assert!(validate_bank_id("demo").is_ok());
        assert!(validate_bank_id("github.com:org/repo").is_ok());
        for bad in ["", "  ", "..", "../../escaped", "a/../../b", "/tmp/abs", "./demo"] {
            assert!(validate_bank_id(bad).is_err(), "{bad:?} accepted");
        }

        let layout = BankLayout::new("/data");
        let escaping = BankKey::new(BankType::Global, "../outside");
        assert!(layout.checked_bank_root(&escaping).is_err());
        assert!(layout.file_path(&escaping, "context.md").is_err());
    }
}
