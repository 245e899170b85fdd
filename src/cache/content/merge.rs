//! Merge semantics for processed writes

use crate::cache::traits::{CacheOperationError, ProcessedContent, WriteOperation};
use crate::cache::types::BankContent;

/// Compute the new text of a file after applying `operation` with `new_text`.
///
/// `existing` is `None` when the file is not yet part of the bank; an empty
/// file is treated the same way.
pub fn apply_write(
    existing: Option<&str>,
    operation: &WriteOperation,
    new_text: &str,
) -> Result<String, CacheOperationError> {
    let existing = existing.unwrap_or_default();
    match operation {
        WriteOperation::Replace => Ok(new_text.to_string()),
        WriteOperation::Append => {
            if existing.is_empty() {
                Ok(new_text.to_string())
            } else {
                Ok(format!("{}\n\n{}", existing, new_text))
            }
        }
        WriteOperation::Insert { position } => insert_into_section(existing, position, new_text),
    }
}

/// Locate the line `heading`: `None` if absent, `Some(None)` if it is the
/// unterminated last line, otherwise the byte offset just past it.
fn section_body_start(existing: &str, heading: &str) -> Option<Option<usize>> {
    let mut offset = 0;
    for line in existing.split_inclusive('\n') {
        let bare = line.strip_suffix('\n').unwrap_or(line);
        let bare = bare.strip_suffix('\r').unwrap_or(bare);
        if bare == heading {
            let end = offset + line.len();
            return Some(line.ends_with('\n').then_some(end));
        }
        offset += line.len();
    }
    None
}

fn insert_into_section(
    existing: &str,
    position: &str,
    new_text: &str,
) -> Result<String, CacheOperationError> {
    if position.trim().is_empty() {
        return Err(CacheOperationError::merge_failed(
            "insert operation requires a non-empty position",
        ));
    }

    let heading = format!("## {}", position);
    match section_body_start(existing, &heading) {
        Some(Some(body_start)) => Ok(format!(
            "{}\n{}\n{}",
            &existing[..body_start],
            new_text,
            &existing[body_start..]
        )),
        Some(None) => Ok(format!("{}\n\n{}\n", existing, new_text)),
        None if existing.is_empty() => Ok(format!("{}\n\n{}", heading, new_text)),
        None => Ok(format!("{}\n\n{}\n\n{}", existing, heading, new_text)),
    }
}

/// Apply a processed write to one file of `bank`.
///
/// The bank is only modified when the merge succeeds. Returns the number of
/// bytes of new content written.
pub fn merge_into_bank(
    bank: &mut BankContent,
    processed: &ProcessedContent,
) -> Result<usize, CacheOperationError> {
    let merged = apply_write(
        bank.get(&processed.target_file).map(String::as_str),
        &processed.operation,
        &processed.content,
    )?;
    bank.insert(processed.target_file.clone(), merged);
    Ok(processed.content.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::ProcessingMetadata;

    fn insert_at(position: &str) -> WriteOperation {
        WriteOperation::Insert {
            position: position.to_string(),
        }
    }

    #[test]
    fn replace_overwrites() {
        let merged = apply_write(Some("old"), &WriteOperation::Replace, "new").unwrap();
        assert_eq!(merged, "new");
    }

    #[test]
    fn append_separates_with_blank_line() {
        let merged = apply_write(Some("first"), &WriteOperation::Append, "second").unwrap();
        assert_eq!(merged, "first\n\nsecond");
        assert_eq!(apply_write(None, &WriteOperation::Append, "only").unwrap(), "only");
        assert_eq!(apply_write(Some(""), &WriteOperation::Append, "only").unwrap(), "only");
    }

    #[test]
    fn insert_places_text_after_existing_heading() {
        let existing = "# Notes\n\n## Decisions\nUse Rust\n\n## Open\nNone\n";
        let merged = apply_write(Some(existing), &insert_at("Decisions"), "Use Postgres").unwrap();
        assert_eq!(
            merged,
            "# Notes\n\n## Decisions\n\nUse Postgres\nUse Rust\n\n## Open\nNone\n"
        );
    }

    #[test]
    fn insert_creates_missing_section() {
        let merged = apply_write(Some("# Notes"), &insert_at("Risks"), "Deadline").unwrap();
        assert_eq!(merged, "# Notes\n\n## Risks\n\nDeadline");

        // A new or empty file starts at the heading, without leading blank lines.
        let fresh = apply_write(None, &insert_at("Risks"), "Deadline").unwrap();
        assert_eq!(fresh, "## Risks\n\nDeadline");
        let empty = apply_write(Some(""), &insert_at("Risks"), "Deadline").unwrap();
        assert_eq!(empty, fresh);
    }

    #[test]
    fn insert_does_not_match_deeper_headings() {
        let existing = "### Risks\nnested\n";
        let merged = apply_write(Some(existing), &insert_at("Risks"), "top").unwrap();
        assert_eq!(merged, "### Risks\nnested\n\n\n## Risks\n\ntop");
    }

    #[test]
    fn insert_after_trailing_heading() {
        let merged = apply_write(Some("## Log"), &insert_at("Log"), "entry").unwrap();
        assert_eq!(merged, "## Log\n\nentry\n");
    }

    #[test]
    fn insert_without_position_fails_and_leaves_bank_untouched() {
        let mut bank = BankContent::new();
        bank.insert("readme.md".into(), "keep".into());
        let processed = ProcessedContent {
            target_file: "readme.md".into(),
            operation: insert_at(" "),
            content: "x".into(),
            metadata: ProcessingMetadata::new("default", "test"),
        };

        let err = merge_into_bank(&mut bank, &processed).unwrap_err();
        assert!(matches!(err, CacheOperationError::MergeError(_)));
        assert_eq!(bank["readme.md"], "keep");
    }

    #[test]
    fn merge_reports_bytes_written() {
        let mut bank = BankContent::new();
        let processed = ProcessedContent {
            target_file: "doc/architecture.md".into(),
            operation: WriteOperation::Append,
            content: "We chose PostgreSQL".into(),
            metadata: ProcessingMetadata::new("architecture", "test"),
        };
        assert_eq!(merge_into_bank(&mut bank, &processed).unwrap(), 19);
        assert_eq!(bank["doc/architecture.md"], "We chose PostgreSQL");
    }
}
