//! Deterministic, pattern-based content processor
//!
//! Classifies text into a category with regular expressions, maps the
//! category to a file for the bank type, and always appends. Used as the
//! default processor and as the fallback when another processor fails.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::traits::{
    ContentProcessor, ProcessCall, ProcessRequest, ProcessedContent, ProcessingMetadata,
    WriteOperation,
};
use crate::cache::types::{BankContent, BankType};

pub const DEFAULT_CATEGORY: &str = "default";

const PROCESSING_METHOD: &str = "rule-based";

/// Category patterns, in priority order for tie-breaking
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "architecture",
        &[
            r"(?i)architecture\s+decision",
            r"(?i)decided\s+to\s+use\s+([a-z0-9_\-]+)",
            r"(?i)system\s+design",
            r"(?i)technical\s+architecture",
            r"(?i)architectural\s+approach",
            r"(?i)microservice",
            r"(?i)service\s+oriented",
            r"(?i)component\s+structure",
        ],
    ),
    (
        "technology",
        &[
            r"(?i)technology\s+stack",
            r"(?i)using\s+([a-z0-9_\-]+)\s+for",
            r"(?i)technical\s+stack",
            r"(?i)framework\s+selection",
            r"(?i)library\s+choice",
            r"(?i)database\s+choice",
            r"(?i)tech\s+choice",
        ],
    ),
    (
        "design",
        &[
            r"(?i)design\s+pattern",
            r"(?i)ui\s+design",
            r"(?i)user\s+interface",
            r"(?i)interaction\s+design",
            r"(?i)visual\s+layout",
            r"(?i)user\s+experience",
            r"(?i)ux\s+considerations",
        ],
    ),
    (
        "api",
        &[
            r"(?i)api\s+design",
            r"(?i)endpoint\s+definition",
            r"(?i)rest\s+interface",
            r"(?i)api\s+specification",
            r"(?i)graphql\s+schema",
            r"(?i)rest\s+endpoint",
            r"(?i)swagger\s+spec",
        ],
    ),
    (
        "progress",
        &[
            r"(?i)progress\s+update",
            r"(?i)status\s+report",
            r"(?i)milestone\s+complete",
            r"(?i)completed\s+tasks",
            r"(?i)current\s+status",
            r"(?i)task\s+completion",
            r"(?i)progress\s+report",
        ],
    ),
    (
        "tasks",
        &[
            r"(?i)todo\s+list",
            r"(?i)planned\s+tasks",
            r"(?i)action\s+items",
            r"(?i)needs\s+to\s+be\s+done",
            r"(?i)backlog\s+items",
            r"(?i)task\s+list",
            r"(?i)pending\s+work",
        ],
    ),
    (
        "meeting",
        &[
            r"(?i)meeting\s+summary",
            r"(?i)discussion\s+notes",
            r"(?i)discussed\s+in\s+meeting",
            r"(?i)meeting\s+outcome",
            r"(?i)team\s+discussion",
            r"(?i)meeting\s+notes",
            r"(?i)team\s+meeting",
        ],
    ),
    (
        "code",
        &[
            r"(?i)code\s+snippet",
            r"(?i)implementation\s+example",
            r"(?i)code\s+structure",
            r"(?i)class\s+definition",
            r"(?i)function\s+implementation",
            r"(?i)module\s+organization",
            r"(?i)pattern\s+implementation",
        ],
    ),
    (
        "preferences",
        &[
            r"(?i)user\s+preference",
            r"(?i)preferred\s+approach",
            r"(?i)communication\s+style",
            r"(?i)likes\s+to",
            r"(?i)prefers\s+to",
            r"(?i)user\s+likes",
            r"(?i)brief\s+responses",
        ],
    ),
];

const CONCEPT_PATTERNS: &[(&str, &[&str])] = &[
    (
        "architecture_decisions",
        &[
            r"(?i)decided to use ([a-z0-9_\-\.]+)",
            r"(?i)architecture will be ([a-z0-9_\-\.]+)",
            r"(?i)chose ([a-z0-9_\-\.]+) for (?:the|our) architecture",
            r"(?i)selecting ([a-z0-9_\-\.]+) (?:architecture|approach)",
        ],
    ),
    (
        "technology_choices",
        &[
            r"(?i)using ([a-z0-9_\-\.]+) for ([a-z0-9_\-\.]+)",
            r"(?i)selected ([a-z0-9_\-\.]+) (?:framework|library|tool)",
            r"(?i)chose ([a-z0-9_\-\.]+) as (?:the|our) ([a-z0-9_\-\.]+)",
        ],
    ),
    (
        "implementation_patterns",
        &[
            r"(?i)implementing (?:the )?([a-z0-9_\-\.]+) pattern",
            r"(?i)using (?:the|a) ([a-z0-9_\-\.]+) pattern",
            r"(?i)follow(?:ing)? (?:the|a) ([a-z0-9_\-\.]+) approach",
            r"(?i)the ([a-z0-9_\-\.]+) pattern for",
        ],
    ),
    (
        "project_constraints",
        &[
            r"(?i)constraints? (?:include|are|is) ([^\.]+)",
            r"(?i)limited by ([^\.]+)",
            r"(?i)requirements? (?:that|are|include) ([^\.]+)",
        ],
    ),
    (
        "milestones",
        &[
            r"(?i)milestones?: ([^\.]+)",
            r"(?i)completed ([^\.]+)",
            r"(?i)next goals? (?:is|are|:) ([^\.]+)",
        ],
    ),
];

const STOPWORDS: &[&str] = &["the", "a", "an", "and", "in", "on", "at", "to", "for", "of", "with"];

/// Minimum shared keywords for an existing file to count as related
const RELATED_KEYWORD_OVERLAP: usize = 3;

fn compile(table: &[(&'static str, &[&str])]) -> Vec<(&'static str, Vec<Regex>)> {
    table
        .iter()
        .map(|(name, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|pattern| match Regex::new(pattern) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        log::error!("Skipping invalid pattern {}: {}", pattern, e);
                        None
                    }
                })
                .collect();
            (*name, compiled)
        })
        .collect()
}

static CATEGORIES: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| compile(CATEGORY_PATTERNS));
static CONCEPTS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| compile(CONCEPT_PATTERNS));
static TITLE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?m)^#\s*(.*?)$").ok());
static WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\b[a-zA-Z0-9_]+\b").ok());

/// File that receives content of `category` in a bank of `bank_type`
pub fn target_file(bank_type: BankType, category: &str) -> &'static str {
    match bank_type {
        BankType::Global => match category {
            "preferences" => "preferences.md",
            "reference" => "references.md",
            _ => "context.md",
        },
        BankType::Project => match category {
            "architecture" | "technology" => "doc/architecture.md",
            "design" | "code" | "api" => "doc/design.md",
            "progress" => "doc/progress.md",
            "tasks" => "tasks.md",
            "meeting" => "notes/meeting_notes.md",
            "reference" => "notes/research.md",
            _ => "readme.md",
        },
        BankType::Code => match category {
            "architecture" | "technology" => "doc/architecture.md",
            "design" => "doc/design.md",
            "api" | "reference" => "doc/api.md",
            "code" => "snippets.md",
            "structure" => "structure.md",
            "progress" => "doc/progress.md",
            _ => "readme.md",
        },
    }
}

/// Classify text, returning its category and a confidence in `[0, 1]`.
///
/// A markdown title wins outright: a category name inside it scores 1.0 and
/// a category pattern matching it scores 0.9. Otherwise categories are
/// scored by pattern matches across the whole text.
pub fn analyze_content(text: &str) -> (&'static str, f32) {
    let title = TITLE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase());

    if let Some(title) = title {
        if let Some((name, _)) = CATEGORIES.iter().find(|(name, _)| title.contains(name)) {
            return (*name, 1.0);
        }
        if let Some((name, _)) = CATEGORIES
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&title)))
        {
            return (*name, 0.9);
        }
    }

    let mut best: Option<(&'static str, usize)> = None;
    let mut total = 0;
    for (name, patterns) in CATEGORIES.iter() {
        let score: usize = patterns.iter().map(|re| re.find_iter(text).count()).sum();
        total += score;
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((*name, score));
        }
    }

    match best {
        Some((name, score)) => (name, score as f32 / total as f32),
        None => (DEFAULT_CATEGORY, 0.0),
    }
}

/// Key concepts by concept category; categories without matches are omitted.
pub fn extract_key_concepts(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut concepts = BTreeMap::new();
    for (name, patterns) in CONCEPTS.iter() {
        let found: BTreeSet<String> = patterns
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .filter(|concept| !concept.is_empty())
            .collect();
        if !found.is_empty() {
            concepts.insert(name.to_string(), found.into_iter().collect());
        }
    }
    concepts
}

fn keywords(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let Some(word) = WORD.as_ref() else {
        return HashSet::new();
    };
    word.find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Existing files sharing more than a handful of keywords with `text`
pub fn related_files(text: &str, existing: &BankContent) -> Vec<String> {
    let wanted = keywords(text);
    existing
        .iter()
        .filter(|(_, body)| keywords(body).intersection(&wanted).count() > RELATED_KEYWORD_OVERLAP)
        .map(|(path, _)| path.clone())
        .collect()
}

fn title_case(category: &str) -> String {
    let mut chars = category.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Prefix untitled text with `## {Category} - {YYYY-MM-DD HH:MM}`.
pub fn format_content(text: &str, category: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('#') {
        return trimmed.to_string();
    }
    let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M");
    format!("## {} - {}\n\n{}", title_case(category), stamp, trimmed)
}

/// Pattern-matching [`ContentProcessor`]; always completes synchronously.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedProcessor;

impl RuleBasedProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process_sync(&self, request: &ProcessRequest) -> ProcessedContent {
        let (category, confidence) = analyze_content(&request.text);
        let mut metadata = ProcessingMetadata::new(category, PROCESSING_METHOD);
        metadata.confidence = confidence;
        metadata.concepts = extract_key_concepts(&request.text);
        metadata.related_files = related_files(&request.text, &request.existing);

        ProcessedContent {
            target_file: target_file(request.bank_type, category).to_string(),
            operation: WriteOperation::Append,
            content: format_content(&request.text, category),
            metadata,
        }
    }
}

impl ContentProcessor for RuleBasedProcessor {
    fn name(&self) -> &str {
        PROCESSING_METHOD
    }

    fn process(&self, request: ProcessRequest) -> ProcessCall {
        ProcessCall::Ready(Ok(self.process_sync(&request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str, bank_type: BankType) -> ProcessRequest {
        ProcessRequest {
            text: text.to_string(),
            existing: BankContent::new(),
            bank_type,
        }
    }

    #[test]
    fn title_with_category_name_wins() {
        assert_eq!(analyze_content("# Meeting with the team\nwe talked"), ("meeting", 1.0));
    }

    #[test]
    fn title_pattern_scores_point_nine() {
        let (category, confidence) = analyze_content("# Todo list for Friday\n- ship");
        assert_eq!(category, "tasks");
        assert!((confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn body_matches_pick_best_category() {
        let text = "We decided to use PostgreSQL after a system design review. Microservice layout.";
        let (category, confidence) = analyze_content(text);
        assert_eq!(category, "architecture");
        assert!((confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unmatched_text_is_default() {
        assert_eq!(analyze_content("nothing to see here"), (DEFAULT_CATEGORY, 0.0));
    }

    #[test]
    fn file_mapping_follows_bank_type() {
        assert_eq!(target_file(BankType::Project, "architecture"), "doc/architecture.md");
        assert_eq!(target_file(BankType::Project, DEFAULT_CATEGORY), "readme.md");
        assert_eq!(target_file(BankType::Global, "meeting"), "context.md");
        assert_eq!(target_file(BankType::Global, "preferences"), "preferences.md");
        assert_eq!(target_file(BankType::Code, "code"), "snippets.md");
    }

    #[test]
    fn untitled_content_gets_heading() {
        let formatted = format_content("  plain note  ", "progress");
        assert!(formatted.starts_with("## Progress - "));
        assert!(formatted.ends_with("\n\nplain note"));
        assert_eq!(format_content("# Own title\nbody", "progress"), "# Own title\nbody");
    }

    #[test]
    fn concepts_are_deduplicated() {
        let concepts =
            extract_key_concepts("We decided to use PostgreSQL today. Later we decided to use PostgreSQL again.");
        assert_eq!(concepts["architecture_decisions"], vec!["PostgreSQL".to_string()]);
        assert!(!concepts.contains_key("milestones"));
    }

    #[test]
    fn related_files_need_shared_keywords() {
        let mut existing = BankContent::new();
        existing.insert(
            "doc/architecture.md".into(),
            "PostgreSQL database schema migration strategy tooling".into(),
        );
        existing.insert("tasks.md".into(), "Write onboarding docs".into());

        let related = related_files(
            "New PostgreSQL schema migration strategy and tooling",
            &existing,
        );
        assert_eq!(related, vec!["doc/architecture.md".to_string()]);
    }

    #[test]
    fn processing_appends_to_mapped_file() {
        let processed = RuleBasedProcessor::new()
            .process_sync(&request("We decided to use PostgreSQL", BankType::Project));
        assert_eq!(processed.target_file, "doc/architecture.md");
        assert_eq!(processed.operation, WriteOperation::Append);
        assert_eq!(processed.metadata.processing_method, "rule-based");
        assert!(processed.content.contains("We decided to use PostgreSQL"));
    }
}
