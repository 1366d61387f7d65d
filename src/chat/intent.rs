//! Deterministic intent classifier (spec §4.11).
//!
//! The teacher's `orchestration::lexical_router` scores free text against
//! a catalog with BM25 and picks the best-ranked workflow. That fits a
//! router choosing among many registered workflows; here the target set
//! is nine fixed intent kinds, so classification is a simpler weighted
//! keyword match against a 0.3 normalized threshold rather than BM25 —
//! the same "score candidates, take the best above a floor" shape,
//! scaled down to what a closed set needs.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntentKind {
    ExtractColumns,
    ConvertFormat,
    NormalizeData,
    GenerateSql,
    GenerateJson,
    SearchFilter,
    BindData,
    MapColumns,
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::ExtractColumns => "extract_columns",
            IntentKind::ConvertFormat => "convert_format",
            IntentKind::NormalizeData => "normalize_data",
            IntentKind::GenerateSql => "generate_sql",
            IntentKind::GenerateJson => "generate_json",
            IntentKind::SearchFilter => "search_filter",
            IntentKind::BindData => "bind_data",
            IntentKind::MapColumns => "map_columns",
            IntentKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposedStep {
    pub operation: String,
    pub arguments: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: IntentKind,
    pub confidence: f64,
    pub params: BTreeMap<String, JsonValue>,
    pub proposed_steps: Vec<ProposedStep>,
    pub requires_file: bool,
}

/// Shape of a workflow proposal as stored in `Message.metadata.pending_workflow`
/// and as the wire format for the confirm endpoint's `modified_steps` (spec §9).
pub fn steps_to_json(steps: &[ProposedStep]) -> JsonValue {
    JsonValue::Array(
        steps
            .iter()
            .map(|step| {
                serde_json::json!({
                    "operation": step.operation,
                    "arguments": step.arguments,
                })
            })
            .collect(),
    )
}

struct Rule {
    kind: IntentKind,
    keywords: &'static [&'static str],
    param_pattern: Option<&'static str>,
    param_name: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        kind: IntentKind::ExtractColumns,
        keywords: &["extract", "column", "columns", "pull out", "select fields"],
        param_pattern: Some(r"(?i)columns?:?\s*([\w, ]+)"),
        param_name: "columns",
    },
    Rule {
        kind: IntentKind::ConvertFormat,
        keywords: &["convert", "format", "transform into", "turn into"],
        param_pattern: Some(r"(?i)(?:to|into)\s+(\w+)\s*(?:format)?$"),
        param_name: "target_format",
    },
    Rule {
        kind: IntentKind::NormalizeData,
        keywords: &["normalize", "clean up", "standardize", "trim whitespace"],
        param_pattern: Some(r"(?i)columns?:?\s*([\w, ]+)"),
        param_name: "columns",
    },
    Rule {
        kind: IntentKind::GenerateSql,
        keywords: &["sql", "insert statement", "insert into", "generate sql"],
        param_pattern: Some(r"(?i)table(?:\s*name)?:?\s*(\w+)"),
        param_name: "table_name",
    },
    Rule {
        kind: IntentKind::GenerateJson,
        keywords: &["json", "generate json", "to json"],
        param_pattern: None,
        param_name: "",
    },
    Rule {
        kind: IntentKind::SearchFilter,
        keywords: &["filter", "search", "where", "contains", "rows with"],
        param_pattern: Some(r"(?i)(\w+)\s+contains\s+(.+)"),
        param_name: "contains",
    },
    Rule {
        kind: IntentKind::BindData,
        keywords: &["bind", "merge", "combine", "join"],
        param_pattern: None,
        param_name: "",
    },
    Rule {
        kind: IntentKind::MapColumns,
        keywords: &["map column", "rename column", "map fields"],
        param_pattern: Some(r"(?i)columns?:?\s*([\w, ]+)"),
        param_name: "columns",
    },
];

const CONFIDENCE_THRESHOLD: f64 = 0.3;

fn score_rule(rule: &Rule, lowercase_text: &str) -> f64 {
    let matches = rule
        .keywords
        .iter()
        .filter(|keyword| lowercase_text.contains(*keyword))
        .count();
    matches as f64 / rule.keywords.len() as f64
}

fn extract_param(rule: &Rule, text: &str) -> BTreeMap<String, JsonValue> {
    let mut params = BTreeMap::new();
    let Some(pattern) = rule.param_pattern else {
        return params;
    };
    let regex = Regex::new(pattern).expect("static intent pattern is valid regex");
    let Some(captures) = regex.captures(text) else {
        return params;
    };

    match rule.kind {
        IntentKind::SearchFilter => {
            if let (Some(column), Some(contains)) = (captures.get(1), captures.get(2)) {
                params.insert("column".to_string(), JsonValue::String(column.as_str().trim().to_string()));
                params.insert(
                    "contains".to_string(),
                    JsonValue::String(contains.as_str().trim().to_string()),
                );
            }
        }
        IntentKind::ExtractColumns | IntentKind::NormalizeData | IntentKind::MapColumns => {
            if let Some(list) = captures.get(1) {
                let columns: Vec<JsonValue> = list
                    .as_str()
                    .split(',')
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .map(|c| JsonValue::String(c.to_string()))
                    .collect();
                params.insert(rule.param_name.to_string(), JsonValue::Array(columns));
            }
        }
        _ => {
            if let Some(value) = captures.get(1) {
                params.insert(rule.param_name.to_string(), JsonValue::String(value.as_str().trim().to_string()));
            }
        }
    }
    params
}

fn proposed_steps_for(kind: IntentKind, params: &BTreeMap<String, JsonValue>) -> Vec<ProposedStep> {
    match kind {
        IntentKind::ExtractColumns => {
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "columns".to_string(),
                params.get("columns").cloned().unwrap_or(JsonValue::Array(Vec::new())),
            );
            arguments.insert("remove_duplicates".to_string(), JsonValue::Bool(false));
            vec![ProposedStep {
                operation: "excel/extract-columns-to-file".to_string(),
                arguments,
            }]
        }
        IntentKind::NormalizeData => {
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "columns".to_string(),
                params.get("columns").cloned().unwrap_or(JsonValue::Array(Vec::new())),
            );
            vec![ProposedStep {
                operation: "normalization/apply".to_string(),
                arguments,
            }]
        }
        IntentKind::GenerateSql => {
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "table_name".to_string(),
                params
                    .get("table_name")
                    .cloned()
                    .unwrap_or(JsonValue::String("imported_data".to_string())),
            );
            vec![ProposedStep {
                operation: "sql/generate-to-text".to_string(),
                arguments,
            }]
        }
        IntentKind::SearchFilter => {
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "column".to_string(),
                params.get("column").cloned().unwrap_or(JsonValue::String(String::new())),
            );
            arguments.insert(
                "contains".to_string(),
                params.get("contains").cloned().unwrap_or(JsonValue::String(String::new())),
            );
            vec![ProposedStep {
                operation: "search/filter-rows".to_string(),
                arguments,
            }]
        }
        // These four intent kinds are recognized conversationally but
        // have no registered handler yet (spec's operation catalog is
        // deliberately minimal); proposing them surfaces as
        // `UnknownOperation` at confirmation time rather than silently
        // degrading to a different operation.
        IntentKind::ConvertFormat => vec![ProposedStep {
            operation: "format/convert".to_string(),
            arguments: params.clone(),
        }],
        IntentKind::GenerateJson => vec![ProposedStep {
            operation: "json/generate-to-file".to_string(),
            arguments: BTreeMap::new(),
        }],
        IntentKind::BindData => vec![ProposedStep {
            operation: "data/bind".to_string(),
            arguments: BTreeMap::new(),
        }],
        IntentKind::MapColumns => {
            let mut arguments = BTreeMap::new();
            arguments.insert(
                "columns".to_string(),
                params.get("columns").cloned().unwrap_or(JsonValue::Array(Vec::new())),
            );
            vec![ProposedStep {
                operation: "mapping/apply".to_string(),
                arguments,
            }]
        }
        IntentKind::Unknown => Vec::new(),
    }
}

pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// `has_uploaded_file` decides the `requires_file` flag: a recognized
    /// intent with no file uploaded yet needs one before a workflow can
    /// run (spec §4.11).
    pub fn classify(&self, text: &str, has_uploaded_file: bool) -> Classification {
        let lowercase_text = text.to_lowercase();

        let best = RULES
            .iter()
            .map(|rule| (rule, score_rule(rule, &lowercase_text)))
            .filter(|(_, score)| *score >= CONFIDENCE_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((rule, confidence)) = best else {
            return Classification {
                kind: IntentKind::Unknown,
                confidence: 0.0,
                params: BTreeMap::new(),
                proposed_steps: Vec::new(),
                requires_file: false,
            };
        };

        let params = extract_param(rule, text);
        let proposed_steps = proposed_steps_for(rule.kind, &params);

        Classification {
            kind: rule.kind,
            confidence,
            params,
            proposed_steps,
            requires_file: !has_uploaded_file,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_extract_columns_with_column_list() {
        let classifier = IntentClassifier::new();
        let classification = classifier.classify("please extract columns: name, email", true);
        assert_eq!(classification.kind, IntentKind::ExtractColumns);
        assert_eq!(classification.proposed_steps.len(), 1);
        assert_eq!(classification.proposed_steps[0].operation, "excel/extract-columns-to-file");
        let JsonValue::Array(columns) = &classification.proposed_steps[0].arguments["columns"] else {
            panic!("expected array");
        };
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn below_threshold_text_is_unknown() {
        let classifier = IntentClassifier::new();
        let classification = classifier.classify("hello there", true);
        assert_eq!(classification.kind, IntentKind::Unknown);
        assert!(classification.proposed_steps.is_empty());
    }

    #[test]
    fn requires_file_when_none_uploaded_yet() {
        let classifier = IntentClassifier::new();
        let classification = classifier.classify("extract columns: name", false);
        assert!(classification.requires_file);
    }

    #[test]
    fn search_filter_extracts_column_and_value() {
        let classifier = IntentClassifier::new();
        let classification = classifier.classify("filter rows where status contains active", true);
        assert_eq!(classification.kind, IntentKind::SearchFilter);
        assert_eq!(classification.proposed_steps[0].arguments["column"], JsonValue::String("status".to_string()));
        assert_eq!(classification.proposed_steps[0].arguments["contains"], JsonValue::String("active".to_string()));
    }
}
