//! Heuristic attack-pattern detection.
//!
//! Two independent classifiers, each a disjunction over an ordered list of
//! regex rules. They do not parse SQL or HTML; a string is suspicious when
//! it has any known dangerous shape. The rule sets are biased towards false
//! positives: the last SQL rule flags a broad punctuation set on its own, so
//! ordinary text with commas, quotes or parentheses is rejected too.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Which classifier flagged an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sql,
    Xss,
    None,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Xss => "xss",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionVerdict {
    pub suspicious: bool,
    pub category: Category,
    /// Name of the first rule that matched.
    pub rule: Option<&'static str>,
}

impl DetectionVerdict {
    const CLEAN: Self = Self {
        suspicious: false,
        category: Category::None,
        rule: None,
    };
}

struct Rule {
    name: &'static str,
    regex: Regex,
}

impl Rule {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("invalid detection pattern"),
        }
    }
}

static SQL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "sql_keyword",
            r"(?i)\b(?:select|union|drop|insert|update|delete|alter|create|exec|execute|truncate)\b",
        ),
        Rule::new("sql_breakout_char", r#"['";\\]"#),
        Rule::new("sql_comment", r"--|/\*|\*/|#"),
        Rule::new(
            "sql_boolean_tautology",
            r#"(?i)\b(?:or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+"#,
        ),
        Rule::new(
            "sql_timing_function",
            r"(?i)\b(?:sleep|benchmark)\s*\(|\bwaitfor\s+delay\b",
        ),
        Rule::new(
            "sql_schema_probe",
            r"(?i)\binformation_schema\b|\bmysql\.user\b|\bsys\.databases\b",
        ),
        Rule::new("sql_hex_literal", r"(?i)\b0x[0-9a-f]+\b"),
        Rule::new(
            "sql_string_function",
            r"(?i)\b(?:substring|concat|ascii|length)\s*\(",
        ),
        Rule::new("sql_percent_encoded", r"(?i)%(?:27|22|3b|23|5c)|%2d%2d"),
        Rule::new(
            "nosql_operator",
            r"(?i)\$(?:where|ne|eq|gt|gte|lt|lte|in|nin|regex|exists|or|and|not|nor|expr|elemmatch)\b",
        ),
        // Catch-all. Deliberately over-inclusive; keep it last.
        Rule::new("sql_punctuation", r#"[*()\\/+<>;,"'=]"#),
    ]
});

static SCRIPT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // Attribute escape into a script tag; checked before the bare tag rule.
        Rule::new("xss_quote_breakout", r#"(?i)["'][^<]*<\s*script"#),
        Rule::new(
            "xss_dangerous_tag",
            r"(?i)<\s*/?\s*(?:script|iframe|object|embed|link|meta)\b",
        ),
        Rule::new("xss_script_uri", r"(?i)\b(?:javascript|vbscript)\s*:"),
        Rule::new(
            "xss_autofocus_event",
            r"(?i)\bautofocus\b[^>]*\bon[a-z]{3,}\s*=",
        ),
        Rule::new("xss_event_handler", r"(?i)\bon[a-z]{3,}\s*="),
        Rule::new("xss_call_payload", r"(?i)\b(?:alert|confirm|prompt)\s*\("),
        Rule::new("xss_entity_obfuscation", r"(?i)&#x?[0-9a-f]+;?"),
    ]
});

fn first_match(rules: &[Rule], input: &str) -> Option<&'static str> {
    if input.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.regex.is_match(input))
        .map(|rule| rule.name)
}

/// Name of the first SQL-injection rule `input` matches.
pub fn matching_sql_rule(input: &str) -> Option<&'static str> {
    first_match(&SQL_RULES, input)
}

/// Name of the first script-injection rule `input` matches.
pub fn matching_script_rule(input: &str) -> Option<&'static str> {
    first_match(&SCRIPT_RULES, input)
}

pub fn looks_like_sql_injection(input: &str) -> bool {
    matching_sql_rule(input).is_some()
}

pub fn looks_like_script_injection(input: &str) -> bool {
    matching_script_rule(input).is_some()
}

/// Runs both classifiers and reports the first one that fires, SQL first.
pub fn classify(input: &str) -> DetectionVerdict {
    if let Some(rule) = matching_sql_rule(input) {
        return DetectionVerdict {
            suspicious: true,
            category: Category::Sql,
            rule: Some(rule),
        };
    }
    if let Some(rule) = matching_script_rule(input) {
        return DetectionVerdict {
            suspicious: true,
            category: Category::Xss,
            rule: Some(rule),
        };
    }
    DetectionVerdict::CLEAN
}
