//! Declarative form validation.
//!
//! Rules are data: each form declares a schema of per-field rule lists,
//! evaluated synchronously before submission. Field values arrive as JSON
//! values so string fields and tag lists share one representation. An
//! absent, null, or empty value only fails `Required`; the remaining rules
//! are skipped for optional fields, matching how the forms treat optional
//! URLs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde_json::{Map, Value};

/// A single validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    MinLen(usize),
    MaxLen(usize),
    Email,
    Url,
    /// Value must contain a match for the pattern.
    Pattern(&'static str),
    MinItems(usize),
    MaxItems(usize),
    /// Value must equal the named sibling field.
    MatchesField(&'static str),
}

/// Rules for one form field, in evaluation order.
#[derive(Debug, Clone)]
pub struct FieldRules {
    pub name: &'static str,
    pub rules: Vec<(Rule, &'static str)>,
}

/// A complete form schema.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldRules>,
}

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("form validation failed")]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    fn push(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("hard-coded pattern"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#]+\.[^\s]*$").expect("hard-coded pattern"))
}

/// Process-wide cache of compiled `Rule::Pattern` regexes. Clones share
/// the compiled program, so handing one out is cheap.
fn pattern_re(pattern: &'static str) -> Regex {
    static CACHE: OnceLock<Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = cache.lock().unwrap_or_else(PoisonError::into_inner);
    map.entry(pattern)
        .or_insert_with(|| Regex::new(pattern).expect("hard-coded pattern"))
        .clone()
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

impl Schema {
    pub fn new(fields: Vec<FieldRules>) -> Self {
        Self { fields }
    }

    /// Evaluates every rule against the submitted values.
    pub fn validate(&self, values: &Map<String, Value>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for field in &self.fields {
            let value = values.get(field.name);

            if !is_present(value) {
                if let Some((_, message)) = field
                    .rules
                    .iter()
                    .find(|(rule, _)| matches!(rule, Rule::Required))
                {
                    errors.push(field.name, message);
                }
                continue;
            }
            let Some(value) = value else { continue };

            for (rule, message) in &field.rules {
                let ok = match rule {
                    Rule::Required => true,
                    Rule::MinLen(min) => as_str(value).map_or(true, |s| s.chars().count() >= *min),
                    Rule::MaxLen(max) => as_str(value).map_or(true, |s| s.chars().count() <= *max),
                    Rule::Email => as_str(value).map_or(true, |s| email_re().is_match(s)),
                    Rule::Url => as_str(value).map_or(true, |s| url_re().is_match(s)),
                    Rule::Pattern(pattern) => {
                        as_str(value).map_or(true, |s| pattern_re(pattern).is_match(s))
                    }
                    Rule::MinItems(min) => as_list_len(value).map_or(true, |len| len >= *min),
                    Rule::MaxItems(max) => as_list_len(value).map_or(true, |len| len <= *max),
                    Rule::MatchesField(other) => values.get(*other) == Some(value),
                };
                if !ok {
                    errors.push(field.name, message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_str()
}

fn as_list_len(value: &Value) -> Option<usize> {
    value.as_array().map(Vec::len)
}

/// Password complexity shared by registration and password change.
fn password_rules() -> Vec<(Rule, &'static str)> {
    vec![
        (Rule::Required, "Password is required"),
        (Rule::MinLen(8), "Password must be at least 8 characters"),
        (Rule::Pattern("[A-Z]"), "Must contain at least one uppercase letter"),
        (Rule::Pattern("[a-z]"), "Must contain at least one lowercase letter"),
        (Rule::Pattern("[0-9]"), "Must contain at least one digit"),
        (
            Rule::Pattern("[^A-Za-z0-9]"),
            "Must contain at least one special character",
        ),
    ]
}

/// Registration form schema.
pub fn register_schema() -> Schema {
    Schema::new(vec![
        FieldRules {
            name: "username",
            rules: vec![
                (Rule::Required, "Username is required"),
                (Rule::MaxLen(50), "Username must not exceed 50 characters"),
            ],
        },
        FieldRules {
            name: "email",
            rules: vec![
                (Rule::Required, "Email is required"),
                (Rule::Email, "Invalid email"),
            ],
        },
        FieldRules {
            name: "password",
            rules: password_rules(),
        },
    ])
}

/// Project create/edit form schema.
pub fn project_schema() -> Schema {
    Schema::new(vec![
        FieldRules {
            name: "title",
            rules: vec![
                (Rule::Required, "Title is required"),
                (Rule::MaxLen(100), "Title must not exceed 100 characters"),
            ],
        },
        FieldRules {
            name: "description",
            rules: vec![
                (Rule::Required, "Description is required"),
                (Rule::MaxLen(1000), "Description must not exceed 1000 characters"),
            ],
        },
        FieldRules {
            name: "gitHubUrl",
            rules: vec![
                (Rule::Required, "GitHub URL is required"),
                (Rule::Url, "Invalid GitHub URL"),
            ],
        },
        FieldRules {
            name: "discordUrl",
            rules: vec![(Rule::Url, "Invalid Discord URL")],
        },
        FieldRules {
            name: "tags",
            rules: vec![
                (Rule::Required, "At least one tag is required"),
                (Rule::MinItems(1), "At least one tag is required"),
                (Rule::MaxItems(10), "At most 10 tags are allowed"),
            ],
        },
    ])
}

/// Password change form schema, with the cross-field confirmation check.
pub fn change_password_schema() -> Schema {
    Schema::new(vec![
        FieldRules {
            name: "currentPassword",
            rules: vec![(Rule::Required, "Current password is required")],
        },
        FieldRules {
            name: "newPassword",
            rules: password_rules(),
        },
        FieldRules {
            name: "confirmPassword",
            rules: vec![
                (Rule::Required, "Password confirmation is required"),
                (Rule::MatchesField("newPassword"), "Passwords do not match"),
            ],
        },
    ])
}
