//! Template interpolation for SQL statements
//!
//! Handles `{{ variable }}` interpolation in warehouse statements. A filter
//! may follow the variable name:
//!
//! - `{{ name }}` inserts the value verbatim
//! - `{{ name | ident }}` inserts the value after checking it is a plain
//!   SQL identifier (dotted paths allowed)
//! - `{{ name | literal }}` inserts the value as an escaped, single-quoted
//!   SQL string literal

use crate::error::{Error, Result};
use crate::types::is_identifier;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable | filter }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*(?:\|\s*([a-z]+)\s*)?\}\}").unwrap()
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the context for chaining
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Get a variable value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    let mut undefined = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        result.push_str(&template[last..full_match.start()]);
        last = full_match.end();

        let name = &cap[1];
        let Some(value) = ctx.get(name) else {
            undefined.push(name.to_string());
            continue;
        };

        match cap.get(2).map(|m| m.as_str()) {
            None => result.push_str(value),
            Some("literal") => result.push_str(&quote_literal(value)),
            Some("ident") => result.push_str(&check_identifier(name, value)?),
            Some(other) => {
                return Err(Error::template(format!(
                    "Unknown filter '{other}' on variable '{name}'"
                )))
            }
        }
    }
    result.push_str(&template[last..]);

    if undefined.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(undefined.join(", ")))
    }
}

/// Quote a value as a SQL string literal
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "''");
    format!("'{escaped}'")
}

/// Validate a (possibly dotted) identifier path like `RAW.YELP.S3_STAGE`
fn check_identifier(name: &str, value: &str) -> Result<String> {
    if !value.is_empty() && value.split('.').all(is_identifier) {
        Ok(value.to_string())
    } else {
        Err(Error::template(format!(
            "Variable '{name}' is not a valid SQL identifier: '{value}'"
        )))
    }
}
