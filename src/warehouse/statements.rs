//! SQL statements issued by the warehouse loader

use super::loader::LoadSettings;
use crate::error::Result;
use crate::template::{self, TemplateContext};
use crate::types::DatasetName;
use regex::Regex;
use secrecy::ExposeSecret;
use std::sync::LazyLock;

const CREATE_STAGE: &str = "\
CREATE STAGE IF NOT EXISTS {{ stage | ident }}
URL = {{ url | literal }}
CREDENTIALS = (AWS_KEY_ID = {{ aws_key_id | literal }} AWS_SECRET_KEY = {{ aws_secret_key | literal }})
FILE_FORMAT = (TYPE = 'JSON')";

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS {{ table | ident }} (
    data VARIANT
)";

const COPY_INTO: &str = "\
COPY INTO {{ table | ident }}
FROM @{{ stage | ident }}/{{ dataset | ident }}/
FILE_FORMAT = (TYPE = 'JSON', STRIP_OUTER_ARRAY = TRUE)";

/// Matches credential literals inside a stage statement
static SECRET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(AWS_KEY_ID|AWS_SECRET_KEY)\s*=\s*'(?:[^']|'')*'").unwrap());

fn base_context(settings: &LoadSettings) -> TemplateContext {
    TemplateContext::new().with("stage", settings.qualified_stage())
}

fn table_context(settings: &LoadSettings, dataset: &DatasetName) -> TemplateContext {
    base_context(settings)
        .with("table", settings.qualified_table(dataset))
        .with("dataset", dataset.as_str())
}

/// `CREATE STAGE IF NOT EXISTS` pointing at the object store prefix
pub fn create_stage(settings: &LoadSettings) -> Result<String> {
    let ctx = base_context(settings)
        .with("url", settings.stage_url.as_str())
        .with("aws_key_id", settings.aws_key_id.as_str())
        .with("aws_secret_key", settings.aws_secret_key.expose_secret());
    template::render(CREATE_STAGE, &ctx)
}

/// `CREATE TABLE IF NOT EXISTS` with a single VARIANT column
pub fn create_table(settings: &LoadSettings, dataset: &DatasetName) -> Result<String> {
    template::render(CREATE_TABLE, &table_context(settings, dataset))
}

/// `COPY INTO` from the dataset's stage folder, unwrapping the outer array
pub fn copy_into(settings: &LoadSettings, dataset: &DatasetName) -> Result<String> {
    template::render(COPY_INTO, &table_context(settings, dataset))
}

/// Replace credential literals so a statement can be logged
pub fn redact(sql: &str) -> String {
    SECRET_REGEX.replace_all(sql, "$1 = '***'").into_owned()
}
