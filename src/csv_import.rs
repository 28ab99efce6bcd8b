use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::multipart::Form;
use serde_json::Value;

use crate::http_client::http_client;
use crate::settings::Settings;

const IMPORT_PATH: &str = "/api/import-csv/";
const DEFAULT_SUCCESS: &str = "Files uploaded and processed";
const DEFAULT_FAILURE: &str = "Upload failed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportForm {
    pub game_name: String,
    pub players_csv: Option<PathBuf>,
    pub matches_csv: Option<PathBuf>,
    pub stats_csv: Option<PathBuf>,
}

impl ImportForm {
    /// Returns the normalized game name when the form can be sent.
    pub fn validate(&self) -> Result<String> {
        let game = self.game_name.trim().to_lowercase();
        if game.is_empty() {
            return Err(anyhow!("enter a game name for the import"));
        }
        if self.files().next().is_none() {
            return Err(anyhow!("select at least one CSV file"));
        }
        Ok(game)
    }

    /// `(form field, path)` for every selected file.
    pub fn files(&self) -> impl Iterator<Item = (&'static str, &PathBuf)> {
        [
            ("players_csv", self.players_csv.as_ref()),
            ("matches_csv", self.matches_csv.as_ref()),
            ("stats_csv", self.stats_csv.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, path)| path.map(|p| (field, p)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub row_number: Option<u64>,
    pub errors: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileErrors {
    pub file: String,
    pub rows: Vec<RowError>,
    /// File-level problem when the server did not report per-row errors.
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Accepted { message: String },
    Rejected { error: String, files: Vec<FileErrors> },
}

pub fn submit_import(settings: &Settings, form: &ImportForm) -> Result<ImportOutcome> {
    let game = form.validate()?;
    let client = http_client(settings)?;

    let mut multipart = Form::new();
    for (field, path) in form.files() {
        multipart = multipart
            .file(field, path)
            .with_context(|| format!("read {}", path.display()))?;
    }
    multipart = multipart.text("game_name", game);

    let resp = client
        .post(settings.endpoint(IMPORT_PATH))
        .multipart(multipart)
        .send()
        .context("upload request failed")?;
    let success = resp.status().is_success();
    let body = resp.text().context("failed reading body")?;
    Ok(parse_import_response(success, &body))
}

pub fn parse_import_response(success: bool, raw: &str) -> ImportOutcome {
    let payload = serde_json::from_str::<Value>(raw.trim()).unwrap_or(Value::Null);
    let text_field = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

    if success {
        return ImportOutcome::Accepted {
            message: text_field("message").unwrap_or_else(|| DEFAULT_SUCCESS.to_string()),
        };
    }

    let error = text_field("error")
        .or_else(|| text_field("detail"))
        .unwrap_or_else(|| DEFAULT_FAILURE.to_string());
    let files = payload
        .get("row_errors")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(file, errors)| file_errors(file, errors))
                .collect()
        })
        .unwrap_or_default();
    ImportOutcome::Rejected { error, files }
}

fn file_errors(file: &str, errors: &Value) -> FileErrors {
    match errors {
        Value::Array(rows) if !rows.is_empty() => FileErrors {
            file: file.to_string(),
            rows: rows.iter().map(row_error).collect(),
            note: None,
        },
        Value::Object(obj) if obj.contains_key("errors") => FileErrors {
            file: file.to_string(),
            rows: Vec::new(),
            note: obj.get("errors").map(Value::to_string),
        },
        Value::String(s) => FileErrors {
            file: file.to_string(),
            rows: Vec::new(),
            note: Some(s.clone()),
        },
        other => FileErrors {
            file: file.to_string(),
            rows: Vec::new(),
            note: Some(other.to_string()),
        },
    }
}

fn row_error(row: &Value) -> RowError {
    RowError {
        row_number: row.get("row_number").and_then(Value::as_u64),
        errors: row
            .get("errors")
            .map(Value::to_string)
            .unwrap_or_else(|| row.to_string()),
        data: row.get("data").filter(|d| !d.is_null()).map(Value::to_string),
    }
}
