use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::settings::Settings;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client(settings: &Settings) -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build http client")
    })
}

/// GET `path` on the stats API with query params, returning the body text.
/// Non-2xx responses become errors carrying the server's message.
pub fn get_text(settings: &Settings, path: &str, params: &[(&str, String)]) -> Result<String> {
    let client = http_client(settings)?;
    let url = reqwest::Url::parse_with_params(&settings.endpoint(path), params)
        .with_context(|| format!("invalid url for {path}"))?;
    let resp = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .with_context(|| format!("request to {path} failed"))?;
    read_body(resp)
}

pub fn read_body(resp: Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!(server_error_message(status, &body)));
    }
    Ok(body)
}

/// Picks the most useful message out of an error response: `detail`, then
/// `error`, then the raw body.
pub fn server_error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    let payload = serde_json::from_str::<Value>(trimmed).ok();
    let from_payload = payload.as_ref().and_then(|v| {
        ["detail", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    });
    match from_payload {
        Some(msg) => format!("http {}: {msg}", status.as_u16()),
        None if trimmed.is_empty() => format!("http {status}"),
        None => format!("http {}: {}", status.as_u16(), truncate(trimmed, 200)),
    }
}

fn truncate(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(max_chars).collect();
    out.push('…');
    out
}
