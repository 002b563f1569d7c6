//! Pure parsing helpers for Kubo RPC replies.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::drivers::ObjectStat;

/// Kubo `routing/findprovs` message type for "provider found".
const PROVIDER_RECORD: i64 = 4;

/// Normalize a content path for the RPC `arg` parameter: bare cids get `/ipfs/`.
pub fn ipfs_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/ipfs/{}", path)
    }
}

/// Root cid of a content path (`/ipfs/QmRoot/a/b` → `QmRoot`).
pub fn root_cid(path: &str) -> Option<&str> {
    let rest = path.trim().trim_start_matches('/');
    let rest = rest
        .strip_prefix("ipfs/")
        .or_else(|| rest.strip_prefix("ipld/"))
        .unwrap_or(rest);
    rest.split('/').find(|s| !s.is_empty())
}

/// Splits a streamed response body into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append `data`; returns every line it completed, without the newline.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Whatever is left after the body ended without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Type", default)]
    kind: String,
}

/// The `Message` of a Kubo error object, if `body` is one.
pub fn error_message(body: &[u8]) -> Option<String> {
    let reply: ErrorReply = serde_json::from_slice(body).ok()?;
    if reply.kind.is_empty() || reply.kind == "error" {
        Some(reply.message)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct StatReply {
    #[serde(rename = "Hash", default)]
    hash: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "CumulativeSize", default)]
    cumulative_size: u64,
    #[serde(rename = "Blocks", default)]
    blocks: u64,
    #[serde(rename = "Type", default)]
    kind: String,
}

/// Parsed `files/stat` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInfo {
    pub stat: ObjectStat,
    pub is_dir: bool,
}

pub fn parse_stat(body: &[u8]) -> Result<StatInfo> {
    let reply: StatReply = serde_json::from_slice(body).context("parse files/stat reply")?;
    Ok(StatInfo {
        is_dir: reply.kind == "directory",
        stat: ObjectStat {
            hash: reply.hash,
            size: reply.size,
            cumulative_size: reply.cumulative_size,
            blocks: reply.blocks,
        },
    })
}

/// One line of a `pin/add?progress=true` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinLine {
    Progress(u64),
    Pinned,
    Error(String),
    Other,
}

#[derive(Debug, Deserialize)]
struct PinReply {
    #[serde(rename = "Progress")]
    progress: Option<u64>,
    #[serde(rename = "Pins")]
    pins: Option<Vec<String>>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

pub fn parse_pin_line(line: &str) -> Result<PinLine> {
    let reply: PinReply = serde_json::from_str(line).context("parse pin/add line")?;
    if reply.pins.is_some() {
        return Ok(PinLine::Pinned);
    }
    if let Some(n) = reply.progress {
        return Ok(PinLine::Progress(n));
    }
    if let Some(msg) = reply.message {
        return Ok(PinLine::Error(msg));
    }
    Ok(PinLine::Other)
}

#[derive(Debug, Deserialize)]
struct ProvResponse {
    #[serde(rename = "ID", default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ProvReply {
    #[serde(rename = "Type", default)]
    kind: i64,
    #[serde(rename = "Responses", default)]
    responses: Option<Vec<ProvResponse>>,
}

/// Peer ids announced as providers by one `routing/findprovs` line.
pub fn provider_ids(line: &str) -> Vec<String> {
    match serde_json::from_str::<ProvReply>(line) {
        Ok(reply) if reply.kind == PROVIDER_RECORD => reply
            .responses
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.id)
            .filter(|id| !id.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
