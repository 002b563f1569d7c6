//! Drivers backed by a Kubo-compatible HTTP RPC API (`/api/v0/...`).
//!
//! Every call is a libcurl POST run on the blocking pool. Streaming calls
//! (`pin/add`, `cat`, `routing/findprovs`) push into a progress channel from
//! the curl write callback and abort the transfer once the receiver is gone.

pub mod parse;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::drivers::{
    progress_channel, DownloadDriver, DownloadEvent, ManifestSource, ObjectStat, PinDriver,
    PinEvent, ProgressSender, ProgressStream, ProviderLookup, SeedManifest, StatDriver,
    PROGRESS_BUFFER,
};
use crate::naming::landing_path;
use parse::{LineBuffer, PinLine};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Upper bound on short request/response calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound on a provider lookup that never reaches its peer limit.
const FINDPROVS_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_CURL_BUFFER: u64 = 512 * 1024;

/// Client for one Kubo node.
#[derive(Debug, Clone)]
pub struct KuboClient {
    base: Url,
}

impl KuboClient {
    /// `api` is the node's RPC address, e.g. `http://127.0.0.1:5001`.
    pub fn new(api: &str) -> Result<Self> {
        let mut base = Url::parse(api).with_context(|| format!("invalid kubo api url {:?}", api))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let base = base.join("api/v0/").context("build api base url")?;
        Ok(Self { base })
    }

    fn endpoint(&self, command: &str, args: &[(&str, &str)]) -> Result<String> {
        let mut url = self
            .base
            .join(command)
            .with_context(|| format!("build url for {}", command))?;
        if !args.is_empty() {
            let mut query = url.query_pairs_mut();
            for (k, v) in args {
                query.append_pair(k, v);
            }
        }
        Ok(url.to_string())
    }

    /// POST and collect the whole reply.
    async fn call(&self, url: String) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || post_collect(&url))
            .await
            .context("rpc task join")?
    }

    async fn stat_info(&self, path: &str) -> Result<parse::StatInfo> {
        let arg = parse::ipfs_path(path);
        let url = self.endpoint("files/stat", &[("arg", &arg)])?;
        let body = self.call(url).await?;
        parse::parse_stat(&body)
    }
}

fn new_easy(url: &str, timeout: Duration) -> Result<curl::easy::Easy> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    // The RPC API only accepts POST.
    easy.post(true)?;
    easy.post_fields_copy(b"")?;
    easy.connect_timeout(CONNECT_TIMEOUT)?;
    easy.timeout(timeout)?;
    Ok(easy)
}

fn check_status(easy: &mut curl::easy::Easy, url: &str, body: &[u8]) -> Result<()> {
    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        match parse::error_message(body) {
            Some(msg) => anyhow::bail!("{}", msg),
            None => anyhow::bail!("POST {} returned HTTP {}", url, code),
        }
    }
    Ok(())
}

fn post_collect(url: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut easy = new_easy(url, CALL_TIMEOUT)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform().context("rpc request failed")?;
    }
    check_status(&mut easy, url, &body)?;
    Ok(body)
}

/// POST and hand each NDJSON line to `on_line` until it returns false.
/// Returns true if the body ran to its end.
fn post_lines(url: &str, timeout: Duration, mut on_line: impl FnMut(&str) -> bool) -> Result<bool> {
    let mut lines = LineBuffer::default();
    let mut raw = Vec::new();
    let mut stopped = false;
    let mut easy = new_easy(url, timeout)?;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if raw.len() < 4096 {
                raw.extend_from_slice(data);
            }
            for line in lines.push(data) {
                if !on_line(&line) {
                    stopped = true;
                    return Ok(0);
                }
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };
    if stopped {
        return Ok(false);
    }
    performed.context("rpc stream failed")?;
    check_status(&mut easy, url, &raw)?;
    if let Some(line) = lines.finish() {
        if !on_line(&line) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn pin_blocking(url: &str, tx: &ProgressSender<PinEvent>) -> Result<()> {
    let mut outcome: Option<PinEvent> = None;
    post_lines(url, Duration::ZERO, |line| {
        if tx.is_closed() {
            return false;
        }
        match parse::parse_pin_line(line) {
            Ok(PinLine::Progress(nodes)) => tx.blocking_send(PinEvent::Progress { nodes }),
            Ok(PinLine::Pinned) => {
                outcome = Some(PinEvent::Done);
                true
            }
            Ok(PinLine::Error(msg)) => {
                outcome = Some(PinEvent::Failed(msg));
                false
            }
            Ok(PinLine::Other) => true,
            Err(e) => {
                tracing::debug!("ignoring pin line {:?}: {:#}", line, e);
                true
            }
        }
    })?;
    if let Some(event) = outcome {
        tx.blocking_send(event);
    }
    Ok(())
}

fn cat_blocking(
    url: &str,
    landing: &Path,
    content_length: u64,
    chunk_size: u64,
    tx: &ProgressSender<DownloadEvent>,
) -> Result<u64> {
    if let Some(parent) = landing.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let part = landing.with_extension("part");
    let mut file = File::create(&part).with_context(|| format!("create {}", part.display()))?;
    let mut bytes_read: u64 = 0;
    let mut next_report = chunk_size;
    let mut write_err: Option<std::io::Error> = None;
    let mut head = Vec::new();

    let mut easy = new_easy(url, Duration::ZERO)?;
    easy.buffer_size(chunk_size.clamp(16 * 1024, MAX_CURL_BUFFER) as usize)?;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if tx.is_closed() {
                return Ok(0);
            }
            if head.len() < 4096 {
                head.extend_from_slice(&data[..data.len().min(4096)]);
            }
            if let Err(e) = file.write_all(data) {
                write_err = Some(e);
                return Ok(0);
            }
            bytes_read += data.len() as u64;
            if bytes_read >= next_report {
                next_report = bytes_read + chunk_size;
                tx.blocking_send(DownloadEvent::Progress {
                    bytes_read,
                    content_length,
                });
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    let result = (|| -> Result<()> {
        if let Some(e) = write_err.take() {
            return Err(e).with_context(|| format!("write {}", part.display()));
        }
        if tx.is_closed() {
            anyhow::bail!("download abandoned");
        }
        performed.context("cat request failed")?;
        check_status(&mut easy, url, &head)?;
        if content_length > 0 && bytes_read != content_length {
            anyhow::bail!("partial transfer: read {} of {}", bytes_read, content_length);
        }
        file.sync_all().context("sync download")?;
        std::fs::rename(&part, landing)
            .with_context(|| format!("rename to {}", landing.display()))?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = std::fs::remove_file(&part);
        return Err(e);
    }
    Ok(bytes_read)
}

#[async_trait]
impl StatDriver for KuboClient {
    async fn stat(&self, path: &str) -> Result<ObjectStat> {
        Ok(self.stat_info(path).await?.stat)
    }
}

#[async_trait]
impl PinDriver for KuboClient {
    async fn pin(&self, path: &str) -> Result<ProgressStream<PinEvent>> {
        let arg = parse::ipfs_path(path);
        let url = self.endpoint("pin/add", &[("arg", &arg), ("progress", "true")])?;
        let (tx, rx) = progress_channel(PROGRESS_BUFFER);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = pin_blocking(&url, &tx) {
                tx.blocking_send(PinEvent::Failed(format!("{:#}", e)));
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl DownloadDriver for KuboClient {
    async fn get(&self, path: &str, dest_dir: &Path, chunk_size: u64) -> Result<ProgressStream<DownloadEvent>> {
        let info = self.stat_info(path).await?;
        if info.is_dir {
            anyhow::bail!("{} is a directory; only file objects can be downloaded", path);
        }
        let landing: PathBuf = landing_path(dest_dir, &info.stat.hash)
            .with_context(|| format!("no usable hash for {} (got {:?})", path, info.stat.hash))?;
        let arg = parse::ipfs_path(path);
        let url = self.endpoint("cat", &[("arg", &arg)])?;
        let content_length = info.stat.size;
        let chunk_size = chunk_size.max(1);

        let (tx, rx) = progress_channel(PROGRESS_BUFFER);
        tokio::task::spawn_blocking(move || {
            match cat_blocking(&url, &landing, content_length, chunk_size, &tx) {
                Ok(bytes_read) => {
                    tx.blocking_send(DownloadEvent::Done {
                        bytes_read,
                        content_length,
                        path: landing,
                    });
                }
                Err(e) => {
                    tx.blocking_send(DownloadEvent::Failed(format!("{:#}", e)));
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl ProviderLookup for KuboClient {
    async fn find_providers(&self, path: &str, num_providers: u32) -> Result<u32> {
        let cid = parse::root_cid(path)
            .with_context(|| format!("no cid in {:?}", path))?
            .to_string();
        let num = num_providers.max(1).to_string();
        let url = self.endpoint("routing/findprovs", &[("arg", &cid), ("num-providers", &num)])?;
        let limit = num_providers.max(1) as usize;
        tokio::task::spawn_blocking(move || -> Result<u32> {
            let mut seen = HashSet::new();
            post_lines(&url, FINDPROVS_TIMEOUT, |line| {
                seen.extend(parse::provider_ids(line));
                seen.len() < limit
            })?;
            Ok(seen.len().min(limit) as u32)
        })
        .await
        .context("findprovs task join")?
    }
}

#[async_trait]
impl ManifestSource for KuboClient {
    async fn load(&self, dag_cid: &str) -> Result<SeedManifest> {
        let url = self.endpoint("dag/get", &[("arg", dag_cid)])?;
        let body = self.call(url).await?;
        serde_json::from_slice(&body).with_context(|| format!("parse manifest of {}", dag_cid))
    }
}
