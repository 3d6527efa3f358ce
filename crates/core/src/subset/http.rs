//! JSON-WSP implementation of the subset service.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::config::SubsetConfig;
use super::error::{DownloadError, SubsetError};
use super::traits::SubsetService;
use super::types::{JobStatus, ResultPage, StatusReport, SubsetRequest};

const FAULT_TYPE: &str = "jsonwsp/fault";

/// Subset service reached over HTTP.
pub struct HttpSubsetService {
    client: Client,
    endpoint: String,
    results_url: String,
}

#[derive(Debug, Deserialize)]
struct WspStatus {
    #[serde(rename = "jobId")]
    job_id: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "PercentCompleted", default)]
    percent_completed: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpSubsetService {
    pub fn new(config: &SubsetConfig) -> Result<Self, SubsetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(SubsetError::from_reqwest)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            results_url: config.results_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends one JSON-WSP call and returns its `result` member.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Value,
    ) -> Result<T, SubsetError> {
        let body = envelope(method, args);
        debug!(method, "JSON-WSP request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(SubsetError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(SubsetError::from_reqwest)?;

        if !status.is_success() {
            return Err(SubsetError::Http {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        parse_result(&text)
    }
}

fn envelope(method: &str, args: Value) -> Value {
    json!({
        "methodname": method,
        "type": "jsonwsp/request",
        "version": "1.0",
        "args": args,
    })
}

fn subset_args(request: &SubsetRequest) -> Value {
    json!({
        "role": "subset",
        "start": format!("{}T00:00:00Z", request.begin.format("%Y-%m-%d")),
        "end": format!("{}T23:59:59Z", request.end.format("%Y-%m-%d")),
        "box": request.bounding_box.as_array(),
        "crop": request.crop,
        "data": [{
            "datasetId": request.dataset,
            "variable": request.variable,
        }],
    })
}

/// Decodes a JSON-WSP response body, surfacing faults.
fn parse_result<T: DeserializeOwned>(text: &str) -> Result<T, SubsetError> {
    if text.trim().is_empty() {
        return Err(SubsetError::decode("empty response body"));
    }

    let mut value: Value = serde_json::from_str(text).map_err(|e| SubsetError::decode(e.to_string()))?;

    if value.get("type").and_then(Value::as_str) == Some(FAULT_TYPE) {
        let fault = value.get("fault");
        let code = fault
            .and_then(|f| f.get("code"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let reason = fault
            .and_then(|f| f.get("string"))
            .and_then(Value::as_str)
            .unwrap_or("no fault description");
        return Err(SubsetError::malformed(format!("fault {}: {}", code, reason)));
    }

    let result = value
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| SubsetError::malformed("response has no result member"))?;

    serde_json::from_value(result).map_err(|e| SubsetError::malformed(e.to_string()))
}

fn into_report(status: WspStatus) -> Result<StatusReport, SubsetError> {
    let parsed = JobStatus::parse(&status.status)
        .ok_or_else(|| SubsetError::malformed(format!("unknown job status {:?}", status.status)))?;
    Ok(StatusReport {
        job_id: status.job_id,
        status: parsed,
        percent_completed: status.percent_completed,
        message: status.message,
    })
}

#[async_trait]
impl SubsetService for HttpSubsetService {
    fn name(&self) -> &str {
        "jsonwsp"
    }

    async fn submit(&self, request: &SubsetRequest) -> Result<StatusReport, SubsetError> {
        let status: WspStatus = self.call("subset", subset_args(request)).await?;
        into_report(status)
    }

    async fn status(&self, job_id: &str) -> Result<StatusReport, SubsetError> {
        let status: WspStatus = self.call("GetStatus", json!({ "jobId": job_id })).await?;
        into_report(status)
    }

    async fn result_page(
        &self,
        job_id: &str,
        start_index: usize,
        count: usize,
    ) -> Result<ResultPage, SubsetError> {
        self.call(
            "GetResult",
            json!({ "jobId": job_id, "count": count, "startIndex": start_index }),
        )
        .await
    }

    async fn result_listing(&self, job_id: &str) -> Result<Vec<String>, SubsetError> {
        let url = format!("{}/{}", self.results_url, urlencoding::encode(job_id));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(SubsetError::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(SubsetError::from_reqwest)?;
        if !status.is_success() {
            return Err(SubsetError::Http {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        write_streamed(response.bytes_stream(), dest).await
    }
}

/// Streams `chunks` into `dest` under a `.part` name, so a partial file
/// never looks complete. The partial file is removed on any failure.
async fn write_streamed<S, B, E>(chunks: S, dest: &Path) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let result = match copy_chunks(chunks, &partial).await {
        Ok(written) => tokio::fs::rename(&partial, dest)
            .await
            .map(|_| written)
            .map_err(|e| DownloadError::Write(e.to_string())),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %partial.display(), error = %e, "Could not remove partial download");
            }
        }
    }
    result
}

async fn copy_chunks<S, B, E>(chunks: S, path: &Path) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::Write(e.to_string()))?;

    let mut chunks = std::pin::pin!(chunks);
    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Transport(e.to_string()))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes)
            .await
            .map_err(|e| DownloadError::Write(e.to_string()))?;
        written += bytes.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| DownloadError::Write(e.to_string()))?;
    Ok(written)
}
