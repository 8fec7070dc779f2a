//! Task attachments over the REST endpoints.
//!
//! Requests carry the same bearer token as GraphQL calls and run through
//! the interceptor, so a 401 takes part in the shared refresh cycle.

use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::Attachment;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    attachment: Attachment,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct InlineUploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub fn task_url(client: &ApiClient, task_id: &str) -> String {
    format!("{}/api/attachments/task/{}", client.api_url(), task_id)
}

pub fn download_url(client: &ApiClient, attachment_id: &str) -> String {
    format!("{}/api/attachments/{}/download", client.api_url(), attachment_id)
}

fn attachment_url(client: &ApiClient, attachment_id: &str) -> String {
    format!("{}/api/attachments/{}", client.api_url(), attachment_id)
}

fn inline_url(client: &ApiClient) -> String {
    format!("{}/api/attachments/inline", client.api_url())
}

/// File contents plus the metadata sent in the multipart `file` field
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::validation("file", "path has no file name"))?;
        Ok(Self {
            mime_type: mime_for(&file_name),
            file_name,
            bytes,
        })
    }

    fn form(&self) -> Result<Form> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(self.mime_type)?;
        Ok(Form::new().part("file", part))
    }
}

pub async fn upload(client: &ApiClient, task_id: &str, upload: &Upload) -> Result<Attachment> {
    let url = task_url(client, task_id);
    let response = send(client, "Upload failed", |http| {
        Ok(http.post(&url).multipart(upload.form()?))
    })
    .await?;

    let body: UploadResponse = response.json().await?;
    info!(
        task_id,
        attachment_id = %body.attachment.id,
        size = body.attachment.size,
        "Uploaded attachment"
    );
    Ok(body.attachment)
}

pub async fn list(client: &ApiClient, task_id: &str) -> Result<Vec<Attachment>> {
    let url = task_url(client, task_id);
    let response = send(client, "Failed to fetch attachments", |http| Ok(http.get(&url))).await?;
    Ok(response.json().await?)
}

pub async fn delete(client: &ApiClient, attachment_id: &str) -> Result<bool> {
    let url = attachment_url(client, attachment_id);
    let response = send(client, "Delete failed", |http| Ok(http.delete(&url))).await?;
    let body: DeleteResponse = response.json().await?;
    Ok(body.success)
}

/// Upload an image for embedding in a task description; returns its URL
pub async fn upload_inline_image(client: &ApiClient, upload: &Upload) -> Result<String> {
    if !upload.mime_type.starts_with("image/") {
        return Err(Error::validation("file", "inline uploads must be images"));
    }
    let url = inline_url(client);
    let response = send(client, "Failed to upload image", |http| {
        Ok(http.post(&url).multipart(upload.form()?))
    })
    .await?;
    let body: InlineUploadResponse = response.json().await?;
    Ok(body.url)
}

/// Save an attachment to `dest`, returning the number of bytes written
pub async fn download(client: &ApiClient, attachment_id: &str, dest: &Path) -> Result<u64> {
    let url = download_url(client, attachment_id);
    let response = send(client, "Download failed", |http| Ok(http.get(&url))).await?;
    let bytes = response.bytes().await?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;
    debug!(path = %dest.display(), bytes = bytes.len(), "Saved attachment");
    Ok(bytes.len() as u64)
}

/// Default local file name for a downloaded attachment
pub fn default_destination(attachment: &Attachment) -> PathBuf {
    PathBuf::from(&attachment.original_name)
}

/// Build, authenticate and send a request through the interceptor
async fn send<F>(client: &ApiClient, fallback: &'static str, build: F) -> Result<Response>
where
    F: Fn(&reqwest::Client) -> Result<RequestBuilder>,
{
    let http = client.http();
    let build = &build;
    client
        .interceptor()
        .execute(move |token| async move {
            let mut request = build(http)?;
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            let response = request.send().await?;
            check_status(response, fallback).await
        })
        .await
}

async fn check_status(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, fallback))
}

/// Error for a non-2xx answer; the JSON `message` wins over the fallback
pub(crate) fn status_error(status: StatusCode, body: &str, fallback: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    if status == StatusCode::UNAUTHORIZED {
        Error::Unauthenticated { message }
    } else {
        Error::Http {
            status: status.as_u16(),
            message,
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") | Some("log") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
