//! Client for the Orka image resources.
//!
//! Only the two calls the image step needs are implemented: committing a VM's
//! attached image in place and saving a VM's disk as a new image.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ImageError;

/// Image operations can take a long time on large disks.
pub const IMAGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Which image resource a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOperation {
    /// Re-persist the VM's attached image in place
    Commit,
    /// Create a new named image from the VM's disk
    Save,
}

impl ImageOperation {
    /// Path below the API endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            ImageOperation::Commit => "resources/image/commit",
            ImageOperation::Save => "resources/image/save",
        }
    }

    /// Message prefix reported after a successful call.
    pub fn completed(&self) -> &'static str {
        match self {
            ImageOperation::Commit => "Image committed",
            ImageOperation::Save => "Image saved",
        }
    }
}

/// Body of `POST resources/image/commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCommitRequest {
    /// VM whose attached image is committed
    #[serde(rename = "VMID")]
    pub vmid: String,
}

/// Reply to a commit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageCommitResponse {
    /// Free-form status text from the API
    #[serde(default)]
    pub message: String,
}

/// Body of `POST resources/image/save`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSaveRequest {
    /// VM whose disk is saved
    #[serde(rename = "VMID")]
    pub vmid: String,
    /// Name of the new image
    #[serde(rename = "ImageName")]
    pub image_name: String,
}

/// Reply to a save request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImageSaveResponse {
    /// Free-form status text from the API
    #[serde(default)]
    pub message: String,
}

/// A successful API reply.
#[derive(Debug)]
pub struct ApiReply<T> {
    /// Always `200 OK`; kept for operator messages
    pub status: StatusCode,
    /// Decoded body, or the default value if it could not be decoded
    pub body: T,
}

/// Blocking client bound to one endpoint and token.
#[derive(Debug)]
pub struct ImageClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl ImageClient {
    /// Client whose requests, including reading the reply, are bounded by `timeout`.
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, ImageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    /// Full URL for an operation.
    pub fn url(&self, op: ImageOperation) -> String {
        format!("{}/{}", self.endpoint, op.path())
    }

    /// Commit the VM's attached image in place.
    pub fn commit(
        &self,
        req: &ImageCommitRequest,
    ) -> Result<ApiReply<ImageCommitResponse>, ImageError> {
        self.post(ImageOperation::Commit, req)
    }

    /// Save the VM's disk as a new named image.
    pub fn save(&self, req: &ImageSaveRequest) -> Result<ApiReply<ImageSaveResponse>, ImageError> {
        self.post(ImageOperation::Save, req)
    }

    #[instrument(skip_all, fields(op = ?op))]
    fn post<Req, Resp>(&self, op: ImageOperation, req: &Req) -> Result<ApiReply<Resp>, ImageError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Default,
    {
        let url = self.url(op);
        debug!("POST {url}");
        let r = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(req)
            .send()?;
        let status = r.status();
        debug!("status={status}");
        // The body is informational only; a missing or malformed one is not an error.
        let body = match r.bytes() {
            Ok(buf) => serde_json::from_slice(&buf).unwrap_or_else(|e| {
                debug!("Ignoring undecodable response body: {e}");
                Resp::default()
            }),
            Err(e) => {
                debug!("Failed to read response body: {e}");
                Resp::default()
            }
        };
        if status != StatusCode::OK {
            return Err(ImageError::Status(status));
        }
        Ok(ApiReply { status, body })
    }
}
