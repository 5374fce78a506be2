//! HTTP transport for the upload client

use super::SelectedFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors raised before a response is available
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Raw answer from the analysis endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a selected file to the analysis endpoint
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn send(&self, file: &SelectedFile) -> Result<TransportResponse, ClientError>;
}

/// Multipart POST over reqwest
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn send(&self, file: &SelectedFile) -> Result<TransportResponse, ClientError> {
        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let form = Form::new().part("file", part);

        debug!(endpoint = %self.endpoint, file = %file.name, bytes = file.bytes.len(), "Uploading file");
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}
