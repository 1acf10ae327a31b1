//! Upload of code and dependency bundles, with versioning.
//!
//! Buffers are registered on the network as STORE messages. Large buffers
//! are pushed through the content-addressed IPFS gateway first and only
//! their hash is broadcast.

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::aleph::{AlephClient, StorageEngine};
use crate::error::BackendError;

/// Above this size the buffer goes through the IPFS gateway
pub const MAX_DIRECT_STORE_SIZE: usize = 50 * 1024 * 1024;

/// Above this size the ipfs storage engine is used
const IPFS_ENGINE_THRESHOLD: usize = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct IpfsAdded {
    #[serde(rename = "Hash")]
    hash: String,
}

fn engine_for(size: usize) -> StorageEngine {
    if size > IPFS_ENGINE_THRESHOLD {
        StorageEngine::Ipfs
    } else {
        StorageEngine::Storage
    }
}

fn uses_gateway(size: usize) -> bool {
    size > MAX_DIRECT_STORE_SIZE
}

/// Upload a file on the IPFS gateway and return its CID
async fn upload_on_ipfs(
    gateway_url: &str,
    content: Vec<u8>,
    filename: Option<&str>,
) -> Result<String, BackendError> {
    let mut part = reqwest::multipart::Part::bytes(content);
    if let Some(name) = filename {
        part = part.file_name(name.to_string());
    }
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = Client::new()
        .post(format!("{}/api/v0/add", gateway_url.trim_end_matches('/')))
        .multipart(form)
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => {
            let added: IpfsAdded = response.json().await?;
            Ok(added.hash)
        }
        status => Err(BackendError::Node {
            status: status.as_u16(),
        }),
    }
}

/// Upload a file, using the IPFS gateway if needed, and return the STORE
/// message ref. `previous_ref` chains the new version onto the old one.
pub async fn upload_file(
    client: &AlephClient,
    gateway_url: &str,
    content: Vec<u8>,
    filename: Option<&str>,
    previous_ref: Option<&str>,
) -> Result<String, BackendError> {
    let size = content.len();
    let engine = engine_for(size);

    let file_hash = if uses_gateway(size) {
        upload_on_ipfs(gateway_url, content, filename).await?
    } else {
        client.upload_file_content(content).await?
    };

    client.create_store(&file_hash, engine, previous_ref).await
}
