//! Thin client for the Aleph-style posting/storage network.
//!
//! The network is an external collaborator: this client only knows how to
//! wrap content into signed message envelopes and move them over the node's
//! REST API. Chain-grade signing lives behind [`MessageSigner`] so a
//! different account scheme can be dropped in without touching call sites.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::BackendError;

type HmacSha256 = Hmac<Sha256>;

/// Runtime image executing deployed agent programs
pub const PROGRAM_RUNTIME: &str =
    "63f07193e6ee9d207b7d1fcf8286f9aee34e6f12f101d2ec77c1229f92964696";

/// Entrypoint invoked inside the runtime
pub const PROGRAM_ENTRYPOINT: &str = "run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    Storage,
    Ipfs,
}

/// A volume mounted into a deployed program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlephVolume {
    pub comment: String,
    pub mount: String,
    #[serde(rename = "ref")]
    pub item_ref: String,
    pub use_latest: bool,
}

/// One post returned by the node's post index
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub item_hash: String,
    pub content: Value,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<MessageEnvelope>,
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct StoredFile {
    hash: String,
}

/// The code and volume references of a deployed program
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramContent {
    pub code: ProgramCode,
    #[serde(default)]
    pub volumes: Vec<AlephVolume>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramCode {
    #[serde(rename = "ref")]
    pub item_ref: String,
}

/// Signs message digests on behalf of the backend account
pub trait MessageSigner: Send + Sync {
    fn address(&self) -> &str;
    fn sign(&self, digest: &[u8]) -> Result<String, BackendError>;
}

/// Keyed-digest signer over the configured sender key
pub struct KeySigner {
    address: String,
    key: Vec<u8>,
}

impl KeySigner {
    pub fn new(address: impl Into<String>, key: Vec<u8>) -> Self {
        KeySigner {
            address: address.into(),
            key,
        }
    }
}

impl MessageSigner for KeySigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, digest: &[u8]) -> Result<String, BackendError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| BackendError::Signing(e.to_string()))?;
        mac.update(digest);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Client bound to one node and one sending account
pub struct AlephClient {
    http: Client,
    api_url: String,
    channel: String,
    signer: Box<dyn MessageSigner>,
}

impl AlephClient {
    pub fn new(
        api_url: impl Into<String>,
        channel: impl Into<String>,
        signer: Box<dyn MessageSigner>,
    ) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(AlephClient {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            channel: channel.into(),
            signer,
        })
    }

    pub fn address(&self) -> &str {
        self.signer.address()
    }

    /// Wrap content into a signed envelope and broadcast it, returning the
    /// message item hash
    async fn broadcast(&self, message_type: &str, content: Value) -> Result<String, BackendError> {
        let item_content = serde_json::to_string(&content)?;
        let item_hash = hex::encode(Sha256::digest(item_content.as_bytes()));
        let signature = self.signer.sign(item_hash.as_bytes())?;

        let message = json!({
            "sender": self.signer.address(),
            "chain": "ETH",
            "type": message_type,
            "channel": self.channel,
            "time": Utc::now().timestamp_millis() as f64 / 1000.0,
            "item_type": "inline",
            "item_content": item_content,
            "item_hash": item_hash,
            "signature": signature,
        });

        let response = self
            .http
            .post(format!("{}/api/v0/messages", self.api_url))
            .json(&json!({ "message": message, "sync": true }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(item_hash),
            status => Err(BackendError::Node {
                status: status.as_u16(),
            }),
        }
    }

    /// Publish a channel post, optionally amending an earlier one
    pub async fn create_post(
        &self,
        content: Value,
        post_type: &str,
        amend_ref: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut post = json!({
            "type": post_type,
            "address": self.signer.address(),
            "content": content,
            "time": Utc::now().timestamp_millis() as f64 / 1000.0,
        });
        if let Some(amended) = amend_ref {
            post["ref"] = json!(amended);
        }
        self.broadcast("POST", post).await
    }

    /// Push raw bytes to the node's storage and return their content hash
    pub async fn upload_file_content(&self, content: Vec<u8>) -> Result<String, BackendError> {
        let part = reqwest::multipart::Part::bytes(content);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/v0/storage/add_file", self.api_url))
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let stored: StoredFile = response.json().await?;
                Ok(stored.hash)
            }
            status => Err(BackendError::Node {
                status: status.as_u16(),
            }),
        }
    }

    /// Register stored content under a STORE message, optionally versioning
    /// a previous reference. Returns the store message hash used as the ref.
    pub async fn create_store(
        &self,
        file_hash: &str,
        engine: StorageEngine,
        previous_ref: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut content = json!({
            "address": self.signer.address(),
            "item_type": engine,
            "item_hash": file_hash,
            "time": Utc::now().timestamp_millis() as f64 / 1000.0,
        });
        if let Some(previous) = previous_ref {
            content["ref"] = json!(previous);
        }
        self.broadcast("STORE", content).await
    }

    /// Register a serverless program over uploaded code, returning its hash
    pub async fn create_program(
        &self,
        code_ref: &str,
        entrypoint: &str,
        runtime: &str,
        volumes: Vec<AlephVolume>,
    ) -> Result<String, BackendError> {
        let content = json!({
            "type": "vm-function",
            "address": self.signer.address(),
            "time": Utc::now().timestamp_millis() as f64 / 1000.0,
            "allow_amend": false,
            "code": {
                "encoding": "squashfs",
                "entrypoint": entrypoint,
                "ref": code_ref,
                "use_latest": true,
            },
            "on": { "http": true, "persistent": false },
            "runtime": {
                "ref": runtime,
                "use_latest": true,
                "comment": "Official runtime",
            },
            "resources": {
                "vcpus": 1,
                "memory": 256,
                "seconds": 30,
            },
            "environment": {
                "reproducible": false,
                "internet": true,
                "aleph_api": true,
            },
            "volumes": volumes,
        });
        self.broadcast("PROGRAM", content).await
    }

    /// Fetch posts published by this account on this channel, filtered by tag
    pub async fn get_posts(&self, tags: &[String]) -> Result<Vec<Post>, BackendError> {
        let response = self
            .http
            .get(format!("{}/api/v0/posts.json", self.api_url))
            .query(&[
                ("addresses", self.signer.address().to_string()),
                ("tags", tags.join(",")),
                ("channels", self.channel.clone()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let parsed: PostsResponse = response.json().await?;
                Ok(parsed.posts)
            }
            status => Err(BackendError::Node {
                status: status.as_u16(),
            }),
        }
    }

    /// Fetch the content of a deployed program message
    pub async fn get_program(&self, item_hash: &str) -> Result<ProgramContent, BackendError> {
        let response = self
            .http
            .get(format!("{}/api/v0/messages.json", self.api_url))
            .query(&[("hashes", item_hash)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let parsed: MessagesResponse = response.json().await?;
                let envelope = parsed
                    .messages
                    .into_iter()
                    .next()
                    .ok_or_else(|| BackendError::ProgramNotFound(item_hash.to_string()))?;
                Ok(serde_json::from_value(envelope.content)?)
            }
            status => Err(BackendError::Node {
                status: status.as_u16(),
            }),
        }
    }
}
