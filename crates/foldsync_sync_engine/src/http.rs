//! HTTP transport implementation.
//!
//! Every remote operation is one JSON `POST` to `<server_url>?action=<name>`.
//! The actual HTTP client is abstracted via [`HttpClient`] so the same
//! transport runs over `reqwest` in production and over an in-process
//! server in tests.

use crate::error::{SyncError, SyncResult};
use crate::transport::{Downloaded, RemoteApi, RemoteConnector};
use foldsync_codec::Hash;
use foldsync_core::{BranchName, RepoConfig};
use foldsync_storage::{ObjectEntry, Timestamp};
use foldsync_sync_protocol::{
    from_body, to_body, Action, CreateRequest, CreateResponse, DownloadRequest,
    DownloadResponse, ErrorResponse, GetHeadRequest, GetHeadResponse, HeadUpdate,
    SetHeadRequest, SetHeadResponse, UploadRequest, UploadResponse, WireObject,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Status and body of an HTTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A 200 reply.
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. `Err` means
/// no reply was received at all; error statuses come back as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        (**self).post(url, body)
    }
}

fn post_json<C, Req, Res>(client: &C, server_url: &str, action: Action, request: &Req) -> SyncResult<Res>
where
    C: HttpClient + ?Sized,
    Req: Serialize,
    Res: DeserializeOwned,
{
    let body = to_body(request)?;
    let url = action.url(server_url);
    let reply = client
        .post(&url, body)
        .map_err(SyncError::transport_retryable)?;
    if reply.status != 200 {
        let message = from_body::<ErrorResponse>(&reply.body)
            .map(|e| e.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&reply.body).into_owned());
        return Err(SyncError::Remote {
            status: reply.status,
            message,
        });
    }
    Ok(from_body(&reply.body)?)
}

fn entry_from_wire(object: WireObject) -> SyncResult<ObjectEntry> {
    let content = object.decode_content()?;
    Ok(ObjectEntry {
        hash: object.hash,
        content,
        mtime: object.mtime.map_or_else(Timestamp::now, Timestamp::from_secs),
    })
}

/// [`RemoteApi`] over JSON-over-HTTP.
pub struct HttpTransport<C: HttpClient> {
    server_url: String,
    repo_id: String,
    api_key: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for one remote repository.
    pub fn new(config: &RepoConfig, client: C) -> Self {
        Self {
            server_url: config.server_url.clone(),
            repo_id: config.repo_id.clone(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// Returns the endpoint URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        action: Action,
        request: &Req,
    ) -> SyncResult<Res> {
        post_json(&self.client, &self.server_url, action, request).inspect_err(|e| {
            debug!(%action, error = %e, retryable = e.is_retryable(), "request failed");
        })
    }
}

impl<C: HttpClient> RemoteApi for HttpTransport<C> {
    fn repo_id(&self) -> &str {
        &self.repo_id
    }

    fn get_head(&self, branch: &BranchName) -> SyncResult<Option<Hash>> {
        let reply: GetHeadResponse = self.post(
            Action::GetHead,
            &GetHeadRequest {
                repo_id: self.repo_id.clone(),
                branch: branch.to_string(),
                allow_nonexistent: true,
                api_key: self.api_key.clone(),
            },
        )?;
        Ok(reply.hash)
    }

    fn set_head(
        &self,
        branch: &BranchName,
        current: Option<&Hash>,
        next: &Hash,
    ) -> SyncResult<HeadUpdate> {
        let reply: SetHeadResponse = self.post(
            Action::SetHead,
            &SetHeadRequest {
                repo_id: self.repo_id.clone(),
                branch: branch.to_string(),
                current: current.cloned(),
                next: next.clone(),
                api_key: self.api_key.clone(),
            },
        )?;
        Ok(reply.into_update()?)
    }

    fn upload(&self, objects: &[ObjectEntry]) -> SyncResult<Timestamp> {
        let reply: UploadResponse = self.post(
            Action::Upload,
            &UploadRequest {
                repo_id: self.repo_id.clone(),
                api_key: self.api_key.clone(),
                objects: objects
                    .iter()
                    .map(|o| WireObject::encode(o.hash.clone(), &o.content, None))
                    .collect(),
            },
        )?;
        debug!(count = objects.len(), timestamp = reply.timestamp, "uploaded");
        Ok(Timestamp::from_secs(reply.timestamp))
    }

    fn download_since(&self, since: Timestamp) -> SyncResult<Downloaded> {
        let reply: DownloadResponse = self.post(
            Action::Download,
            &DownloadRequest {
                repo_id: self.repo_id.clone(),
                api_key: self.api_key.clone(),
                since: Some(since.as_secs()),
                hash_list: None,
            },
        )?;
        Ok(Downloaded {
            objects: reply
                .objects
                .into_iter()
                .map(entry_from_wire)
                .collect::<SyncResult<_>>()?,
            newest: Timestamp::from_secs(reply.newest),
        })
    }

    fn download(&self, hashes: &[Hash]) -> SyncResult<Vec<ObjectEntry>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let reply: DownloadResponse = self.post(
            Action::Download,
            &DownloadRequest {
                repo_id: self.repo_id.clone(),
                api_key: self.api_key.clone(),
                since: None,
                hash_list: Some(hashes.to_vec()),
            },
        )?;
        reply.objects.into_iter().map(entry_from_wire).collect()
    }
}

/// [`RemoteConnector`] building [`HttpTransport`]s over a shared client.
pub struct HttpConnector<C: HttpClient> {
    client: Arc<C>,
}

impl<C: HttpClient> HttpConnector<C> {
    /// Creates a connector.
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl<C: HttpClient + 'static> RemoteConnector for HttpConnector<C> {
    fn create_repository(&self, server_url: &str, api_key: &str) -> SyncResult<String> {
        let reply: CreateResponse = post_json(
            self.client.as_ref(),
            server_url,
            Action::Create,
            &CreateRequest {
                api_key: api_key.to_string(),
            },
        )?;
        Ok(reply.repo_id)
    }

    fn connect(&self, config: &RepoConfig) -> SyncResult<Arc<dyn RemoteApi>> {
        Ok(Arc::new(HttpTransport::new(config, Arc::clone(&self.client))))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles `POST <path>` and returns the reply.
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// The server requests are routed to.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        // Keep path and query, drop scheme and host
        let path = url
            .split_once("://")
            .map_or(url, |(_, rest)| rest.find('/').map_or("/", |i| &rest[i..]));
        Ok(self.server.handle_post(path, &body))
    }
}
