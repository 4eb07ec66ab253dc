//! Request dispatch for the reference remote.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::repo::HostedRepo;
use foldsync_codec::{decompress, hash_bytes};
use foldsync_storage::{ObjectStore, Timestamp};
use foldsync_sync_protocol::{
    from_body, to_body, Action, CreateRequest, CreateResponse, DownloadRequest,
    DownloadResponse, ErrorResponse, GetHeadRequest, GetHeadResponse, SetHeadRequest,
    SetHeadResponse, UploadRequest, UploadResponse, WireObject,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// An in-memory remote speaking the JSON action protocol.
///
/// Holds any number of repositories, each an object pool plus branch
/// heads. Every handler is safe to call from several threads; head updates
/// are atomic compare-and-swaps.
///
/// # Example
///
/// ```
/// use foldsync_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// let (status, body) = server.handle_post("/sync?action=create", br#"{"api_key":"k"}"#);
/// assert_eq!(status, 200);
/// assert!(String::from_utf8(body).unwrap().contains("repo_id"));
/// ```
#[derive(Debug, Default)]
pub struct SyncServer {
    config: ServerConfig,
    repos: RwLock<HashMap<String, Arc<HostedRepo>>>,
}

impl SyncServer {
    /// Creates an empty server.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            repos: RwLock::new(HashMap::new()),
        }
    }

    /// Handles `POST <path>` where the query carries `action=`.
    ///
    /// Returns the HTTP status and the JSON body. Failures produce an
    /// [`ErrorResponse`] body.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let result = Action::from_url(path)
            .map_err(ServerError::from)
            .and_then(|action| self.handle(action, body));
        match result {
            Ok(reply) => (200, reply),
            Err(e) => {
                debug!(path, error = %e, "request failed");
                let reply = to_body(&ErrorResponse::new(e.to_string())).unwrap_or_default();
                (e.status_code(), reply)
            }
        }
    }

    /// Dispatches one decoded action.
    pub fn handle(&self, action: Action, body: &[u8]) -> ServerResult<Vec<u8>> {
        let reply = match action {
            Action::Create => to_body(&self.create(&from_body(body)?)?)?,
            Action::GetHead => to_body(&self.get_head(&from_body(body)?)?)?,
            Action::SetHead => to_body(&self.set_head(from_body(body)?)?)?,
            Action::Upload => to_body(&self.upload(&from_body(body)?)?)?,
            Action::Download => to_body(&self.download(&from_body(body)?)?)?,
        };
        Ok(reply)
    }

    /// `create`: allocates a repository id.
    pub fn create(&self, request: &CreateRequest) -> ServerResult<CreateResponse> {
        self.check_key(&request.api_key)?;
        let mut repos = self.repos.write();
        let repo_id = loop {
            let candidate: String = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();
            if !repos.contains_key(&candidate) {
                break candidate;
            }
        };
        repos.insert(repo_id.clone(), Arc::new(HostedRepo::new()));
        info!(%repo_id, "repository created");
        Ok(CreateResponse { repo_id })
    }

    /// `get_head`: reads a branch head.
    pub fn get_head(&self, request: &GetHeadRequest) -> ServerResult<GetHeadResponse> {
        self.check_key(&request.api_key)?;
        let repo = self.lookup(&request.repo_id)?;
        let hash = repo.head(&request.branch);
        if hash.is_none() && !request.allow_nonexistent {
            return Err(ServerError::HeadNotFound {
                repo_id: request.repo_id.clone(),
                branch: request.branch.clone(),
            });
        }
        Ok(GetHeadResponse { hash })
    }

    /// `set_head`: compare-and-swap of a branch head.
    pub fn set_head(&self, request: SetHeadRequest) -> ServerResult<SetHeadResponse> {
        self.check_key(&request.api_key)?;
        validate_branch(&request.branch)?;
        let repo = self.lookup(&request.repo_id)?;
        match repo.swap_head(&request.branch, request.current.as_ref(), request.next.clone()) {
            Ok(()) => {
                debug!(branch = %request.branch, next = %request.next, "head moved");
                Ok(SetHeadResponse::ok())
            }
            Err(Some(actual)) => {
                debug!(branch = %request.branch, %actual, "head update refused");
                Ok(SetHeadResponse::rejected(&actual))
            }
            Err(None) => Err(ServerError::HeadNotFound {
                repo_id: request.repo_id,
                branch: request.branch,
            }),
        }
    }

    /// `upload`: stores objects, skipping hashes already present.
    pub fn upload(&self, request: &UploadRequest) -> ServerResult<UploadResponse> {
        self.check_key(&request.api_key)?;
        if request.objects.len() > self.config.max_upload_batch {
            return Err(ServerError::InvalidRequest(format!(
                "too many objects: {} > {}",
                request.objects.len(),
                self.config.max_upload_batch
            )));
        }
        let repo = self.lookup(&request.repo_id)?;
        let now = Timestamp::now();
        let mut stored = 0usize;
        for object in &request.objects {
            let bytes = object.decode_content()?;
            if self.config.verify_uploads {
                let framed = decompress(&bytes).map_err(|_| ServerError::HashMismatch {
                    claimed: object.hash.to_string(),
                })?;
                if hash_bytes(&framed) != object.hash {
                    return Err(ServerError::HashMismatch {
                        claimed: object.hash.to_string(),
                    });
                }
            }
            if !repo.objects().has(&object.hash)? {
                repo.objects().put_at(&object.hash, &bytes, now);
                stored += 1;
            }
        }
        debug!(repo_id = %request.repo_id, received = request.objects.len(), stored, "upload");
        Ok(UploadResponse {
            timestamp: now.as_secs(),
        })
    }

    /// `download`: returns objects by hash list, or stored since a time.
    pub fn download(&self, request: &DownloadRequest) -> ServerResult<DownloadResponse> {
        self.check_key(&request.api_key)?;
        let repo = self.lookup(&request.repo_id)?;
        let newest = Timestamp::now();
        let mut objects = Vec::new();
        if let Some(hashes) = &request.hash_list {
            for hash in hashes {
                match repo.objects().get(hash) {
                    Ok(value) => objects.push(WireObject::encode(
                        hash.clone(),
                        &value.content,
                        Some(value.mtime.as_secs()),
                    )),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
        } else {
            let since = Timestamp::from_secs(request.since.unwrap_or(0));
            for entry in repo.objects().iterate(since)? {
                let entry = entry?;
                objects.push(WireObject::encode(
                    entry.hash,
                    &entry.content,
                    Some(entry.mtime.as_secs()),
                ));
            }
        }
        Ok(DownloadResponse {
            objects,
            newest: newest.as_secs(),
        })
    }

    /// A hosted repository by id.
    #[must_use]
    pub fn repo(&self, repo_id: &str) -> Option<Arc<HostedRepo>> {
        self.repos.read().get(repo_id).cloned()
    }

    /// Number of hosted repositories.
    #[must_use]
    pub fn repo_count(&self) -> usize {
        self.repos.read().len()
    }

    fn lookup(&self, repo_id: &str) -> ServerResult<Arc<HostedRepo>> {
        self.repo(repo_id)
            .ok_or_else(|| ServerError::RepoNotFound(repo_id.to_string()))
    }

    fn check_key(&self, api_key: &str) -> ServerResult<()> {
        if self.config.require_api_key && api_key.is_empty() {
            return Err(ServerError::InvalidRequest("missing api_key".into()));
        }
        Ok(())
    }
}

fn validate_branch(branch: &str) -> ServerResult<()> {
    let valid = !branch.is_empty()
        && branch
            .split('/')
            .all(|c| !c.is_empty() && c != "." && c != "..");
    if valid {
        Ok(())
    } else {
        Err(ServerError::InvalidRequest(format!("invalid branch {branch:?}")))
    }
}
