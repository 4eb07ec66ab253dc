//! CLI command implementations.

pub mod clone;
pub mod init;
pub mod inspect;
pub mod log;
pub mod scan;
pub mod sync;

use foldsync_sync_engine::{HttpConnector, ReqwestClient, SyncConfig, SyncEngine};
use std::path::Path;

/// Result of a command.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Connector talking to real servers.
pub fn connector(config: &SyncConfig) -> CliResult<HttpConnector<ReqwestClient>> {
    Ok(HttpConnector::new(ReqwestClient::new(config.request_timeout)?))
}

/// Opens the working copy containing `dir`.
pub fn open(dir: &Path, config: SyncConfig) -> CliResult<SyncEngine> {
    let connector = connector(&config)?;
    Ok(SyncEngine::open(dir, config, &connector)?)
}
