//! Wiring between command-line options and the client library.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storefront_client::Storefront;
use storefront_core::{
    ApiEnvelope, ClientConfig, CredentialStore, FileStore, MemoryStore, create_persisted_store,
};
use tracing::debug;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => ClientConfig::default_path(),
    };
    debug!("Loading configuration from {:?}", path);
    ClientConfig::load(path.as_deref()).context("failed to load configuration")
}

/// Credential store for one CLI invocation.
///
/// The session tier lives only as long as the process, so only logins made
/// with `--remember` carry over to the next command.
pub fn open_credentials(use_keyring: bool, store_path: Option<PathBuf>) -> Result<CredentialStore> {
    let path = match store_path {
        Some(path) => path,
        None => FileStore::default_path().context("no data directory for the credential file")?,
    };
    let persisted = create_persisted_store(use_keyring, path)
        .context("failed to open remembered credential storage")?;
    Ok(CredentialStore::new(
        Arc::new(MemoryStore::new()),
        Arc::from(persisted),
    ))
}

/// Build the service bundle.
pub fn connect(config: ClientConfig, credentials: CredentialStore) -> Result<Storefront> {
    Storefront::new(config, credentials).context("failed to create API client")
}

/// Write the envelope as pretty JSON. Returns whether the call succeeded.
pub fn render<T: Serialize>(envelope: &ApiEnvelope<T>, out: &mut impl Write) -> Result<bool> {
    serde_json::to_writer_pretty(&mut *out, envelope).context("failed to encode response")?;
    writeln!(out)?;
    Ok(envelope.is_success())
}

/// Password from `STOREFRONT_PASSWORD`, else the first line of stdin.
pub fn read_password(env: Option<String>, input: &mut impl std::io::BufRead) -> Result<String> {
    if let Some(password) = env.filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "no password given");
    Ok(password)
}
