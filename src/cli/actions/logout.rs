//! Logout action.

use crate::auth::api::{AuthBackend, HttpBackend};
use crate::auth::store::CredentialStore;
use crate::cli::globals::GlobalArgs;
use anyhow::Result;
use tracing::warn;

pub async fn handle(globals: &GlobalArgs) -> Result<()> {
    let store = CredentialStore::new(&globals.token_file);
    let Some(token) = store.load() else {
        println!("Not signed in.");
        return Ok(());
    };

    let backend = HttpBackend::new(&globals.api_url)?;

    // The local credential goes away even when the backend is unreachable.
    if let Err(err) = backend.logout(&token).await {
        warn!("logout request failed: {err}");
    }
    store.clear()?;

    println!("Signed out.");
    Ok(())
}
