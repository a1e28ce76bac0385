//! Session status action.

use crate::auth::api::{AuthBackend, HttpBackend};
use crate::auth::store::CredentialStore;
use crate::cli::globals::GlobalArgs;
use anyhow::Result;

pub async fn handle(globals: &GlobalArgs) -> Result<()> {
    let store = CredentialStore::new(&globals.token_file);
    let Some(token) = store.load() else {
        println!("Not signed in.");
        return Ok(());
    };

    let backend = HttpBackend::new(&globals.api_url)?;
    let status = backend.status(&token).await?;

    if status.authenticated {
        println!("Signed in.");
    } else {
        // The backend no longer knows this session; drop the local copy.
        store.clear()?;
        println!("Session expired. Sign in again.");
    }

    Ok(())
}
