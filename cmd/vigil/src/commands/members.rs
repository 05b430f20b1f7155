//! Members command implementation.

use anyhow::{Context, Result};
use vigil_api::{ClientConfig, HttpTransport, MemberCache};

/// Runs the members command.
pub async fn run(config: ClientConfig) -> Result<()> {
    let transport = HttpTransport::new(config).with_context(|| "Failed to create API client")?;
    let members = MemberCache::new()
        .load(&transport)
        .await
        .with_context(|| "Failed to list members")?;

    for member in members.iter() {
        println!("{}\t{}\t{}", member.id, member.name, member.email);
    }
    Ok(())
}
