//! Delete command implementation.

use anyhow::{Context, Result};
use tracing::info;
use vigil_api::{ClientConfig, HttpTransport, RuleSaveWorkflow};
use vigil_rule::RuleKind;

/// Runs the delete command.
pub async fn run(id: &str, kind: RuleKind, config: ClientConfig) -> Result<()> {
    let transport = HttpTransport::new(config).with_context(|| "Failed to create API client")?;
    let mut workflow = RuleSaveWorkflow::new(transport);

    if let Err(err) = workflow.delete(kind, id).await {
        anyhow::bail!(err.message());
    }

    info!("Deleted {} rule {}", kind, id);
    Ok(())
}
