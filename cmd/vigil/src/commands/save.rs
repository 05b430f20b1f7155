//! Save command implementation.

use anyhow::{Context, Result};
use std::fs;
use tracing::{info, warn};
use vigil_api::{ClientConfig, HttpTransport, MemberCache, RuleSaveWorkflow, SaveError, SaveOptions};
use vigil_rule::{Rule, RuleKind};

/// Options for the save command.
pub struct Flags {
    /// Save as a copy.
    pub duplicate: bool,
    /// Origin reported to the backend.
    pub referrer: Option<String>,
    /// Check email targets against the member list.
    pub check_members: bool,
    /// Where to write the saved rule.
    pub output: Option<String>,
}

/// Runs the save command.
pub async fn run(rule_path: &str, kind: RuleKind, flags: Flags, config: ClientConfig) -> Result<()> {
    let rule = super::load_rule(rule_path, kind)?;
    info!("Saving {} rule '{}'", kind, rule.name());

    let transport = HttpTransport::new(config).with_context(|| "Failed to create API client")?;
    let mut workflow = RuleSaveWorkflow::new(transport);

    if flags.check_members && matches!(rule, Rule::Metric(_)) {
        let members = MemberCache::new();
        match members.load(workflow.transport()).await {
            Ok(list) => info!("Loaded {} members", list.len()),
            Err(e) => warn!("Could not load members, skipping target check: {}", e),
        }
        workflow = workflow.with_members(members);
    }

    let teardown = workflow.teardown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling save");
            teardown.teardown();
        }
    });

    let options = SaveOptions {
        duplicate: flags.duplicate,
        referrer: flags.referrer,
    };

    let saved = match workflow.submit(&rule, &options).await {
        Ok(saved) => saved,
        Err(err) => {
            report_failure(&err);
            anyhow::bail!(err.message());
        }
    };

    let created = saved
        .date_created()
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "Saved rule '{}' (id {}, created {})",
        saved.name(),
        saved.id().unwrap_or("-"),
        created
    );

    if let Some(path) = flags.output {
        let json = serde_json::to_string_pretty(&saved).with_context(|| "Failed to serialize rule")?;
        fs::write(&path, json).with_context(|| format!("Failed to write output file: {path}"))?;
        info!("Saved rule written to: {}", path);
    }

    Ok(())
}

fn report_failure(err: &SaveError) {
    if let Some(fields) = err.field_errors() {
        for (field, messages) in fields {
            warn!("{}: {}", field, messages.join(" "));
        }
    }
    if let Some(triggers) = err.trigger_errors() {
        for (index, field, message) in triggers.iter() {
            warn!("trigger {} {}: {}", index, field, message);
        }
    }
}
