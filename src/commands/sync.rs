use anyhow::{Context, Result};
use omnical_core::config::{MappingConfig, OmnicalConfig, SyncPass};
use omnical_core::state::JsonStateStore;
use omnical_core::sync::{CancelToken, RunSummary, run_pass};
use owo_colors::OwoColorize;
use tracing::warn;

use crate::render::Render;

pub async fn run(config: &OmnicalConfig, mappings: Vec<(usize, &MappingConfig)>) -> Result<()> {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current change");
            on_interrupt.cancel();
        }
    });

    let mut failed_passes = 0;
    let mut failed_changes = 0;

    'mappings: for (i, (index, mapping)) in mappings.iter().enumerate() {
        println!("{}", format!("[{index}] {mapping}").bold());

        for pass in mapping.passes() {
            if cancel.is_cancelled() {
                break 'mappings;
            }

            println!("{}", pass.render());
            match run_one(config, &pass, &cancel).await {
                Ok(summary) => {
                    println!("{}", summary.render());
                    failed_changes += summary.failures.len();
                }
                Err(e) => {
                    println!("   {}", format!("{e:#}").red());
                    failed_passes += 1;
                }
            }
        }

        if i < mappings.len() - 1 {
            println!();
        }
    }

    if cancel.is_cancelled() {
        anyhow::bail!("Sync interrupted");
    }
    if failed_passes > 0 || failed_changes > 0 {
        anyhow::bail!(
            "{failed_passes} pass(es) failed, {failed_changes} change(s) failed"
        );
    }

    Ok(())
}

async fn run_one(
    config: &OmnicalConfig,
    pass: &SyncPass,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let source = config.remote(&pass.source)?;
    let target = config.remote(&pass.target)?;

    let state_path = config.state_path(pass)?;
    let mut state = JsonStateStore::open(&state_path, pass.policy.mode)
        .with_context(|| format!("Could not open sync state {}", state_path.display()))?;

    let summary = run_pass(&pass.policy, &source, &target, &mut state, cancel).await?;
    Ok(summary)
}
