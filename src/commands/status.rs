use anyhow::{Context, Result};
use omnical_core::config::{MappingConfig, OmnicalConfig, SyncPass};
use omnical_core::state::JsonStateStore;
use omnical_core::sync::{Plan, plan_pass};
use owo_colors::OwoColorize;

use crate::render::{Render, render_plan};

/// Print what a sync would do, changing nothing.
pub async fn run(
    config: &OmnicalConfig,
    mappings: Vec<(usize, &MappingConfig)>,
    verbose: bool,
) -> Result<()> {
    for (i, (index, mapping)) in mappings.iter().enumerate() {
        println!("{}", format!("[{index}] {mapping}").bold());

        for pass in mapping.passes() {
            println!("{}", pass.render());
            match plan_one(config, &pass).await {
                Ok(plan) => println!("{}", render_plan(&plan, verbose)),
                Err(e) => println!("   {}", format!("{e:#}").red()),
            }
        }

        if i < mappings.len() - 1 {
            println!();
        }
    }

    Ok(())
}

async fn plan_one(config: &OmnicalConfig, pass: &SyncPass) -> Result<Plan> {
    let source = config.remote(&pass.source)?;
    let target = config.remote(&pass.target)?;

    let state_path = config.state_path(pass)?;
    let state = JsonStateStore::open(&state_path, pass.policy.mode)
        .with_context(|| format!("Could not open sync state {}", state_path.display()))?;

    Ok(plan_pass(&pass.policy, &source, &target, &state).await?)
}
