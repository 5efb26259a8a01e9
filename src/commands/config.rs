use anyhow::{Context, Result};
use omnical_core::config::OmnicalConfig;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run() -> Result<()> {
    let config_path = OmnicalConfig::config_path()?;
    let config = OmnicalConfig::load_from(&config_path)
        .with_context(|| format!("Could not load configuration from {}", config_path.display()))?;

    println!("{}", "Paths".bold());
    println!("  Config:   {}", config_path.display());
    println!("  State:    {}", config.state_dir()?.display());
    println!(
        "  Timeout:  {}s per provider call",
        config.provider_timeout()?.as_secs()
    );

    println!("\n{}", "Accounts".bold());
    for account in &config.accounts {
        let binary = match account.provider.binary_path() {
            Ok(path) => path.display().to_string().dimmed().to_string(),
            Err(_) => format!("{} not found in PATH", account.provider.binary_name())
                .red()
                .to_string(),
        };
        println!("  {} ({}) {}", account.name, account.provider.name(), binary);
    }

    println!("\n{}", "Mappings".bold());
    for (index, mapping) in config.mappings.iter().enumerate() {
        println!("  [{index}] {mapping}");
        for pass in mapping.passes() {
            println!("      {}", pass.render());
            println!(
                "        {}",
                config.state_path(&pass)?.display().to_string().dimmed()
            );
        }
    }

    Ok(())
}
