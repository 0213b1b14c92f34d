//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use serde_json::json;

use pplx_config::mask_secret;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration (API key masked)
    Show,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let redacted = loaded.config.redacted();
    let key = loaded.api_key().ok();

    if ctx.json_output {
        let sources: Vec<String> = loaded
            .loaded_from()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let output = json!({
            "sources": sources,
            "api_key": key.as_ref().map(|k| json!({
                "value": mask_secret(&k.value),
                "source": k.source.to_string(),
            })),
            "config": redacted,
            "warnings": loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("# pplx Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    match &key {
        Some(key) => println!(
            "API key: {} {}\n",
            mask_secret(&key.value),
            dim.apply_to(format!("({})", key.source))
        ),
        None => println!(
            "API key: {}\n",
            Style::new().yellow().apply_to("not set (export PPLX_API_KEY)")
        ),
    }

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    let toml_str = redacted.to_toml()?;
    if toml_str.trim().is_empty() {
        println!("{}", dim.apply_to("(empty configuration)"));
    } else {
        println!("---\n{}", toml_str.trim_end());
    }

    if ctx.verbose {
        println!();
        for source in &loaded.sources {
            let status = if source.loaded {
                "✓ loaded"
            } else {
                "· not found"
            };
            println!("{}", dim.apply_to(format!("{} {}", status, source.path.display())));
        }
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = ctx
        .config_path
        .clone()
        .or_else(pplx_config::user_config_path);
    match path {
        Some(path) => println!("{}", path.display()),
        None => anyhow::bail!("could not determine config directory"),
    }
    Ok(())
}
