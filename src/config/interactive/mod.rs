
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::Config;
use super::settings::MAX_TOP_K;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Retrieval Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Retrieval Defaults").bold().yellow());
    eprintln!("These values are used when a search does not override them.");
    eprintln!();

    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Routing").bold().yellow());
    eprintln!("Pages are grouped into sections when routing queries across documents.");
    eprintln!();

    configure_routing(&mut config)?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Min Similarity: {}",
        style(config.retrieval.min_similarity).cyan()
    );
    eprintln!(
        "  Deduplicate Pages: {}",
        style(config.retrieval.deduplicate_pages).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Routing Settings:").bold().yellow());
    eprintln!(
        "  Pages per Section: {}",
        style(config.routing.section_pages).cyan()
    );
    eprintln!(
        "  Min Chunks per Section: {}",
        style(config.routing.min_chunks_per_section).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| -> Result<Config> {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            let base_dir = Config::config_dir().context("Failed to determine config directory")?;
            Ok(Config {
                base_dir,
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Number of results (top K)")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input == 0 || *input > MAX_TOP_K {
                Err(format!("Top K must be between 1 and {}", MAX_TOP_K))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let min_similarity: f32 = Input::new()
        .with_prompt("Minimum similarity (-1.0 to 1.0)")
        .default(config.retrieval.min_similarity)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if input.is_finite() && (-1.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err("Minimum similarity must be between -1.0 and 1.0")
            }
        })
        .interact_text()?;

    let deduplicate_pages = Confirm::new()
        .with_prompt("Merge results from the same page into one citation?")
        .default(config.retrieval.deduplicate_pages)
        .interact()?;

    config.set_top_k(top_k)?;
    config.set_min_similarity(min_similarity)?;
    config.set_deduplicate_pages(deduplicate_pages);

    Ok(())
}

fn configure_routing(config: &mut Config) -> Result<()> {
    let section_pages: u32 = Input::new()
        .with_prompt("Pages per section")
        .default(config.routing.section_pages)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Pages per section must be at least 1")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let min_chunks_per_section: usize = Input::new()
        .with_prompt("Minimum chunks per section")
        .default(config.routing.min_chunks_per_section)
        .interact_text()?;

    config.set_section_pages(section_pages)?;
    config.routing.min_chunks_per_section = min_chunks_per_section;

    Ok(())
}
