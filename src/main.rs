use anyhow::Context;
use clap::Parser;
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use nutrisnap::cli::{Cli, Commands, ScanAction, Toggle};
use nutrisnap::config::{Config, API_KEY_ENV};
use nutrisnap::error::NutriSnapError;
use nutrisnap::{logging, report};
use nutrisnap::{Analyzer, Artifact, Coordinator, FileStore, KeyValueStore};
use nutrisnap_common::{
    is_known_allergy, is_known_diet, is_known_meal_type, OptionEntry, ALLERGY_OPTIONS,
    DIETARY_OPTIONS, MEAL_OPTIONS,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = Config::load().context("failed to load config")?;
    let storage_dir = config.storage_dir()?;
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&storage_dir)?);
    let coordinator = Coordinator::load(kv, Analyzer::from_config(&config))
        .with_api_key_override(Config::api_key_override());

    match cli.command {
        Commands::Analyze { file, meal, save, name, json } => {
            if let Some(meal) = meal {
                warn_if_unknown("meal type", &meal, is_known_meal_type, MEAL_OPTIONS);
                coordinator.set_meal_type(&meal)?;
            }
            run_analyze(&coordinator, &file, json).await?;

            if save {
                let scan = coordinator.save_current_scan(name.as_deref())?;
                println!("✔ Saved scan {} ({})", scan.id, scan.display_name());
            }
        }

        Commands::Prefs { allergy, diet, clear_allergies, clear_diet, safety_mode, meal, show } => {
            let mut changed = false;

            if clear_allergies {
                coordinator.set_allergies(&[])?;
                changed = true;
            }
            if clear_diet {
                coordinator.set_dietary_prefs(&[])?;
                changed = true;
            }
            for id in &allergy {
                warn_if_unknown("allergy", id, is_known_allergy, ALLERGY_OPTIONS);
                let selected = coordinator.toggle_allergy(id)?;
                println!("{} allergy: {}", if selected { "+" } else { "-" }, id);
                changed = true;
            }
            for id in &diet {
                warn_if_unknown("diet", id, is_known_diet, DIETARY_OPTIONS);
                let selected = coordinator.toggle_diet(id)?;
                println!("{} diet: {}", if selected { "+" } else { "-" }, id);
                changed = true;
            }
            if let Some(toggle) = safety_mode {
                coordinator.set_safety_mode(toggle.enabled())?;
                println!("Safety mode: {}", if toggle == Toggle::On { "on" } else { "off" });
                changed = true;
            }
            if let Some(meal) = meal {
                warn_if_unknown("meal type", &meal, is_known_meal_type, MEAL_OPTIONS);
                coordinator.set_meal_type(&meal)?;
                changed = true;
            }

            if show || !changed {
                println!("{}", report::render_preferences(&coordinator.preferences()));
            }
        }

        Commands::Config { set_api_key, prompt_api_key, clear_api_key, show } => {
            let mutated = set_api_key.is_some() || prompt_api_key || clear_api_key;
            if let Some(key) = set_api_key {
                coordinator.set_api_key(&key)?;
                println!("✔ API key saved");
            } else if prompt_api_key {
                let key = Password::new()
                    .with_prompt("OpenAI API key")
                    .interact()
                    .context("failed to read API key")?;
                coordinator.set_api_key(&key)?;
                println!("✔ API key saved");
            } else if clear_api_key {
                coordinator.set_api_key("")?;
                println!("✔ API key cleared");
            }

            if show || !mutated {
                print_config(&coordinator, &config, &storage_dir)?;
            }
        }

        Commands::Scans { action } => run_scans(&coordinator, action)?,
    }

    Ok(())
}

async fn run_analyze(coordinator: &Coordinator, file: &Path, json: bool) -> anyhow::Result<()> {
    let artifact = Artifact::from_path(file)?;
    eprintln!("📄 {} ({} KB)", artifact.file_name, artifact.size() / 1024);
    coordinator.select_artifact(artifact);

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = coordinator
        .run_analysis_with_progress(&mut |stage| spinner.set_message(stage.to_string()))
        .await;
    spinner.finish_and_clear();

    let analysis = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        if coordinator.snapshot().safety_mode {
            println!("✔ Menu analyzed with enhanced safety protocols\n");
        } else {
            println!("✔ Menu analyzed\n");
        }
        print!("{}", report::render_analysis(&analysis));
    }
    Ok(())
}

fn run_scans(coordinator: &Coordinator, action: ScanAction) -> anyhow::Result<()> {
    match action {
        ScanAction::List => {
            let scans = coordinator.reload_scans();
            if scans.is_empty() {
                println!("No saved scans.");
            }
            for scan in &scans {
                println!("{}", report::render_scan_line(scan));
            }
        }

        ScanAction::Show { id, json } => {
            let scan = coordinator
                .get_scan(&id)
                .ok_or_else(|| NutriSnapError::NotFound(id.clone()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scan)?);
            } else {
                print!("{}", report::render_scan(&scan));
            }
        }

        ScanAction::Delete { id, yes } => {
            let scan = coordinator
                .get_scan(&id)
                .ok_or_else(|| NutriSnapError::NotFound(id.clone()))?;
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete \"{}\"?", scan.display_name()))
                    .default(false)
                    .interact()
                    .context("failed to read confirmation")?;
                if !confirmed {
                    println!("Cancelled");
                    return Ok(());
                }
            }
            coordinator.delete_scan(&id)?;
            println!("✔ Scan deleted");
        }

        ScanAction::Rename { id, name } => {
            if !coordinator.rename_scan(&id, &name)? {
                return Err(NutriSnapError::NotFound(id).into());
            }
            println!("✔ Scan renamed");
        }

        ScanAction::Pin { id } => match coordinator.toggle_pin(&id)? {
            Some(true) => println!("✔ Scan pinned"),
            Some(false) => println!("✔ Scan unpinned"),
            None => return Err(NutriSnapError::NotFound(id).into()),
        },
    }
    Ok(())
}

fn print_config(coordinator: &Coordinator, config: &Config, storage_dir: &Path) -> anyhow::Result<()> {
    let prefs = coordinator.preferences();
    let source = if prefs.has_credential() {
        "stored"
    } else if coordinator.api_key().is_some() {
        API_KEY_ENV
    } else {
        "none"
    };

    println!("Config file: {}", Config::config_path()?.display());
    println!("Storage:     {}", storage_dir.display());
    println!("Endpoint:    {}", config.completions_url());
    println!("Model:       {}", config.model);
    println!(
        "API key:     {} ({})",
        report::mask_api_key(&coordinator.api_key().unwrap_or_default()),
        source
    );
    Ok(())
}

fn warn_if_unknown(what: &str, id: &str, is_known: fn(&str) -> bool, options: &[OptionEntry]) {
    if let Some(notice) = report::unknown_option_notice(what, id, is_known, options) {
        eprintln!("⚠ {}", notice);
    }
}
