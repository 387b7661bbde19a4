//! Cold-Storage Restore Tool
//!
//! Provides a CLI interface for initiating restores of archived business
//! object data storage units out of the cold tier.

// archivetool/src/main.rs
mod config;
mod errors;
mod gateway;
mod model;
mod registry;
mod restore;

use anyhow::{Context, Result};
use config::{AppConfig, StorageConfig};
use gateway::S3Gateway;
use registry::PgStorageUnitRegistry;
use restore::RestoreOrchestrator;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // Define the path to config.json. Expects it in the same directory as the
    // executable or the project root if running with `cargo run`.
    let config_path = PathBuf::from("config.json");
    let app_config = AppConfig::load_from_json(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "restore" => {
            println!("🔄 Starting Restore Process...");
            run_restore_flow(&app_config)
                .await
                .context("Restore process failed")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (restore).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

async fn run_restore_flow(app_config: &AppConfig) -> Result<()> {
    let request = app_config
        .restore_request
        .clone()
        .context("restore_request must be set in config.json for the restore operation")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&app_config.catalog_database_url)
        .await
        .context("Failed to connect to the catalog database")?;

    // When exactly one storage is configured its endpoint/credentials apply
    // to the gateway clients; otherwise the default AWS provider chain is
    // used.
    let storage_config = match app_config.settings.storages.values().next() {
        Some(storage) if app_config.settings.storages.len() == 1 => storage.clone(),
        _ => StorageConfig::default(),
    };
    let gateway = S3Gateway::from_storage_config(&storage_config).await;

    let orchestrator = RestoreOrchestrator::new(
        PgStorageUnitRegistry::new(pool),
        gateway,
        app_config.settings.clone(),
    );

    println!(
        "Restore target: {} (expiration days: {:?}, retrieval option: {:?}, batch: {})",
        request.data_key, request.expiration_in_days, request.retrieval_option, request.batch_mode
    );

    let outcome = orchestrator
        .initiate_restore(
            &request.data_key,
            request.expiration_in_days,
            request.retrieval_option.as_deref(),
            request.batch_mode,
        )
        .await?;

    println!(
        "Storage unit status: {} -> {}",
        outcome.old_status, outcome.new_status
    );
    if let Some(expiration) = outcome.snapshot.restore_expiration_on {
        println!("Restore expiration: {}", expiration);
    }
    if let Some(job_id) = &outcome.batch_job_id {
        println!("Batch restore job submitted: {}", job_id);
    }

    match outcome.failure {
        Some(failure) => anyhow::bail!(
            "Restore failed and the storage unit was reverted to ARCHIVED (retry is safe): {}",
            failure
        ),
        None => {
            println!("✅ Restore initiated; completion is driven by the remote job.");
            Ok(())
        }
    }
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{stdin, stdout, Write};

    println!("Select an operation:");
    println!("1. Restore archived storage unit (or type 'restore')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
