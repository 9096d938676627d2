use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use repositories::{memory::MemoryStore, postgres::PgReferralStore, ReferralStore};
use settings::{Backend, Settings};

mod models;
mod repositories;
pub mod services;
pub mod settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `http.listen` from the config file.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs).context("Failed to initialize logging.")?;
    let settings = load_settings(&args)?;

    log::info!("Starting referral reward service.");
    let store = connect_store(&settings).await?;

    services::start_services(store, settings).await
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(&args.config)
        .with_context(|| format!("Could not load config file {}.", args.config))?;
    if let Some(listen) = &args.listen {
        settings.http.listen = listen.clone();
    }

    Ok(settings)
}

async fn connect_store(settings: &Settings) -> Result<Arc<dyn ReferralStore>> {
    match (settings.store.backend, &settings.postgres) {
        (Backend::Postgres, Some(postgres)) => {
            let conn = PgPoolOptions::new()
                .max_connections(postgres.max_connections)
                .connect(&postgres.url)
                .await?;

            log::info!("Connected to Postgres.");
            Ok(Arc::new(PgReferralStore::new(conn)))
        }
        (Backend::Postgres, None) => Err(anyhow::anyhow!("Missing [postgres] settings.")),
        (Backend::Memory, _) => {
            log::warn!("Using the in-memory store, nothing will be persisted.");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(config: &str, listen: Option<&str>) -> Args {
        Args {
            config: config.to_string(),
            listen: listen.map(str::to_string),
            log4rs: "log4rs.yaml".to_string(),
        }
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let error = load_settings(&args("does-not-exist.toml", None)).unwrap_err();
        assert!(error.to_string().contains("does-not-exist.toml"));
    }

    #[test]
    fn test_listen_flag_overrides_config() {
        let settings = load_settings(&args("config.toml", Some("127.0.0.1:9999"))).unwrap();
        assert_eq!(settings.http.listen, "127.0.0.1:9999");
    }
}
