mod api;
mod models;

use log::info;
use models::config::Config;
use models::context::{Context, ContextPointer};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::Arc;

const CONFIG_PATH_VAR: &str = "FARE_GUARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        config.level_filter()?,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;
    Ok(())
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)?;
    init_logging(&config)?;
    info!("Loaded configuration from {}", config_path.display());

    let context: ContextPointer = Arc::new(Context::new(config.clone()));
    let sweeper = context.start_background_tasks();
    let schema = api::build_schema(context.clone());

    let figment = rocket::Config::figment()
        .merge(("address", config.address))
        .merge(("port", config.port));
    let launched = rocket::custom(figment)
        .manage(schema)
        .mount("/", api::routes())
        .launch()
        .await;

    context.shutdown();
    sweeper.await?;
    launched?;
    Ok(())
}
