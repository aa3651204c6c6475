use std::fs;
use std::path::Path;

use clap::Parser;

mod models;
mod repositories;
pub mod services;
pub mod settings;
mod storage;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log4rs).expect("Failed to initialize logging.");

    let config = settings::Settings::load(&args.config).expect("Could not load config file.");
    let store = storage::open(&config.storage).expect("Could not open storage.");

    println!("[*] Starting services.");
    services::start_services(store, config)
        .await
        .expect("Could not start services.");
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
