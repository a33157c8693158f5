//! ASCII Viewer
//!
//! Loads a glTF model, renders it through a character-grid post-process and
//! lets the user spin, restyle and export the result.

mod animation;
mod app;
mod assets;
mod config;
mod export;
mod render;
mod scene;
mod ui;
mod viewer;

use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = config::Cli::parse();
    let config = match config::ViewerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(2);
        }
    };

    if let Err(err) = app::run(config, cli.model) {
        log::error!("Event loop error: {}", err);
        std::process::exit(1);
    }
}
