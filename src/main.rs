//! Recon - desktop scene editor for arranging catalogue vehicle models.
//!
//! Models are searched and downloaded through a small HTTP backend, dragged
//! onto a ground plane, then moved and rotated with an on-screen gizmo. Scenes
//! are saved to and loaded from the same backend.

mod app;
mod assets;
mod backend;
mod config;
mod render;
mod scene;
mod ui;

use config::EditorConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match EditorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = app::run(config) {
        log::error!("Editor exited with an error: {}", err);
        std::process::exit(1);
    }
}
