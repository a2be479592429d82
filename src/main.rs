mod commands;
mod config;
mod errors;
mod ghclass;
mod git;
mod github;
mod plugin;
mod utils;

use plugin::PluginRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // compiled-in extensions register here
    let registry = PluginRegistry::new();
    ghclass::cli(std::env::args_os(), registry).await
}
