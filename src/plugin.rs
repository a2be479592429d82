//! Compiled-in extension points for the CLI.
//!
//! Extensions register on a [`PluginRegistry`] and are invoked at three fixed
//! points: after configured defaults are loaded, while the `clone` subcommand
//! grammar is assembled, and immediately after `clone` arguments are parsed.
//! A failing extension is logged and skipped; it never takes the other
//! extensions or the main flow down with it.

use clap::{ArgMatches, Command};
use log::warn;

use crate::config::Defaults;

/// A compiled-in CLI extension.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once after configured defaults are loaded, before the command
    /// grammar is built.
    fn config_hook(&self, _defaults: &Defaults) -> anyhow::Result<()> {
        Ok(())
    }

    /// Given the `clone` subcommand, return it with any extension flags
    /// appended.
    fn extend_clone_command(&self, cmd: Command) -> Command {
        cmd
    }

    /// Called with the parsed `clone` matches, before the command runs.
    fn on_clone_parsed(&self, _matches: &ArgMatches) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The set of registered extensions, invoked in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn run_config_hooks(&self, defaults: &Defaults) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.config_hook(defaults) {
                warn!("plugin {} config hook failed: {e}", plugin.name());
            }
        }
    }

    pub fn extend_clone_command(&self, cmd: Command) -> Command {
        self.plugins
            .iter()
            .fold(cmd, |cmd, plugin| plugin.extend_clone_command(cmd))
    }

    pub fn run_clone_parsed_hooks(&self, matches: &ArgMatches) {
        for plugin in &self.plugins {
            if let Err(e) = plugin.on_clone_parsed(matches) {
                warn!("plugin {} parse hook failed: {e}", plugin.name());
            }
        }
    }
}
