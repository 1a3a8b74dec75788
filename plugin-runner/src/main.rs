pub(crate) mod config;
pub(crate) mod registry;

use crate::config::RunnerConfig;
use crate::registry::PluginRegistry;
use anyhow::Context;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vaccel_plugin_api::{Session, VaccelOpType, VACCEL_VERSION};

fn init_logger(level: LevelFilter) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false)
				.with_writer(std::io::stderr),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(level.into())
				.from_env_lossy(),
		)
		.init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = RunnerConfig::new()?;
	init_logger(config.logging.level_filter()?);

	if let Err(error) = run(&config) {
		error!("Plugin run failed: {error:#}");
		std::process::exit(1);
	}
	Ok(())
}

fn run(config: &RunnerConfig) -> anyhow::Result<()> {
	info!(vaccel.version = VACCEL_VERSION, "Starting plugin runner");

	let mut registry = PluginRegistry::new();
	for path in &config.plugins {
		registry
			.load_plugin(path)
			.with_context(|| format!("loading plugin {}", path.display()))?;
	}

	for plugin in registry.list_plugins() {
		info!(
			plugin.name = %plugin.name,
			plugin.version = %plugin.version,
			plugin.vaccel_version = %plugin.vaccel_version,
			"Plugin ready"
		);
	}
	for registered in registry.operations() {
		info!(op = %registered.op.op_type, plugin.name = %registered.plugin, "Operation available");
	}

	let failures = dispatch_noop(&registry, &config.session_ids());
	registry.finalize_all();

	anyhow::ensure!(failures == 0, "{failures} dispatch(es) failed");
	Ok(())
}

/// Dispatch the no-op operation once per session and count the failures.
///
/// Nothing is dispatched when no plugin is loaded.
fn dispatch_noop(registry: &PluginRegistry, session_ids: &[i64]) -> usize {
	if registry.list_plugins().next().is_none() {
		warn!("No plugins configured; set `plugins` in runner.toml or VACCEL_RUNNER__PLUGINS");
		return 0;
	}

	let mut failures = 0;
	for &id in session_ids {
		let session = Session::new(id);
		match registry.dispatch(VaccelOpType::Noop, &session) {
			Ok(()) => info!(session.id = id, "Dispatched noop"),
			Err(err) => {
				failures += 1;
				error!(session.id = id, "Dispatch failed: {err}");
			}
		}
	}
	failures
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_plugins_means_nothing_to_dispatch() {
		let registry = PluginRegistry::new();
		assert_eq!(dispatch_noop(&registry, &[1, 2]), 0);
	}

	#[test]
	fn noop_dispatched_for_every_session() {
		let mut registry = PluginRegistry::new();
		registry
			.register_module(vaccel_plugin_template::get_root_module())
			.unwrap();

		assert_eq!(dispatch_noop(&registry, &[42, 43]), 0);
	}
}
