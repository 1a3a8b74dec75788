use serde::Deserialize;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Session id used when no sessions are configured.
pub const DEFAULT_SESSION_ID: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
	pub logging: LoggingConfig,
	/// Shared libraries to load, in order.
	#[serde(default)]
	pub plugins: Vec<PathBuf>,
	/// Session ids to dispatch the no-op operation for.
	#[serde(default)]
	pub sessions: Vec<i64>,
}

impl RunnerConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		Self::from_sources(config::File::with_name("runner.toml").required(false))
	}

	fn from_sources(
		file: impl config::Source + Send + Sync + 'static,
	) -> Result<Self, config::ConfigError> {
		use config::Config;
		let s = Config::builder()
			.add_source(config::File::from_str(
				include_str!("defaults.toml"),
				config::FileFormat::Toml,
			))
			.add_source(file)
			.add_source(
				config::Environment::with_prefix("VACCEL_RUNNER")
					.separator("__")
					.list_separator(",")
					.with_list_parse_key("plugins")
					.with_list_parse_key("sessions")
					.try_parsing(true),
			)
			.build()?;

		s.try_deserialize()
	}

	/// The sessions to exercise, falling back to a single default session.
	pub fn session_ids(&self) -> Vec<i64> {
		if self.sessions.is_empty() {
			vec![DEFAULT_SESSION_ID]
		} else {
			self.sessions.clone()
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
	// Configurable logging level. Also configurable via env vars RUST_LOG and VACCEL_RUNNER__LOGGING__LEVEL
	pub level: String,
}

impl LoggingConfig {
	pub fn level_filter(&self) -> Result<LevelFilter, config::ConfigError> {
		self.level
			.parse()
			.map_err(|_| config::ConfigError::Message(format!("invalid log level: {}", self.level)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn from_toml(toml: &str) -> RunnerConfig {
		RunnerConfig::from_sources(config::File::from_str(toml, config::FileFormat::Toml)).unwrap()
	}

	#[test]
	fn defaults() {
		let config = from_toml("");

		assert_eq!(config.logging.level, "info");
		assert!(config.plugins.is_empty());
		assert_eq!(config.session_ids(), vec![DEFAULT_SESSION_ID]);
	}

	#[test]
	fn file_overrides_defaults() {
		let config = from_toml(
			r#"
			plugins = ["target/release/libvaccel_plugin_template.so"]
			sessions = [42, 43]

			[logging]
			level = "debug"
			"#,
		);

		assert_eq!(
			config.plugins,
			vec![PathBuf::from("target/release/libvaccel_plugin_template.so")]
		);
		assert_eq!(config.session_ids(), vec![42, 43]);
		assert_eq!(config.logging.level_filter().unwrap(), LevelFilter::DEBUG);
	}

	#[test]
	fn invalid_level_is_rejected() {
		let config = from_toml("[logging]\nlevel = \"chatty\"");
		assert!(config.logging.level_filter().is_err());
	}
}
