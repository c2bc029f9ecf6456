//! Configuration loading for the lifeline service.
//!
//! TOML files with `${VAR}` environment substitution, a small set of
//! `LIFELINE_*` overrides, and validation of the fields the service
//! cannot start without.

use std::env;
use std::path::Path;

use lifeline_types::WalletAddress;
use thiserror::Error;

mod types;

pub use types::{
	BackendSettings, ChainSettings, FlowSettings, LifelineConfig, RelaySettings, ServiceSettings,
};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "LIFELINE_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<LifelineConfig, ConfigError> {
		let mut config = if let Some(file_path) = &self.file_path {
			self.load_from_file(file_path).await?
		} else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &str) -> Result<LifelineConfig, ConfigError> {
		let content = tokio::fs::read_to_string(file_path).await?;
		let substituted_content = self.substitute_env_vars(&content)?;

		let config: LifelineConfig = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut LifelineConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.service.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.service.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		Ok(())
	}

	fn validate_config(&self, config: &LifelineConfig) -> Result<(), ConfigError> {
		if config.service.http_port == 0 {
			return Err(ConfigError::ValidationError(
				"service.http_port must be non-zero".to_string(),
			));
		}

		for (field, value) in [
			("backend.base_url", &config.backend.base_url),
			("chain.rpc_url", &config.chain.rpc_url),
			("chain.ws_url", &config.chain.ws_url),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::ValidationError(format!(
					"{} must not be empty",
					field
				)));
			}
		}

		WalletAddress::new(config.chain.usdc_mint.clone()).map_err(|e| {
			ConfigError::ValidationError(format!("chain.usdc_mint is not a valid mint: {}", e))
		})?;

		if config.relay.reconnect_initial_ms == 0
			|| config.relay.reconnect_max_ms < config.relay.reconnect_initial_ms
		{
			return Err(ConfigError::ValidationError(
				"relay reconnect intervals must satisfy 0 < initial <= max".to_string(),
			));
		}

		Ok(())
	}
}
