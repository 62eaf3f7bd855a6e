// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, time::Duration};

use clap::Parser;
use config::{Config, ConfigError, Environment, File, Source, Value};
use serde::Deserialize;
use url::Url;

use crate::{
	constants::{
		DEFAULT_CONFIG_PATH, DEFAULT_JOIN_CLAIM_TTL, MAX_NEW_ADDRESSES, SETTINGS_ENV_PREFIX,
		SETTINGS_ENV_SEPARATOR, WALLET_SERVICE_REQUEST_TIMEOUT,
	},
	CosignerConfig,
};

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Server {
	pub hostname: String,
	pub port: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WalletService {
	pub endpoint: String,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
	WALLET_SERVICE_REQUEST_TIMEOUT.as_secs()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MetadataStore {
	pub redis_url: String,
	#[serde(default = "default_join_claim_ttl_secs")]
	pub join_claim_ttl_secs: u64,
}

fn default_join_claim_ttl_secs() -> u64 {
	DEFAULT_JOIN_CLAIM_TTL.as_secs()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Cosigner {
	pub display_name: String,
	pub max_new_addresses: usize,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Logging {
	#[serde(default)]
	pub json: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
	pub server: Server,
	pub wallet_service: WalletService,
	pub metadata_store: MetadataStore,
	pub cosigner: Cosigner,
	#[serde(default)]
	pub logging: Logging,
}

#[derive(Parser, Debug, Clone, Default)]
#[clap(version)]
pub struct CommandLineOptions {
	#[clap(short = 'c', long = "config-path")]
	pub config_path: Option<String>,

	#[clap(long = "server.hostname")]
	pub server_hostname: Option<String>,
	#[clap(long = "server.port")]
	pub server_port: Option<u16>,

	#[clap(long = "wallet_service.endpoint")]
	pub wallet_service_endpoint: Option<String>,
	#[clap(long = "wallet_service.request_timeout_secs")]
	pub wallet_service_request_timeout_secs: Option<u64>,

	#[clap(long = "metadata_store.redis_url")]
	pub metadata_store_redis_url: Option<String>,
	#[clap(long = "metadata_store.join_claim_ttl_secs")]
	pub metadata_store_join_claim_ttl_secs: Option<u64>,

	#[clap(long = "cosigner.display_name")]
	pub cosigner_display_name: Option<String>,
	#[clap(long = "cosigner.max_new_addresses")]
	pub cosigner_max_new_addresses: Option<usize>,

	/// Emit logs as JSON
	#[clap(long = "json-logs")]
	pub json_logs: bool,
}

fn insert_command_line_option<T: ToString>(
	map: &mut HashMap<String, Value>,
	setting_str: &str,
	option: &Option<T>,
) {
	if let Some(value) = option {
		map.insert(setting_str.to_string(), Value::from(value.to_string()));
	}
}

impl Source for CommandLineOptions {
	fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
		Box::new((*self).clone())
	}

	fn collect(&self) -> Result<config::Map<String, Value>, ConfigError> {
		let mut map: HashMap<String, Value> = HashMap::new();

		insert_command_line_option(&mut map, "server.hostname", &self.server_hostname);
		insert_command_line_option(&mut map, "server.port", &self.server_port);
		insert_command_line_option(
			&mut map,
			"wallet_service.endpoint",
			&self.wallet_service_endpoint,
		);
		insert_command_line_option(
			&mut map,
			"wallet_service.request_timeout_secs",
			&self.wallet_service_request_timeout_secs,
		);
		insert_command_line_option(
			&mut map,
			"metadata_store.redis_url",
			&self.metadata_store_redis_url,
		);
		insert_command_line_option(
			&mut map,
			"metadata_store.join_claim_ttl_secs",
			&self.metadata_store_join_claim_ttl_secs,
		);
		insert_command_line_option(&mut map, "cosigner.display_name", &self.cosigner_display_name);
		insert_command_line_option(
			&mut map,
			"cosigner.max_new_addresses",
			&self.cosigner_max_new_addresses,
		);
		// Only ever switches JSON logging on, the file decides otherwise.
		if self.json_logs {
			map.insert("logging.json".to_string(), Value::from(true));
		}

		Ok(map)
	}
}

impl Settings {
	/// Settings loaded from the `config_path` in the options, or `config/Default.toml` if none,
	/// overridden by `COSIGNER__` environment variables and then by the options themselves.
	pub fn new(opts: CommandLineOptions) -> Result<Self, ConfigError> {
		Self::load_settings_from_all_sources(DEFAULT_CONFIG_PATH, opts)
	}

	pub fn load_settings_from_all_sources(
		default_config_path: &str,
		opts: CommandLineOptions,
	) -> Result<Self, ConfigError> {
		let config_path = opts.config_path.clone().unwrap_or_else(|| default_config_path.to_string());

		let settings: Settings = Config::builder()
			.add_source(File::with_name(&config_path))
			.add_source(
				Environment::with_prefix(SETTINGS_ENV_PREFIX)
					.prefix_separator(SETTINGS_ENV_SEPARATOR)
					.separator(SETTINGS_ENV_SEPARATOR),
			)
			.add_source(opts)
			.build()?
			.try_deserialize()?;

		settings.validate_settings()?;

		Ok(settings)
	}

	pub fn validate_settings(&self) -> Result<(), ConfigError> {
		validate_url(&self.wallet_service.endpoint, &["http", "https"])?;
		validate_url(&self.metadata_store.redis_url, &["redis", "rediss"])?;

		// A join makes two wallet service calls while holding its claim.
		let longest_join = self.wallet_service.request_timeout_secs.saturating_mul(2);
		if self.metadata_store.join_claim_ttl_secs <= longest_join {
			return Err(ConfigError::Message(format!(
				"metadata_store.join_claim_ttl_secs must be greater than {longest_join}, twice \
				 wallet_service.request_timeout_secs"
			)))
		}
		if self.cosigner.display_name.trim().is_empty() {
			return Err(ConfigError::Message("cosigner.display_name must not be empty".to_string()))
		}
		if !(1..=MAX_NEW_ADDRESSES).contains(&self.cosigner.max_new_addresses) {
			return Err(ConfigError::Message(format!(
				"cosigner.max_new_addresses must be between 1 and {MAX_NEW_ADDRESSES}"
			)))
		}

		Ok(())
	}

	pub fn cosigner_config(&self) -> CosignerConfig {
		CosignerConfig {
			display_name: self.cosigner.display_name.clone(),
			max_new_addresses: self.cosigner.max_new_addresses,
			join_claim_ttl: Duration::from_secs(self.metadata_store.join_claim_ttl_secs),
		}
	}

	pub fn wallet_service_timeout(&self) -> Duration {
		Duration::from_secs(self.wallet_service.request_timeout_secs)
	}
}

fn validate_url(url: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
	let parsed = Url::parse(url).map_err(|e| ConfigError::Message(format!("{url}: {e}")))?;
	if !schemes.contains(&parsed.scheme()) {
		return Err(ConfigError::Message(format!(
			"{url}: scheme must be one of {}",
			schemes.join(", ")
		)))
	}
	if parsed.host().is_none() {
		return Err(ConfigError::Message(format!("{url}: missing host")))
	}
	Ok(parsed)
}
