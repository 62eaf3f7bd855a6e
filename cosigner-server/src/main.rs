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

use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use cosigner::{
	metadata_store::redis::RedisMetadataStore,
	settings::{CommandLineOptions, Settings},
	wallet_service::http::HttpWalletService,
	Cosigner,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;

fn init_logging(json: bool) -> anyhow::Result<()> {
	let builder = tracing_subscriber::FmtSubscriber::builder().with_env_filter(
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
	);

	let result = if json { builder.json().try_init() } else { builder.try_init() };
	result.map_err(|error| anyhow!("setting default subscriber failed: {error}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	utilities::print_starting!();

	let settings = Settings::new(CommandLineOptions::parse()).context("Failed to load settings")?;
	init_logging(settings.logging.json)?;

	let client =
		utilities::context!(redis::Client::open(settings.metadata_store.redis_url.as_str()))?;
	let metadata_store = RedisMetadataStore::new(
		client
			.get_multiplexed_tokio_connection()
			.await
			.context("Failed to connect to redis")?,
	);
	let wallet_service = HttpWalletService::new(
		&settings.wallet_service.endpoint,
		settings.wallet_service_timeout(),
	)?;

	let cosigner =
		Arc::new(Cosigner::new(wallet_service, metadata_store, settings.cosigner_config()));

	let bind_address = tokio::net::lookup_host((
		settings.server.hostname.as_str(),
		settings.server.port,
	))
	.await
	.with_context(|| format!("Could not resolve {}", settings.server.hostname))?
	.next()
	.with_context(|| format!("No address found for {}", settings.server.hostname))?;

	let (address, server) = warp::serve(api::routes(cosigner))
		.try_bind_with_graceful_shutdown(bind_address, async {
			if let Err(error) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for Ctrl-C: {error}");
			}
		})
		.with_context(|| format!("Could not bind to {bind_address}"))?;

	info!("Listening on http://{address}");
	server.await;
	info!("Shut down");

	Ok(())
}
