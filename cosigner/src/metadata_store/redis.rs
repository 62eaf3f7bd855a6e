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

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use serde::Deserialize;
use tracing::warn;

use super::{ClaimToken, CosignerSlotCount, JoinClaim, MetadataStore, StoreError};
use crate::constants::{JOIN_CLAIM_KEY_PREFIX, WALLET_KEY_PREFIX};

/// Deletes the claim only while it still holds the caller's token.
const RELEASE_CLAIM_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
	return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Wallet records as written by the service that creates wallets.
#[derive(Deserialize)]
struct WalletRecord {
	n: u32,
	#[serde(default)]
	copayers: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct RedisMetadataStore {
	con: MultiplexedConnection,
}

impl RedisMetadataStore {
	pub fn new(con: MultiplexedConnection) -> Self {
		Self { con }
	}
}

fn wallet_key(wallet_id: &str) -> String {
	format!("{WALLET_KEY_PREFIX}:{wallet_id}")
}

fn join_claim_key(wallet_id: &str) -> String {
	format!("{JOIN_CLAIM_KEY_PREFIX}:{wallet_id}")
}

fn slots_from_record(wallet_id: &str, record: &str) -> Result<CosignerSlotCount, StoreError> {
	let corrupt = |reason: String| StoreError::Corrupt { wallet_id: wallet_id.to_string(), reason };

	let record: WalletRecord =
		serde_json::from_str(record).map_err(|error| corrupt(error.to_string()))?;
	let joined = u32::try_from(record.copayers.len())
		.map_err(|_| corrupt("too many copayers".to_string()))?;

	if joined > record.n {
		return Err(corrupt(format!("{joined} copayers joined but only {} expected", record.n)))
	}

	Ok(CosignerSlotCount { expected: record.n, joined })
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
	async fn cosigner_slots(
		&self,
		wallet_id: &str,
	) -> Result<Option<CosignerSlotCount>, StoreError> {
		let record: Option<String> = self.con.clone().get(wallet_key(wallet_id)).await?;

		record.map(|record| slots_from_record(wallet_id, &record)).transpose()
	}

	async fn claim_join(&self, wallet_id: &str, ttl: Duration) -> Result<JoinClaim, StoreError> {
		let token = ClaimToken::random();
		let claimed: Option<String> = redis::cmd("SET")
			.arg(join_claim_key(wallet_id))
			.arg(token.as_str())
			.arg("NX")
			.arg("EX")
			.arg(ttl.as_secs().max(1))
			.query_async(&mut self.con.clone())
			.await?;

		Ok(if claimed.is_some() { JoinClaim::Claimed(token) } else { JoinClaim::AlreadyClaimed })
	}

	async fn release_join(&self, wallet_id: &str, token: &ClaimToken) -> Result<(), StoreError> {
		let deleted: i64 = redis::Script::new(RELEASE_CLAIM_SCRIPT)
			.key(join_claim_key(wallet_id))
			.arg(token.as_str())
			.invoke_async(&mut self.con.clone())
			.await?;

		if deleted == 0 {
			warn!(wallet_id, "Join claim lapsed before it was released");
		}
		Ok(())
	}
}
