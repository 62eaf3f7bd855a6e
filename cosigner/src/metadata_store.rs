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

pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
	#[error("redis error: {0}")]
	Redis(#[from] ::redis::RedisError),
	#[error("wallet record {wallet_id} is corrupt: {reason}")]
	Corrupt { wallet_id: String, reason: String },
}

/// How many cosigners a wallet expects and how many have joined so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosignerSlotCount {
	pub expected: u32,
	pub joined: u32,
}

impl CosignerSlotCount {
	pub fn spots_left(&self) -> i64 {
		i64::from(self.expected) - i64::from(self.joined)
	}
}

/// Identifies the holder of a join claim. Only the holder can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken(String);

impl ClaimToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	/// A token no other claimant will hold.
	pub fn random() -> Self {
		Self(hex::encode(rand::random::<[u8; 16]>()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinClaim {
	Claimed(ClaimToken),
	/// Another process is joining this wallet right now.
	AlreadyClaimed,
}

#[cfg_attr(any(test, feature = "test"), mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
	/// `None` if no wallet with this id is known.
	async fn cosigner_slots(&self, wallet_id: &str)
		-> Result<Option<CosignerSlotCount>, StoreError>;

	/// Atomically claims the right to join `wallet_id`. The claim lapses after `ttl` if it is
	/// never released.
	async fn claim_join(&self, wallet_id: &str, ttl: Duration) -> Result<JoinClaim, StoreError>;

	/// Releases the claim on `wallet_id` if it is still held under `token`. A claim that has
	/// lapsed and been taken by someone else is left alone.
	async fn release_join(&self, wallet_id: &str, token: &ClaimToken) -> Result<(), StoreError>;
}
