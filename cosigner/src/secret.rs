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

//! Decoding of wallet join secrets.
//!
//! A secret is laid out as `<wallet id><private key><network>[coin]`:
//! - the wallet id as base58 of its 16 uuid bytes, right padded with `'0'` to 22 characters,
//! - a 52 character WIF private key used to authenticate the join,
//! - `T` for testnet or `L` for livenet,
//! - an optional coin, `btc` when absent.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CosignerError;

const WALLET_ID_LENGTH: usize = 22;
const PRIVATE_KEY_LENGTH: usize = 52;
const WALLET_ID_PADDING: char = '0';
const DEFAULT_COIN: &str = "btc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
	Testnet,
	Livenet,
}

impl Network {
	fn from_marker(marker: char) -> Option<Self> {
		match marker {
			'T' => Some(Network::Testnet),
			'L' => Some(Network::Livenet),
			_ => None,
		}
	}

	fn marker(self) -> char {
		match self {
			Network::Testnet => 'T',
			Network::Livenet => 'L',
		}
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Network::Testnet => write!(f, "testnet"),
			Network::Livenet => write!(f, "livenet"),
		}
	}
}

pub struct JoinSecret {
	wallet_id: String,
	network: Network,
	coin: String,
	raw: Zeroizing<String>,
}

impl JoinSecret {
	pub fn parse(secret: &str) -> Result<Self, CosignerError> {
		let secret = secret.trim();
		let invalid = |reason: &str| CosignerError::InvalidSecret(reason.to_string());

		if !secret.is_ascii() {
			return Err(invalid("secret contains non-ascii characters"))
		}
		if secret.len() < WALLET_ID_LENGTH + PRIVATE_KEY_LENGTH + 1 {
			return Err(invalid("secret is too short"))
		}

		let (encoded_wallet_id, rest) = secret.split_at(WALLET_ID_LENGTH);
		let (private_key, rest) = rest.split_at(PRIVATE_KEY_LENGTH);
		let (network_marker, coin) = rest.split_at(1);

		// '0' is not in the base58 alphabet, so every occurrence is padding.
		let wallet_id_bytes = bs58::decode(encoded_wallet_id.replace(WALLET_ID_PADDING, ""))
			.into_vec()
			.map_err(|_| invalid("wallet id is not valid base58"))?;
		let wallet_id_bytes: [u8; 16] = wallet_id_bytes
			.try_into()
			.map_err(|_| invalid("wallet id does not decode to 16 bytes"))?;

		bs58::decode(private_key)
			.into_vec()
			.map_err(|_| invalid("private key is not valid base58"))?;

		let network = network_marker
			.chars()
			.next()
			.and_then(Network::from_marker)
			.ok_or_else(|| invalid("unknown network marker"))?;

		let coin = if coin.is_empty() { DEFAULT_COIN.to_string() } else { coin.to_lowercase() };
		if !coin.chars().all(|c| c.is_ascii_alphanumeric()) {
			return Err(invalid("unknown coin"))
		}

		Ok(Self {
			wallet_id: format_wallet_id(&wallet_id_bytes),
			network,
			coin,
			raw: Zeroizing::new(secret.to_string()),
		})
	}

	/// Assembles a secret for `wallet_id`. The inverse of [`JoinSecret::parse`].
	pub fn build(
		wallet_id: &str,
		private_key: &str,
		network: Network,
		coin: Option<&str>,
	) -> Result<String, CosignerError> {
		let wallet_id_bytes = hex::decode(wallet_id.replace('-', ""))
			.ok()
			.filter(|bytes| bytes.len() == 16)
			.ok_or_else(|| CosignerError::InvalidSecret("wallet id is not a uuid".to_string()))?;
		if private_key.len() != PRIVATE_KEY_LENGTH {
			return Err(CosignerError::InvalidSecret(
				"private key must be a 52 character WIF".to_string(),
			))
		}

		let encoded_wallet_id = bs58::encode(wallet_id_bytes).into_string();
		let coin = coin.filter(|coin| *coin != DEFAULT_COIN).unwrap_or_default();

		Ok(format!(
			"{encoded_wallet_id:0<width$}{private_key}{}{coin}",
			network.marker(),
			width = WALLET_ID_LENGTH
		))
	}

	pub fn wallet_id(&self) -> &str {
		&self.wallet_id
	}

	pub fn network(&self) -> Network {
		self.network
	}

	pub fn coin(&self) -> &str {
		&self.coin
	}

	/// The secret exactly as it was supplied, for forwarding to the wallet service.
	pub fn expose(&self) -> &str {
		&self.raw
	}
}

impl fmt::Debug for JoinSecret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JoinSecret")
			.field("wallet_id", &self.wallet_id)
			.field("network", &self.network)
			.field("coin", &self.coin)
			.finish_non_exhaustive()
	}
}

fn format_wallet_id(bytes: &[u8; 16]) -> String {
	let hex = hex::encode(bytes);
	format!("{}-{}-{}-{}-{}", &hex[0..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..32])
}
