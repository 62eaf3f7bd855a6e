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

use std::fmt;

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::CosignerError;

/// This party's share of a multisig wallet, as exported by the wallet client.
///
/// The blob is kept exactly as it was imported so that [`WalletCredential::export`] hands the
/// caller back the same document it persisted.
#[derive(Clone)]
pub struct WalletCredential {
	wallet_id: String,
	required_signatures: u32,
	total_cosigners: u32,
	public_keys_present: usize,
	raw: Zeroizing<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedWallet {
	wallet_id: String,
	m: u32,
	n: u32,
	#[serde(default)]
	public_key_ring: Vec<serde_json::Value>,
}

impl WalletCredential {
	pub fn import(blob: &str) -> Result<Self, CosignerError> {
		let exported: ExportedWallet = serde_json::from_str(blob)
			.map_err(|error| CosignerError::InvalidCredential(error.to_string()))?;

		if exported.wallet_id.is_empty() {
			return Err(CosignerError::InvalidCredential("walletId is empty".to_string()))
		}

		Ok(Self {
			wallet_id: exported.wallet_id,
			required_signatures: exported.m,
			total_cosigners: exported.n,
			public_keys_present: exported.public_key_ring.len(),
			raw: Zeroizing::new(blob.to_string()),
		})
	}

	/// A credential is complete once every cosigner's public key is in the ring.
	pub fn is_complete(&self) -> bool {
		self.required_signatures >= 1 &&
			self.total_cosigners >= self.required_signatures &&
			self.public_keys_present == self.total_cosigners as usize
	}

	/// A copy of the blob for the caller to persist.
	pub fn export(&self) -> Zeroizing<String> {
		self.raw.clone()
	}

	/// The blob itself, for passing on to the wallet service without copying it.
	pub fn expose(&self) -> &str {
		&self.raw
	}

	pub fn wallet_id(&self) -> &str {
		&self.wallet_id
	}

	/// `m`
	pub fn required_signatures(&self) -> u32 {
		self.required_signatures
	}
}

impl fmt::Debug for WalletCredential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WalletCredential")
			.field("wallet_id", &self.wallet_id)
			.field("m", &self.required_signatures)
			.field("n", &self.total_cosigners)
			.field("public_keys_present", &self.public_keys_present)
			.finish_non_exhaustive()
	}
}
