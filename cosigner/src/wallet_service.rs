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

//! The wallet-service collaborator. It owns the wallet cryptography: key shares, address
//! derivation, proposal signing and broadcasting. This crate only decides when to call it.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{constants::WALLET_STATUS_COMPLETE, credential::WalletCredential, secret::JoinSecret};

#[derive(thiserror::Error, Debug)]
pub enum WalletServiceError {
	#[error("wallet service unreachable: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("invalid wallet service endpoint: {0}")]
	InvalidEndpoint(#[from] url::ParseError),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("wallet service rejected the request ({code}): {message}")]
	Rejected { code: String, message: String },
	#[error("unexpected response from wallet service: {0}")]
	InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct JoinedWallet {
	pub wallet_name: String,
	/// The credential as it stands right after the join. Other cosigners' keys may be missing
	/// until the wallet is reopened.
	pub credential: WalletCredential,
}

#[derive(Debug, Clone)]
pub struct WalletStatus {
	pub status: String,
	/// The credential refreshed with the public key ring as the wallet service knows it.
	pub credential: WalletCredential,
}

impl WalletStatus {
	pub fn is_complete(&self) -> bool {
		self.status == WALLET_STATUS_COMPLETE
	}
}

/// Wallet balance in satoshis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
	pub total_amount: u64,
	pub locked_amount: u64,
	pub available_amount: u64,
	pub total_confirmed_amount: u64,
	pub locked_confirmed_amount: u64,
	pub available_confirmed_amount: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressOptions {
	/// Derive even when the wallet already has too many unused addresses.
	pub ignore_max_gap: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
	pub address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	#[serde(default)]
	pub is_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAction {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub copayer_id: Option<String>,
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(flatten)]
	pub details: serde_json::Map<String, serde_json::Value>,
}

/// A transaction awaiting signatures. Fields this crate does not interpret are carried in
/// `details` so the proposal can be handed back to the wallet service unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionProposal {
	pub id: String,
	#[serde(default)]
	pub actions: Vec<ProposalAction>,
	#[serde(flatten)]
	pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
	pub txid: String,
}

#[cfg_attr(any(test, feature = "test"), mockall::automock)]
#[async_trait]
pub trait WalletService: Send + Sync + 'static {
	async fn join_wallet(
		&self,
		secret: &JoinSecret,
		copayer_name: &str,
	) -> Result<JoinedWallet, WalletServiceError>;

	async fn open_wallet(
		&self,
		credential: &WalletCredential,
	) -> Result<WalletStatus, WalletServiceError>;

	async fn get_balance(&self, credential: &WalletCredential)
		-> Result<Balance, WalletServiceError>;

	async fn create_address(
		&self,
		credential: &WalletCredential,
		options: AddressOptions,
	) -> Result<Address, WalletServiceError>;

	async fn get_proposal(
		&self,
		credential: &WalletCredential,
		txid: &str,
	) -> Result<TransactionProposal, WalletServiceError>;

	async fn sign_proposal(
		&self,
		credential: &WalletCredential,
		proposal: &TransactionProposal,
	) -> Result<TransactionProposal, WalletServiceError>;

	async fn broadcast_proposal(
		&self,
		credential: &WalletCredential,
		proposal: &TransactionProposal,
	) -> Result<BroadcastReceipt, WalletServiceError>;
}
