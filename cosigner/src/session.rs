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

use crate::{
	credential::WalletCredential,
	error::CosignerError,
	wallet_service::{
		Address, AddressOptions, Balance, BroadcastReceipt, TransactionProposal, WalletService,
		WalletServiceError,
	},
};

/// A complete wallet credential bound to the wallet service. Opening never touches the network.
pub struct WalletSession<W> {
	wallet_service: Arc<W>,
	credential: WalletCredential,
}

impl<W: WalletService> WalletSession<W> {
	/// Imports an exported credential and refuses it unless every cosigner has joined.
	pub fn open(wallet_service: Arc<W>, exported: &str) -> Result<Self, CosignerError> {
		let credential = WalletCredential::import(exported)?;
		if !credential.is_complete() {
			return Err(CosignerError::IncompleteWallet)
		}
		Ok(Self { wallet_service, credential })
	}

	pub fn required_signatures(&self) -> u32 {
		self.credential.required_signatures()
	}

	pub async fn balance(&self) -> Result<Balance, WalletServiceError> {
		self.wallet_service.get_balance(&self.credential).await
	}

	pub async fn create_address(
		&self,
		options: AddressOptions,
	) -> Result<Address, WalletServiceError> {
		self.wallet_service.create_address(&self.credential, options).await
	}

	pub async fn proposal(&self, txid: &str) -> Result<TransactionProposal, WalletServiceError> {
		self.wallet_service.get_proposal(&self.credential, txid).await
	}

	pub async fn sign(
		&self,
		proposal: &TransactionProposal,
	) -> Result<TransactionProposal, WalletServiceError> {
		self.wallet_service.sign_proposal(&self.credential, proposal).await
	}

	pub async fn broadcast(
		&self,
		proposal: &TransactionProposal,
	) -> Result<BroadcastReceipt, WalletServiceError> {
		self.wallet_service.broadcast_proposal(&self.credential, proposal).await
	}
}
