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

//! An automated cosigner for m-of-n multisig wallets.
//!
//! The cosigner joins a wallet only as its last missing cosigner, derives receiving addresses and
//! signs proposals that are exactly one signature short of the threshold. Key material, address
//! derivation and broadcasting are left to an external [`wallet_service::WalletService`].

pub mod address;
pub mod constants;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod join;
pub mod metadata_store;
pub mod secret;
pub mod session;
pub mod settings;
pub mod signing;
pub mod wallet_service;

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::{Future, FutureExt};
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
	address::AddressAllocator,
	constants::{DEFAULT_DISPLAY_NAME, DEFAULT_JOIN_CLAIM_TTL, MAX_NEW_ADDRESSES},
	envelope::{AddressPayload, BalancePayload, BroadcastAck, JoinedWalletPayload, ResultEnvelope},
	error::CosignerError,
	join::JoinCoordinator,
	metadata_store::MetadataStore,
	session::WalletSession,
	signing::SigningCoordinator,
	wallet_service::WalletService,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignerConfig {
	/// Name this cosigner registers under when joining a wallet.
	pub display_name: String,
	pub max_new_addresses: usize,
	pub join_claim_ttl: Duration,
}

impl Default for CosignerConfig {
	fn default() -> Self {
		Self {
			display_name: DEFAULT_DISPLAY_NAME.to_string(),
			max_new_addresses: MAX_NEW_ADDRESSES,
			join_claim_ttl: DEFAULT_JOIN_CLAIM_TTL,
		}
	}
}

/// Entry point for every cosigner operation. Each operation returns a [`ResultEnvelope`], even if
/// a collaborator panics.
pub struct Cosigner<W, M> {
	wallet_service: Arc<W>,
	join: JoinCoordinator<W, M>,
	addresses: AddressAllocator<W>,
	signing: SigningCoordinator<W>,
}

impl<W: WalletService, M: MetadataStore> Cosigner<W, M> {
	pub fn new(wallet_service: W, metadata_store: M, config: CosignerConfig) -> Self {
		let wallet_service = Arc::new(wallet_service);

		Self {
			join: JoinCoordinator::new(wallet_service.clone(), Arc::new(metadata_store), &config),
			addresses: AddressAllocator::new(wallet_service.clone(), &config),
			signing: SigningCoordinator::new(wallet_service.clone()),
			wallet_service,
		}
	}

	/// The most addresses one request may derive.
	pub fn max_new_addresses(&self) -> usize {
		self.addresses.max_new_addresses()
	}

	pub async fn join(&self, wallet_id: &str, secret: &str) -> ResultEnvelope<JoinedWalletPayload> {
		contain(self.join.join(wallet_id, secret))
			.instrument(info_span!("join", wallet_id = %wallet_id))
			.await
	}

	pub async fn balance(&self, wallet: &str) -> ResultEnvelope<BalancePayload> {
		contain(async {
			let session = WalletSession::open(self.wallet_service.clone(), wallet)?;
			let balance = session.balance().await.map_err(CosignerError::BalanceUnavailable)?;
			Ok(BalancePayload { balance })
		})
		.instrument(info_span!("balance"))
		.await
	}

	pub async fn derive_addresses(
		&self,
		wallet: &str,
		count: usize,
	) -> ResultEnvelope<AddressPayload> {
		contain(self.addresses.derive_addresses(wallet, count))
			.instrument(info_span!("new_address", count))
			.await
	}

	pub async fn sign_and_broadcast(
		&self,
		wallet: &str,
		txid: &str,
	) -> ResultEnvelope<BroadcastAck> {
		contain(self.signing.sign_and_broadcast(wallet, txid))
			.instrument(info_span!("sign", txid = %txid))
			.await
	}
}

/// Runs `operation`, turning a panic into an internal failure, and logs the outcome.
async fn contain<T, F>(operation: F) -> ResultEnvelope<T>
where
	F: Future<Output = Result<T, CosignerError>>,
{
	let result = AssertUnwindSafe(operation).catch_unwind().await.unwrap_or_else(|panic| {
		let message = panic_message(panic.as_ref());
		error!("Operation panicked: {message}");
		Err(CosignerError::Internal(message))
	});

	match &result {
		Ok(_) => info!("Succeeded"),
		Err(error) => warn!(reason = error.reason(), "Failed: {}", error.describe()),
	}

	result.into()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	panic
		.downcast_ref::<&str>()
		.map(|message| message.to_string())
		.or_else(|| panic.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		credential::{tests::exported_wallet, WalletCredential},
		error::ErrorKind,
		join::tests::SingleWalletStore,
		metadata_store::MockMetadataStore,
		secret::{
			tests::{secret_for, WALLET_ID},
			JoinSecret,
		},
		wallet_service::{
			Address, AddressOptions, Balance, BroadcastReceipt, JoinedWallet, MockWalletService,
			TransactionProposal, WalletServiceError, WalletStatus,
		},
	};

	fn cosigner(wallet_service: MockWalletService) -> Cosigner<MockWalletService, MockMetadataStore> {
		Cosigner::new(wallet_service, MockMetadataStore::new(), CosignerConfig::default())
	}

	#[tokio::test]
	async fn balance_is_wrapped_in_a_success_envelope() {
		let mut wallet_service = MockWalletService::new();
		wallet_service.expect_get_balance().times(1).returning(|_| {
			Ok(Balance { total_amount: 250_000, available_amount: 200_000, ..Default::default() })
		});

		let envelope = cosigner(wallet_service).balance(&exported_wallet(WALLET_ID, 3)).await;

		assert_eq!(envelope.data().unwrap().balance.total_amount, 250_000);
		assert!(envelope.failure().is_none());
	}

	#[tokio::test]
	async fn balance_failures_keep_the_service_message() {
		let mut wallet_service = MockWalletService::new();
		wallet_service
			.expect_get_balance()
			.returning(|_| Err(WalletServiceError::NotFound("Wallet not found".to_string())));

		let envelope = cosigner(wallet_service).balance(&exported_wallet(WALLET_ID, 3)).await;
		let failure = envelope.failure().unwrap();

		assert!(envelope.data().is_none());
		assert_eq!(failure.code, "balance_unavailable");
		assert!(failure.message.contains("Wallet not found"));
	}

	#[tokio::test]
	async fn incomplete_wallets_are_a_precondition_failure() {
		let envelope = cosigner(MockWalletService::new())
			.balance(&exported_wallet(WALLET_ID, 1))
			.await;

		assert_eq!(envelope.failure().unwrap().kind, ErrorKind::Precondition);
	}

	struct ExplodingWalletService;

	#[async_trait::async_trait]
	impl WalletService for ExplodingWalletService {
		async fn join_wallet(
			&self,
			_: &JoinSecret,
			_: &str,
		) -> Result<JoinedWallet, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn open_wallet(&self, _: &WalletCredential) -> Result<WalletStatus, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn get_balance(&self, _: &WalletCredential) -> Result<Balance, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn create_address(
			&self,
			_: &WalletCredential,
			_: AddressOptions,
		) -> Result<Address, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn get_proposal(
			&self,
			_: &WalletCredential,
			_: &str,
		) -> Result<TransactionProposal, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn sign_proposal(
			&self,
			_: &WalletCredential,
			_: &TransactionProposal,
		) -> Result<TransactionProposal, WalletServiceError> {
			panic!("wallet client exploded")
		}

		async fn broadcast_proposal(
			&self,
			_: &WalletCredential,
			_: &TransactionProposal,
		) -> Result<BroadcastReceipt, WalletServiceError> {
			panic!("wallet client exploded")
		}
	}

	#[tokio::test]
	async fn panics_become_internal_failures() {
		let cosigner = Cosigner::new(
			ExplodingWalletService,
			MockMetadataStore::new(),
			CosignerConfig::default(),
		);

		let envelope = cosigner.sign_and_broadcast(&exported_wallet(WALLET_ID, 3), "tx").await;
		let failure = envelope.failure().unwrap();

		assert_eq!(failure.kind, ErrorKind::Internal);
		assert_eq!(failure.code, "internal_error");
		assert!(failure.message.contains("wallet client exploded"));
	}

	#[tokio::test]
	async fn panicking_joins_release_their_claim() {
		let metadata_store = SingleWalletStore::new(3, 2);
		let cosigner =
			Cosigner::new(ExplodingWalletService, metadata_store.clone(), CosignerConfig::default());

		let envelope = cosigner.join(WALLET_ID, &secret_for(WALLET_ID)).await;

		assert_eq!(envelope.failure().unwrap().kind, ErrorKind::Internal);
		assert!(!metadata_store.is_claimed());
	}

	#[tokio::test]
	async fn join_failures_are_envelopes() {
		let envelope = cosigner(MockWalletService::new())
			.join("00000000-0000-0000-0000-000000000000", &secret_for(WALLET_ID))
			.await;

		assert_eq!(envelope.failure().unwrap().code, "secret_mismatch");
	}

	#[tokio::test]
	async fn address_counts_are_checked() {
		let envelope = cosigner(MockWalletService::new())
			.derive_addresses(&exported_wallet(WALLET_ID, 3), 101)
			.await;

		assert_eq!(envelope.failure().unwrap().code, "too_many_addresses");
	}
}
