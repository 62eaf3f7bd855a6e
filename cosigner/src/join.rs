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

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use tracing::{info, warn};

use crate::{
	envelope::JoinedWalletPayload,
	error::CosignerError,
	metadata_store::{JoinClaim, MetadataStore},
	secret::JoinSecret,
	wallet_service::WalletService,
	CosignerConfig,
};

/// This cosigner only ever joins as the last missing cosigner, so that the wallet is complete the
/// moment it joins.
pub fn join_gate(spots_left: i64) -> Result<(), CosignerError> {
	match spots_left {
		1 => Ok(()),
		spots_left if spots_left < 1 => Err(CosignerError::WalletFull),
		spots_left => Err(CosignerError::OthersMustJoinFirst { spots_left }),
	}
}

pub struct JoinCoordinator<W, M> {
	wallet_service: Arc<W>,
	metadata_store: Arc<M>,
	display_name: String,
	join_claim_ttl: Duration,
}

impl<W: WalletService, M: MetadataStore> JoinCoordinator<W, M> {
	pub fn new(wallet_service: Arc<W>, metadata_store: Arc<M>, config: &CosignerConfig) -> Self {
		Self {
			wallet_service,
			metadata_store,
			display_name: config.display_name.clone(),
			join_claim_ttl: config.join_claim_ttl,
		}
	}

	pub async fn join(
		&self,
		wallet_id: &str,
		secret: &str,
	) -> Result<JoinedWalletPayload, CosignerError> {
		let secret = JoinSecret::parse(secret)?;
		if secret.wallet_id() != wallet_id {
			return Err(CosignerError::SecretMismatch)
		}

		let token = match self
			.metadata_store
			.claim_join(wallet_id, self.join_claim_ttl)
			.await
			.map_err(CosignerError::StoreUnavailable)?
		{
			JoinClaim::Claimed(token) => token,
			JoinClaim::AlreadyClaimed => return Err(CosignerError::JoinInProgress),
		};

		// The claim is released even if the join panics, the panic is resumed afterwards.
		let outcome = AssertUnwindSafe(self.join_if_last(wallet_id, &secret)).catch_unwind().await;

		if let Err(error) = self.metadata_store.release_join(wallet_id, &token).await {
			warn!("Failed to release join claim, it will expire on its own: {error}");
		}

		match outcome {
			Ok(result) => result,
			Err(panic) => std::panic::resume_unwind(panic),
		}
	}

	/// Must only be called while holding the join claim, so the slot count cannot change between
	/// the gate and the join.
	async fn join_if_last(
		&self,
		wallet_id: &str,
		secret: &JoinSecret,
	) -> Result<JoinedWalletPayload, CosignerError> {
		let slots = self
			.metadata_store
			.cosigner_slots(wallet_id)
			.await
			.map_err(CosignerError::StoreUnavailable)?
			.ok_or(CosignerError::WalletNotFound)?;
		join_gate(slots.spots_left())?;

		self.join_and_verify(secret).await
	}

	async fn join_and_verify(
		&self,
		secret: &JoinSecret,
	) -> Result<JoinedWalletPayload, CosignerError> {
		let joined = self
			.wallet_service
			.join_wallet(secret, &self.display_name)
			.await
			.map_err(CosignerError::JoinFailed)?;
		info!(
			wallet_name = %joined.wallet_name,
			network = %secret.network(),
			coin = secret.coin(),
			"Joined wallet"
		);

		// The join response alone does not prove the wallet is complete, read it back.
		let status = self
			.wallet_service
			.open_wallet(&joined.credential)
			.await
			.map_err(CosignerError::JoinVerificationFailed)?;

		if !status.is_complete() {
			return Err(CosignerError::JoinIncomplete { status: status.status })
		}

		Ok(JoinedWalletPayload { wallet: status.credential.export() })
	}
}
