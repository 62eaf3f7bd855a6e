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

use tracing::info;

use crate::{
	envelope::BroadcastAck,
	error::CosignerError,
	session::WalletSession,
	wallet_service::{TransactionProposal, WalletService, WalletServiceError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningDecision {
	/// Already carries `m` signatures.
	Broadcast,
	/// Exactly one signature short: ours.
	Sign,
	Reject(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
	NeedMoreSignatures,
	/// More signatures than the wallet requires.
	UnexpectedSignatureCount,
}

/// What to do with a proposal carrying `signatures` actions in an `m`-of-n wallet.
pub fn decide(required_signatures: u32, signatures: usize) -> SigningDecision {
	let required = required_signatures as usize;

	if signatures == required {
		SigningDecision::Broadcast
	} else if signatures + 1 == required {
		SigningDecision::Sign
	} else if signatures > required {
		SigningDecision::Reject(Rejection::UnexpectedSignatureCount)
	} else {
		SigningDecision::Reject(Rejection::NeedMoreSignatures)
	}
}

impl Rejection {
	fn into_error(self, signatures: usize, required: u32) -> CosignerError {
		match self {
			Rejection::NeedMoreSignatures =>
				CosignerError::NeedMoreSignatures { signatures, required },
			Rejection::UnexpectedSignatureCount =>
				CosignerError::UnexpectedSignatureCount { signatures, required },
		}
	}
}

pub struct SigningCoordinator<W> {
	wallet_service: Arc<W>,
}

impl<W: WalletService> SigningCoordinator<W> {
	pub fn new(wallet_service: Arc<W>) -> Self {
		Self { wallet_service }
	}

	pub async fn sign_and_broadcast(
		&self,
		exported: &str,
		txid: &str,
	) -> Result<BroadcastAck, CosignerError> {
		let session = WalletSession::open(self.wallet_service.clone(), exported)?;

		let proposal = session.proposal(txid).await.map_err(|source| match source {
			WalletServiceError::NotFound(_) =>
				CosignerError::ProposalNotFound { txid: txid.to_string(), source },
			source => CosignerError::ProposalUnavailable { txid: txid.to_string(), source },
		})?;

		let required = session.required_signatures();
		let signatures = proposal.actions.len();

		let ready: TransactionProposal = match decide(required, signatures) {
			SigningDecision::Broadcast => {
				info!(signatures, required, "Proposal is fully signed, broadcasting as is");
				proposal
			},
			SigningDecision::Sign =>
				session.sign(&proposal).await.map_err(CosignerError::SignFailed)?,
			SigningDecision::Reject(rejection) =>
				return Err(rejection.into_error(signatures, required)),
		};

		let receipt = session.broadcast(&ready).await.map_err(CosignerError::BroadcastFailed)?;
		info!(broadcast_txid = %receipt.txid, "Broadcast transaction");

		Ok(BroadcastAck { ok: true, txid: receipt.txid })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		credential::tests::exported_wallet,
		secret::tests::WALLET_ID,
		wallet_service::{BroadcastReceipt, MockWalletService, ProposalAction},
	};

	const TXID: &str = "9d3c1a4b-proposal";

	fn proposal_with(signatures: usize) -> TransactionProposal {
		TransactionProposal {
			id: TXID.to_string(),
			actions: (0..signatures)
				.map(|i| ProposalAction {
					copayer_id: Some(format!("copayer-{i}")),
					kind: "accept".to_string(),
					details: Default::default(),
				})
				.collect(),
			details: Default::default(),
		}
	}

	fn coordinator(wallet_service: MockWalletService) -> SigningCoordinator<MockWalletService> {
		SigningCoordinator::new(Arc::new(wallet_service))
	}

	/// 2-of-3
	fn complete_wallet() -> String {
		exported_wallet(WALLET_ID, 3)
	}

	fn serving_proposal(signatures: usize) -> MockWalletService {
		let mut wallet_service = MockWalletService::new();
		wallet_service
			.expect_get_proposal()
			.withf(|_, txid| txid == TXID)
			.times(1)
			.returning(move |_, _| Ok(proposal_with(signatures)));
		wallet_service
	}

	#[test]
	fn decisions_follow_the_threshold() {
		assert_eq!(decide(2, 2), SigningDecision::Broadcast);
		assert_eq!(decide(2, 1), SigningDecision::Sign);
		assert_eq!(decide(2, 0), SigningDecision::Reject(Rejection::NeedMoreSignatures));
		assert_eq!(decide(2, 3), SigningDecision::Reject(Rejection::UnexpectedSignatureCount));

		assert_eq!(decide(1, 0), SigningDecision::Sign);
		assert_eq!(decide(1, 1), SigningDecision::Broadcast);
		assert_eq!(decide(3, 1), SigningDecision::Reject(Rejection::NeedMoreSignatures));
	}

	#[tokio::test]
	async fn fully_signed_proposals_are_broadcast_without_signing() {
		let mut wallet_service = serving_proposal(2);
		wallet_service
			.expect_broadcast_proposal()
			.withf(|_, proposal| proposal.actions.len() == 2)
			.times(1)
			.returning(|_, _| Ok(BroadcastReceipt { txid: "f00d".to_string() }));

		let ack = coordinator(wallet_service)
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await
			.unwrap();

		assert_eq!(ack, BroadcastAck { ok: true, txid: "f00d".to_string() });
	}

	#[tokio::test]
	async fn one_short_proposals_are_signed_then_broadcast() {
		let mut wallet_service = serving_proposal(1);
		let mut seq = mockall::Sequence::new();
		wallet_service
			.expect_sign_proposal()
			.withf(|_, proposal| proposal.actions.len() == 1)
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(proposal_with(2)));
		wallet_service
			.expect_broadcast_proposal()
			.withf(|_, proposal| proposal.actions.len() == 2)
			.times(1)
			.in_sequence(&mut seq)
			.returning(|_, _| Ok(BroadcastReceipt { txid: "f00d".to_string() }));

		let ack = coordinator(wallet_service)
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await
			.unwrap();

		assert_eq!(ack.txid, "f00d");
	}

	#[tokio::test]
	async fn unsigned_proposals_need_more_signatures() {
		let result = coordinator(serving_proposal(0))
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await;

		assert!(matches!(
			result,
			Err(CosignerError::NeedMoreSignatures { signatures: 0, required: 2 })
		));
	}

	#[tokio::test]
	async fn sign_failures_are_not_broadcast() {
		let mut wallet_service = serving_proposal(1);
		wallet_service.expect_sign_proposal().times(1).returning(|_, _| {
			Err(WalletServiceError::Rejected {
				code: "BAD_SIGNATURES".to_string(),
				message: "Bad signatures".to_string(),
			})
		});

		let result = coordinator(wallet_service)
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await;

		assert!(matches!(result, Err(CosignerError::SignFailed(_))));
	}

	#[tokio::test]
	async fn broadcast_failures_are_reported() {
		let mut wallet_service = serving_proposal(2);
		wallet_service.expect_broadcast_proposal().times(1).returning(|_, _| {
			Err(WalletServiceError::Rejected {
				code: "TX_NOT_ACCEPTED".to_string(),
				message: "The transaction proposal is not accepted".to_string(),
			})
		});

		let result = coordinator(wallet_service)
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await;

		assert!(matches!(result, Err(CosignerError::BroadcastFailed(_))));
	}

	#[tokio::test]
	async fn missing_proposals_are_not_found() {
		let mut wallet_service = MockWalletService::new();
		wallet_service
			.expect_get_proposal()
			.returning(|_, _| Err(WalletServiceError::NotFound("TX_NOT_FOUND".to_string())));

		let result = coordinator(wallet_service)
			.sign_and_broadcast(&complete_wallet(), TXID)
			.await;

		assert!(matches!(result, Err(CosignerError::ProposalNotFound { txid, .. }) if txid == TXID));
	}

	#[tokio::test]
	async fn incomplete_wallets_never_fetch_the_proposal() {
		let result = coordinator(MockWalletService::new())
			.sign_and_broadcast(&exported_wallet(WALLET_ID, 2), TXID)
			.await;

		assert!(matches!(result, Err(CosignerError::IncompleteWallet)));
	}
}
