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

use crate::{metadata_store::StoreError, wallet_service::WalletServiceError};

/// Broad classes of failure. The transport maps these onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Malformed or out-of-range input, detected before any external call.
	Validation,
	/// The credential cannot be used for the requested operation.
	Precondition,
	/// The request is well formed but this cosigner refuses to act on it now.
	Policy,
	/// The wallet service or the metadata store failed.
	Collaborator,
	/// The wallet service accepted a call but its state contradicts the result.
	Consistency,
	Internal,
}

#[derive(thiserror::Error, Debug)]
pub enum CosignerError {
	#[error("{0}")]
	InvalidRequest(String),
	#[error("invalid wallet credential: {0}")]
	InvalidCredential(String),
	#[error("invalid join secret: {0}")]
	InvalidSecret(String),
	#[error("walletId does not match the join secret")]
	SecretMismatch,
	#[error("wallet is not complete, need more signers")]
	IncompleteWallet,

	#[error("wallet not found")]
	WalletNotFound,
	#[error("metadata store unavailable")]
	StoreUnavailable(#[source] StoreError),
	#[error("wallet is full")]
	WalletFull,
	#[error("other cosigners need to join first ({spots_left} spots left)")]
	OthersMustJoinFirst { spots_left: i64 },
	#[error("another join for this wallet is already in progress")]
	JoinInProgress,
	#[error("failed to join wallet")]
	JoinFailed(#[source] WalletServiceError),
	#[error("joined, but the wallet status could not be read")]
	JoinVerificationFailed(#[source] WalletServiceError),
	#[error("joined, but wallet is not complete (status: {status})")]
	JoinIncomplete { status: String },

	#[error("could not read the wallet balance")]
	BalanceUnavailable(#[source] WalletServiceError),

	#[error("num must be between 1 and {max}")]
	InvalidAddressCount { max: usize },
	#[error("num cannot be greater than {max} (requested {requested})")]
	TooManyAddresses { requested: usize, max: usize },
	#[error("failed to derive a new address")]
	AddressDerivationFailed(#[source] WalletServiceError),

	#[error("transaction proposal {txid} not found")]
	ProposalNotFound {
		txid: String,
		#[source]
		source: WalletServiceError,
	},
	#[error("could not fetch transaction proposal {txid}")]
	ProposalUnavailable {
		txid: String,
		#[source]
		source: WalletServiceError,
	},
	#[error("need more signatures ({signatures} of {required} present)")]
	NeedMoreSignatures { signatures: usize, required: u32 },
	#[error("proposal carries {signatures} actions but only {required} signatures are required")]
	UnexpectedSignatureCount { signatures: usize, required: u32 },
	#[error("failed to sign transaction proposal")]
	SignFailed(#[source] WalletServiceError),
	#[error("failed to broadcast transaction proposal")]
	BroadcastFailed(#[source] WalletServiceError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl CosignerError {
	/// Short, stable identifier for this failure. Clients match on this rather than on the
	/// human readable message.
	pub fn reason(&self) -> &'static str {
		match self {
			CosignerError::InvalidRequest(_) => "invalid_request",
			CosignerError::InvalidCredential(_) => "invalid_credential",
			CosignerError::InvalidSecret(_) => "invalid_secret",
			CosignerError::SecretMismatch => "secret_mismatch",
			CosignerError::IncompleteWallet => "incomplete_wallet",
			CosignerError::WalletNotFound => "wallet_not_found",
			CosignerError::StoreUnavailable(_) => "store_unavailable",
			CosignerError::WalletFull => "wallet_full",
			CosignerError::OthersMustJoinFirst { .. } => "others_must_join_first",
			CosignerError::JoinInProgress => "join_in_progress",
			CosignerError::JoinFailed(_) => "join_failed",
			CosignerError::JoinVerificationFailed(_) => "join_verification_failed",
			CosignerError::JoinIncomplete { .. } => "join_incomplete",
			CosignerError::BalanceUnavailable(_) => "balance_unavailable",
			CosignerError::InvalidAddressCount { .. } => "invalid_address_count",
			CosignerError::TooManyAddresses { .. } => "too_many_addresses",
			CosignerError::AddressDerivationFailed(_) => "address_derivation_failed",
			CosignerError::ProposalNotFound { .. } => "proposal_not_found",
			CosignerError::ProposalUnavailable { .. } => "proposal_unavailable",
			CosignerError::NeedMoreSignatures { .. } => "need_more_signatures",
			CosignerError::UnexpectedSignatureCount { .. } => "unexpected_signature_count",
			CosignerError::SignFailed(_) => "sign_failed",
			CosignerError::BroadcastFailed(_) => "broadcast_failed",
			CosignerError::Internal(_) => "internal_error",
		}
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			CosignerError::InvalidRequest(_) |
			CosignerError::InvalidCredential(_) |
			CosignerError::InvalidSecret(_) |
			CosignerError::SecretMismatch |
			CosignerError::InvalidAddressCount { .. } |
			CosignerError::TooManyAddresses { .. } => ErrorKind::Validation,
			CosignerError::IncompleteWallet => ErrorKind::Precondition,
			CosignerError::WalletNotFound |
			CosignerError::WalletFull |
			CosignerError::OthersMustJoinFirst { .. } |
			CosignerError::JoinInProgress |
			CosignerError::NeedMoreSignatures { .. } |
			CosignerError::UnexpectedSignatureCount { .. } => ErrorKind::Policy,
			CosignerError::StoreUnavailable(_) |
			CosignerError::JoinFailed(_) |
			CosignerError::JoinVerificationFailed(_) |
			CosignerError::BalanceUnavailable(_) |
			CosignerError::AddressDerivationFailed(_) |
			CosignerError::ProposalNotFound { .. } |
			CosignerError::ProposalUnavailable { .. } |
			CosignerError::SignFailed(_) |
			CosignerError::BroadcastFailed(_) => ErrorKind::Collaborator,
			CosignerError::JoinIncomplete { .. } => ErrorKind::Consistency,
			CosignerError::Internal(_) => ErrorKind::Internal,
		}
	}

	/// The message including every underlying cause, e.g.
	/// `failed to sign transaction proposal: wallet service rejected the request: ...`.
	pub fn describe(&self) -> String {
		let mut message = self.to_string();
		let mut source = std::error::Error::source(self);
		while let Some(cause) = source {
			message.push_str(": ");
			message.push_str(&cause.to_string());
			source = cause.source();
		}
		message
	}
}
