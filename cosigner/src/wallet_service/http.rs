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
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{
	Address, AddressOptions, Balance, BroadcastReceipt, JoinedWallet, TransactionProposal,
	WalletService, WalletServiceError, WalletStatus,
};
use crate::{credential::WalletCredential, secret::JoinSecret};

const JOIN_PATH: &str = "v1/wallets/join";
const STATUS_PATH: &str = "v1/wallets/status";
const BALANCE_PATH: &str = "v1/wallets/balance";
const ADDRESSES_PATH: &str = "v1/addresses";
const PROPOSAL_PATH: &str = "v1/txproposals/get";
const SIGN_PATH: &str = "v1/txproposals/sign";
const BROADCAST_PATH: &str = "v1/txproposals/broadcast";

/// Talks JSON over HTTP to a gateway in front of the wallet client library.
#[derive(Clone)]
pub struct HttpWalletService {
	client: reqwest::Client,
	endpoint: Url,
}

impl HttpWalletService {
	pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, WalletServiceError> {
		let mut endpoint = Url::parse(endpoint)?;
		// Relative joins replace the last path segment unless it ends with a slash.
		if !endpoint.path().ends_with('/') {
			endpoint.set_path(&format!("{}/", endpoint.path()));
		}

		Ok(Self { client: reqwest::Client::builder().timeout(request_timeout).build()?, endpoint })
	}

	async fn post<Request, Response>(
		&self,
		path: &str,
		request: &Request,
	) -> Result<Response, WalletServiceError>
	where
		Request: Serialize + ?Sized + Sync,
		Response: DeserializeOwned,
	{
		let url = self.endpoint.join(path)?;
		debug!(%url, "Calling wallet service");

		let response = self.client.post(url).json(request).send().await?;
		let status = response.status();
		let body = response.bytes().await?;

		if status.is_success() {
			return serde_json::from_slice(&body)
				.map_err(|error| WalletServiceError::InvalidResponse(error.to_string()))
		}

		let failure = serde_json::from_slice::<ServiceFailure>(&body).unwrap_or_else(|_| {
			ServiceFailure {
				code: status.as_str().to_string(),
				message: String::from_utf8_lossy(&body).into_owned(),
			}
		});

		Err(if status == StatusCode::NOT_FOUND {
			WalletServiceError::NotFound(failure.message)
		} else {
			WalletServiceError::Rejected { code: failure.code, message: failure.message }
		})
	}
}

#[derive(Deserialize)]
struct ServiceFailure {
	code: String,
	message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
	secret: &'a str,
	copayer_name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinResponse {
	wallet_name: String,
	wallet: String,
}

#[derive(Serialize)]
struct WalletRequest<'a> {
	wallet: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
	status: String,
	wallet: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressRequest<'a> {
	wallet: &'a str,
	#[serde(flatten)]
	options: AddressOptions,
}

#[derive(Serialize)]
struct ProposalRequest<'a> {
	wallet: &'a str,
	txid: &'a str,
}

#[derive(Serialize)]
struct ProposalActionRequest<'a> {
	wallet: &'a str,
	proposal: &'a TransactionProposal,
}

fn import_returned(blob: &str) -> Result<WalletCredential, WalletServiceError> {
	WalletCredential::import(blob)
		.map_err(|error| WalletServiceError::InvalidResponse(error.to_string()))
}

#[async_trait]
impl WalletService for HttpWalletService {
	async fn join_wallet(
		&self,
		secret: &JoinSecret,
		copayer_name: &str,
	) -> Result<JoinedWallet, WalletServiceError> {
		let response: JoinResponse = self
			.post(JOIN_PATH, &JoinRequest { secret: secret.expose(), copayer_name })
			.await?;

		Ok(JoinedWallet {
			wallet_name: response.wallet_name,
			credential: import_returned(&response.wallet)?,
		})
	}

	async fn open_wallet(
		&self,
		credential: &WalletCredential,
	) -> Result<WalletStatus, WalletServiceError> {
		let response: StatusResponse =
			self.post(STATUS_PATH, &WalletRequest { wallet: credential.expose() }).await?;

		Ok(WalletStatus {
			status: response.status,
			credential: import_returned(&response.wallet)?,
		})
	}

	async fn get_balance(
		&self,
		credential: &WalletCredential,
	) -> Result<Balance, WalletServiceError> {
		self.post(BALANCE_PATH, &WalletRequest { wallet: credential.expose() }).await
	}

	async fn create_address(
		&self,
		credential: &WalletCredential,
		options: AddressOptions,
	) -> Result<Address, WalletServiceError> {
		self.post(ADDRESSES_PATH, &AddressRequest { wallet: credential.expose(), options }).await
	}

	async fn get_proposal(
		&self,
		credential: &WalletCredential,
		txid: &str,
	) -> Result<TransactionProposal, WalletServiceError> {
		self.post(PROPOSAL_PATH, &ProposalRequest { wallet: credential.expose(), txid }).await
	}

	async fn sign_proposal(
		&self,
		credential: &WalletCredential,
		proposal: &TransactionProposal,
	) -> Result<TransactionProposal, WalletServiceError> {
		self.post(SIGN_PATH, &ProposalActionRequest { wallet: credential.expose(), proposal }).await
	}

	async fn broadcast_proposal(
		&self,
		credential: &WalletCredential,
		proposal: &TransactionProposal,
	) -> Result<BroadcastReceipt, WalletServiceError> {
		let request = ProposalActionRequest { wallet: credential.expose(), proposal };
		self.post(BROADCAST_PATH, &request).await
	}
}
