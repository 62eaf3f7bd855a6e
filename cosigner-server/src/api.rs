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

//! HTTP routes. Every response body is a [`ResultEnvelope`], the status code follows the kind of
//! failure.

use std::{convert::Infallible, sync::Arc};

use cosigner::{
	envelope::{Failure, ResultEnvelope},
	error::{CosignerError, ErrorKind},
	metadata_store::MetadataStore,
	wallet_service::WalletService,
	Cosigner,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use warp::{http::StatusCode, Filter};

const MISSING_PARAMS: &str = "missing params";

type JsonReply = warp::reply::WithStatus<warp::reply::Json>;

fn using<T: Clone + Send>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
	warp::any().map(move || value.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
	warp::body::json()
}

/// All routes, with rejections turned into failure envelopes.
pub fn routes<W: WalletService, M: MetadataStore>(
	cosigner: Arc<Cosigner<W, M>>,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
	endpoints(cosigner).recover(handle_rejection).with(warp::log("cosigner_server::api"))
}

pub fn endpoints<W: WalletService, M: MetadataStore>(
	cosigner: Arc<Cosigner<W, M>>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
	let join = warp::path!("join")
		.and(warp::post())
		.and(json_body::<JoinRequest>())
		.and(using(cosigner.clone()))
		.then(post_join::<W, M>);

	let sign = warp::path!("sign")
		.and(warp::post())
		.and(json_body::<SignRequest>())
		.and(using(cosigner.clone()))
		.then(post_sign::<W, M>);

	let new_address = warp::path!("address" / "new")
		.and(warp::post())
		.and(json_body::<NewAddressRequest>())
		.and(using(cosigner.clone()))
		.then(post_new_address::<W, M>);

	let balance = warp::path!("balance")
		.and(warp::post())
		.and(json_body::<BalanceRequest>())
		.and(using(cosigner))
		.then(post_balance::<W, M>);

	let health = warp::path!("health")
		.and(warp::get())
		.map(|| respond(ResultEnvelope::Success(Health { ok: true })));

	join.or(sign).or(new_address).or(balance).or(health)
}

#[derive(Serialize)]
struct Health {
	ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
	wallet_id: Option<String>,
	secret: Option<String>,
}

/// `wallet` is the exported credential, either as a string or as the JSON document itself.
#[derive(Debug, Deserialize)]
pub struct SignRequest {
	wallet: Option<serde_json::Value>,
	txid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewAddressRequest {
	wallet: Option<serde_json::Value>,
	num: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
	wallet: Option<serde_json::Value>,
}

fn missing_params() -> CosignerError {
	CosignerError::InvalidRequest(MISSING_PARAMS.to_string())
}

fn required(field: Option<String>) -> Result<String, CosignerError> {
	field.filter(|value| !value.trim().is_empty()).ok_or_else(missing_params)
}

fn required_wallet(wallet: Option<serde_json::Value>) -> Result<String, CosignerError> {
	match wallet {
		Some(serde_json::Value::String(exported)) => required(Some(exported)),
		Some(document @ serde_json::Value::Object(_)) => Ok(document.to_string()),
		_ => Err(missing_params()),
	}
}

/// Leading integer of `text` after optional whitespace and sign, e.g. `"12 addresses"` is 12.
fn leading_integer(text: &str) -> Option<i64> {
	let text = text.trim_start();
	let (negative, unsigned) = match text.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, text.strip_prefix('+').unwrap_or(text)),
	};
	let digits = unsigned.find(|c: char| !c.is_ascii_digit()).unwrap_or(unsigned.len());
	if digits == 0 {
		return None
	}
	// Digits beyond i64 are far more addresses than anyone may ask for.
	let magnitude = unsigned[..digits].parse::<i64>().unwrap_or(i64::MAX);
	Some(if negative { -magnitude } else { magnitude })
}

/// `num` may be a number or a string starting with one. Fractions are truncated. A missing,
/// zero or non-numeric `num` means one address.
fn address_count(num: Option<serde_json::Value>, max: usize) -> Result<usize, CosignerError> {
	let parsed = match num {
		Some(serde_json::Value::Number(number)) =>
			number.as_i64().or_else(|| number.as_f64().map(|number| number.trunc() as i64)),
		Some(serde_json::Value::String(text)) => leading_integer(&text),
		_ => None,
	};

	match parsed {
		None | Some(0) => Ok(1),
		Some(count) if count < 0 => Err(CosignerError::InvalidAddressCount { max }),
		Some(count) => Ok(usize::try_from(count).unwrap_or(usize::MAX)),
	}
}

impl JoinRequest {
	fn validate(self) -> Result<(String, String), CosignerError> {
		Ok((required(self.wallet_id)?, required(self.secret)?))
	}
}

impl SignRequest {
	fn validate(self) -> Result<(String, String), CosignerError> {
		Ok((required_wallet(self.wallet)?, required(self.txid)?))
	}
}

impl NewAddressRequest {
	fn validate(self, max_new_addresses: usize) -> Result<(String, usize), CosignerError> {
		Ok((required_wallet(self.wallet)?, address_count(self.num, max_new_addresses)?))
	}
}

async fn post_join<W: WalletService, M: MetadataStore>(
	request: JoinRequest,
	cosigner: Arc<Cosigner<W, M>>,
) -> JsonReply {
	respond(match request.validate() {
		Ok((wallet_id, secret)) => cosigner.join(&wallet_id, &secret).await,
		Err(error) => ResultEnvelope::failed(&error),
	})
}

async fn post_sign<W: WalletService, M: MetadataStore>(
	request: SignRequest,
	cosigner: Arc<Cosigner<W, M>>,
) -> JsonReply {
	respond(match request.validate() {
		Ok((wallet, txid)) => cosigner.sign_and_broadcast(&wallet, &txid).await,
		Err(error) => ResultEnvelope::failed(&error),
	})
}

async fn post_new_address<W: WalletService, M: MetadataStore>(
	request: NewAddressRequest,
	cosigner: Arc<Cosigner<W, M>>,
) -> JsonReply {
	respond(match request.validate(cosigner.max_new_addresses()) {
		Ok((wallet, count)) => cosigner.derive_addresses(&wallet, count).await,
		Err(error) => ResultEnvelope::failed(&error),
	})
}

async fn post_balance<W: WalletService, M: MetadataStore>(
	request: BalanceRequest,
	cosigner: Arc<Cosigner<W, M>>,
) -> JsonReply {
	respond(match required_wallet(request.wallet) {
		Ok(wallet) => cosigner.balance(&wallet).await,
		Err(error) => ResultEnvelope::failed(&error),
	})
}

fn status_for(kind: ErrorKind) -> StatusCode {
	match kind {
		ErrorKind::Validation => StatusCode::BAD_REQUEST,
		ErrorKind::Precondition | ErrorKind::Policy | ErrorKind::Consistency =>
			StatusCode::CONFLICT,
		ErrorKind::Collaborator => StatusCode::BAD_GATEWAY,
		ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

/// Convert an envelope into a warp response
pub fn respond<T: Serialize>(envelope: ResultEnvelope<T>) -> JsonReply {
	let status = envelope.failure().map_or(StatusCode::OK, |failure| status_for(failure.kind));
	warp::reply::with_status(warp::reply::json(&envelope), status)
}

fn rejection_failure(
	code: &'static str,
	message: String,
	status: StatusCode,
) -> (Failure, StatusCode) {
	let kind = if status.is_server_error() { ErrorKind::Internal } else { ErrorKind::Validation };
	(Failure { code, message, kind }, status)
}

/// Warp rejection handler
pub async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
	let (failure, status) = if err.is_not_found() {
		rejection_failure("not_found", "Not Found".to_string(), StatusCode::NOT_FOUND)
	} else if let Some(error) = err.find::<warp::filters::body::BodyDeserializeError>() {
		let failure = Failure::from(&CosignerError::InvalidRequest(error.to_string()));
		(failure, StatusCode::BAD_REQUEST)
	} else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
		rejection_failure(
			"method_not_allowed",
			"Method Not Allowed".to_string(),
			StatusCode::METHOD_NOT_ALLOWED,
		)
	} else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
		rejection_failure(
			"unsupported_media_type",
			"Expected a JSON body".to_string(),
			StatusCode::UNSUPPORTED_MEDIA_TYPE,
		)
	} else {
		error!("unhandled rejection: {:?}", err);
		rejection_failure(
			"internal_error",
			"Something went wrong".to_string(),
			StatusCode::INTERNAL_SERVER_ERROR,
		)
	};

	Ok(warp::reply::with_status(
		warp::reply::json(&ResultEnvelope::<()>::Failure(failure)),
		status,
	))
}

#[cfg(test)]
mod tests {
	use cosigner::{
		credential::WalletCredential,
		metadata_store::{ClaimToken, CosignerSlotCount, JoinClaim, MockMetadataStore},
		secret::{JoinSecret, Network},
		wallet_service::{
			Address, Balance, BroadcastReceipt, JoinedWallet, MockWalletService,
			TransactionProposal, WalletStatus,
		},
		CosignerConfig,
	};
	use serde_json::{json, Value};

	use super::*;

	const WALLET_ID: &str = "8f0b2a4e-7c1d-4b5e-9a3f-2d6c8e1f0a7b";
	const WALLET_PRIVATE_KEY: &str = "cMcfH8sRgBgDMfpBNG6H3haaxLkaYXgqMRef8Nev6tWyBSNr6c3n";

	fn exported_wallet(keys: usize) -> String {
		json!({
			"walletId": WALLET_ID,
			"walletName": "treasury",
			"m": 2,
			"n": 3,
			"copayerId": "0c5b4d7e",
			"publicKeyRing": (0..keys)
				.map(|i| json!({ "xPubKey": format!("tpub{i}") }))
				.collect::<Vec<_>>(),
		})
		.to_string()
	}

	fn join_secret() -> String {
		JoinSecret::build(WALLET_ID, WALLET_PRIVATE_KEY, Network::Testnet, None).unwrap()
	}

	fn test_routes(
		wallet_service: MockWalletService,
		metadata_store: MockMetadataStore,
	) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
		test_routes_with(wallet_service, metadata_store, CosignerConfig::default())
	}

	fn test_routes_with(
		wallet_service: MockWalletService,
		metadata_store: MockMetadataStore,
		config: CosignerConfig,
	) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
		routes(Arc::new(Cosigner::new(wallet_service, metadata_store, config)))
	}

	async fn post<F>(routes: &F, path: &str, body: Value) -> (StatusCode, Value)
	where
		F: Filter + 'static,
		F::Extract: warp::Reply + Send,
	{
		let response =
			warp::test::request().method("POST").path(path).json(&body).reply(routes).await;
		(response.status(), serde_json::from_slice(response.body()).unwrap())
	}

	fn address(index: usize) -> Address {
		Address {
			address: format!("2N4DNB8Kz7Jm5xEbHm1zYEYAHKM6Drr6i{index:02}"),
			path: None,
			is_change: false,
		}
	}

	#[tokio::test]
	async fn join_returns_the_exported_wallet() {
		let mut metadata_store = MockMetadataStore::new();
		metadata_store
			.expect_cosigner_slots()
			.returning(|_| Ok(Some(CosignerSlotCount { expected: 3, joined: 2 })));
		metadata_store
			.expect_claim_join()
			.returning(|_, _| Ok(JoinClaim::Claimed(ClaimToken::new("claim"))));
		metadata_store.expect_release_join().returning(|_, _| Ok(()));

		let mut wallet_service = MockWalletService::new();
		wallet_service.expect_join_wallet().returning(|_, _| {
			Ok(JoinedWallet {
				wallet_name: "treasury".to_string(),
				credential: WalletCredential::import(&exported_wallet(2)).unwrap(),
			})
		});
		wallet_service.expect_open_wallet().returning(|_| {
			Ok(WalletStatus {
				status: "complete".to_string(),
				credential: WalletCredential::import(&exported_wallet(3)).unwrap(),
			})
		});

		let (status, body) = post(
			&test_routes(wallet_service, metadata_store),
			"/join",
			json!({ "walletId": WALLET_ID, "secret": join_secret() }),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "success": true, "data": { "wallet": exported_wallet(3) } }));
	}

	#[tokio::test]
	async fn missing_fields_are_rejected_without_calls() {
		let routes = test_routes(MockWalletService::new(), MockMetadataStore::new());

		for (path, body) in [
			("/join", json!({ "walletId": WALLET_ID })),
			("/join", json!({ "walletId": "", "secret": join_secret() })),
			("/sign", json!({ "wallet": exported_wallet(3) })),
			("/sign", json!({ "txid": "tx-1" })),
			("/address/new", json!({ "num": 2 })),
			("/balance", json!({})),
		] {
			let (status, body) = post(&routes, path, body).await;

			assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
			assert_eq!(body["success"], false);
			assert_eq!(body["error"]["code"], "invalid_request");
			assert_eq!(body["error"]["message"], "missing params");
			assert!(body.get("data").is_none());
		}
	}

	#[tokio::test]
	async fn join_gate_refusals_are_conflicts() {
		let mut metadata_store = MockMetadataStore::new();
		metadata_store
			.expect_claim_join()
			.returning(|_, _| Ok(JoinClaim::Claimed(ClaimToken::new("claim"))));
		metadata_store
			.expect_cosigner_slots()
			.returning(|_| Ok(Some(CosignerSlotCount { expected: 3, joined: 3 })));
		metadata_store.expect_release_join().times(1).returning(|_, _| Ok(()));

		let (status, body) = post(
			&test_routes(MockWalletService::new(), metadata_store),
			"/join",
			json!({ "walletId": WALLET_ID, "secret": join_secret() }),
		)
		.await;

		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"]["code"], "wallet_full");
	}

	#[tokio::test]
	async fn num_accepts_numbers_and_numeric_strings() {
		let mut wallet_service = MockWalletService::new();
		wallet_service.expect_create_address().times(1 + 3 + 2).returning({
			let mut index = 0;
			move |_, _| {
				index += 1;
				Ok(address(index))
			}
		});
		let routes = test_routes(wallet_service, MockMetadataStore::new());

		let (status, body) =
			post(&routes, "/address/new", json!({ "wallet": exported_wallet(3) })).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["data"]["address"]["address"].is_string());

		let (_, body) =
			post(&routes, "/address/new", json!({ "wallet": exported_wallet(3), "num": 3 })).await;
		assert_eq!(body["data"]["address"].as_array().unwrap().len(), 3);

		// The credential may also be sent as a JSON document.
		let wallet: Value = serde_json::from_str(&exported_wallet(3)).unwrap();
		let (_, body) = post(&routes, "/address/new", json!({ "wallet": wallet, "num": "2" })).await;
		assert_eq!(body["data"]["address"].as_array().unwrap().len(), 2);
	}

	#[test]
	fn num_is_read_like_a_leading_integer() {
		for (num, count) in [
			(None, 1),
			(Some(json!(null)), 1),
			(Some(json!(0)), 1),
			(Some(json!("many")), 1),
			(Some(json!(true)), 1),
			(Some(json!(1.5)), 1),
			(Some(json!(-0.5)), 1),
			(Some(json!(4)), 4),
			(Some(json!("2")), 2),
			(Some(json!(" 3 addresses")), 3),
			(Some(json!(101)), 101),
		] {
			assert_eq!(address_count(num.clone(), 100).unwrap(), count, "num = {num:?}");
		}

		for num in [json!(-4), json!("-2"), json!(-1.5)] {
			assert!(matches!(
				address_count(Some(num), 100),
				Err(CosignerError::InvalidAddressCount { max: 100 })
			));
		}
	}

	#[tokio::test]
	async fn address_counts_are_checked_against_the_configured_maximum() {
		let routes = test_routes_with(
			MockWalletService::new(),
			MockMetadataStore::new(),
			CosignerConfig { max_new_addresses: 10, ..Default::default() },
		);

		for (num, code, message) in [
			(json!(-4), "invalid_address_count", "num must be between 1 and 10"),
			(json!(11), "too_many_addresses", "num cannot be greater than 10 (requested 11)"),
		] {
			let (status, body) = post(
				&routes,
				"/address/new",
				json!({ "wallet": exported_wallet(3), "num": num }),
			)
			.await;

			assert_eq!(status, StatusCode::BAD_REQUEST);
			assert_eq!(body["error"]["code"], code);
			assert_eq!(body["error"]["message"], message);
		}
	}

	#[tokio::test]
	async fn sign_broadcasts_a_fully_signed_proposal() {
		let mut wallet_service = MockWalletService::new();
		wallet_service.expect_get_proposal().returning(|_, txid| {
			Ok(serde_json::from_value::<TransactionProposal>(json!({
				"id": txid,
				"actions": [{ "copayerId": "a", "type": "accept" }, { "copayerId": "b", "type": "accept" }],
			}))
			.unwrap())
		});
		wallet_service
			.expect_broadcast_proposal()
			.returning(|_, _| Ok(BroadcastReceipt { txid: "5e1f".to_string() }));

		let (status, body) = post(
			&test_routes(wallet_service, MockMetadataStore::new()),
			"/sign",
			json!({ "wallet": exported_wallet(3), "txid": "tx-1" }),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({ "success": true, "data": { "ok": true, "txid": "5e1f" } }));
	}

	#[tokio::test]
	async fn incomplete_wallets_are_conflicts() {
		let (status, body) = post(
			&test_routes(MockWalletService::new(), MockMetadataStore::new()),
			"/balance",
			json!({ "wallet": exported_wallet(2) }),
		)
		.await;

		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"]["code"], "incomplete_wallet");
	}

	#[tokio::test]
	async fn balance_is_returned() {
		let mut wallet_service = MockWalletService::new();
		wallet_service
			.expect_get_balance()
			.returning(|_| Ok(Balance { total_amount: 42, ..Default::default() }));

		let (status, body) = post(
			&test_routes(wallet_service, MockMetadataStore::new()),
			"/balance",
			json!({ "wallet": exported_wallet(3) }),
		)
		.await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"]["balance"]["totalAmount"], 42);
		assert_eq!(body["data"]["balance"]["availableConfirmedAmount"], 0);
	}

	#[tokio::test]
	async fn malformed_bodies_and_unknown_routes_are_envelopes() {
		let routes = test_routes(MockWalletService::new(), MockMetadataStore::new());

		let response = warp::test::request()
			.method("POST")
			.path("/sign")
			.header("content-type", "application/json")
			.body("{ not json")
			.reply(&routes)
			.await;
		let body: Value = serde_json::from_slice(response.body()).unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(body["error"]["code"], "invalid_request");

		let response = warp::test::request().method("POST").path("/nowhere").reply(&routes).await;
		let body: Value = serde_json::from_slice(response.body()).unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(body["success"], false);
	}

	#[tokio::test]
	async fn health_is_served() {
		let response = warp::test::request()
			.method("GET")
			.path("/health")
			.reply(&test_routes(MockWalletService::new(), MockMetadataStore::new()))
			.await;

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			serde_json::from_slice::<Value>(response.body()).unwrap(),
			json!({ "success": true, "data": { "ok": true } })
		);
	}
}
