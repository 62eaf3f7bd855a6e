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

use serde::{ser::SerializeStruct, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::{
	error::{CosignerError, ErrorKind},
	wallet_service::{Address, Balance},
};

/// The outcome of every cosigner operation. Serialises as
/// `{"success": true, "data": ..}` or `{"success": false, "error": {"code": .., "message": ..}}`.
#[derive(Debug)]
pub enum ResultEnvelope<T> {
	Success(T),
	Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
	pub code: &'static str,
	pub message: String,
	#[serde(skip)]
	pub kind: ErrorKind,
}

impl From<&CosignerError> for Failure {
	fn from(error: &CosignerError) -> Self {
		Failure { code: error.reason(), message: error.describe(), kind: error.kind() }
	}
}

impl<T> From<Result<T, CosignerError>> for ResultEnvelope<T> {
	fn from(result: Result<T, CosignerError>) -> Self {
		match result {
			Ok(data) => ResultEnvelope::Success(data),
			Err(error) => ResultEnvelope::failed(&error),
		}
	}
}

impl<T> ResultEnvelope<T> {
	pub fn failed(error: &CosignerError) -> Self {
		ResultEnvelope::Failure(Failure::from(error))
	}

	pub fn is_success(&self) -> bool {
		matches!(self, ResultEnvelope::Success(_))
	}

	pub fn data(&self) -> Option<&T> {
		match self {
			ResultEnvelope::Success(data) => Some(data),
			ResultEnvelope::Failure(_) => None,
		}
	}

	pub fn failure(&self) -> Option<&Failure> {
		match self {
			ResultEnvelope::Success(_) => None,
			ResultEnvelope::Failure(failure) => Some(failure),
		}
	}
}

impl<T: Serialize> Serialize for ResultEnvelope<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("ResultEnvelope", 2)?;
		match self {
			ResultEnvelope::Success(data) => {
				state.serialize_field("success", &true)?;
				state.serialize_field("data", data)?;
			},
			ResultEnvelope::Failure(failure) => {
				state.serialize_field("success", &false)?;
				state.serialize_field("error", failure)?;
			},
		}
		state.end()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedWalletPayload {
	/// The exported credential, to be persisted by the caller.
	#[serde(serialize_with = "serialize_exposed")]
	pub wallet: Zeroizing<String>,
}

fn serialize_exposed<S: Serializer>(
	value: &Zeroizing<String>,
	serializer: S,
) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancePayload {
	pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DerivedAddresses {
	One(Address),
	Many(Vec<Address>),
}

impl DerivedAddresses {
	pub fn count(&self) -> usize {
		match self {
			DerivedAddresses::One(_) => 1,
			DerivedAddresses::Many(addresses) => addresses.len(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPayload {
	pub address: DerivedAddresses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastAck {
	pub ok: bool,
	pub txid: String,
}
