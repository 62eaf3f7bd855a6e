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

use futures::future::try_join_all;
use tracing::debug;

use crate::{
	envelope::{AddressPayload, DerivedAddresses},
	error::CosignerError,
	session::WalletSession,
	wallet_service::{AddressOptions, WalletService},
	CosignerConfig,
};

// Addresses derived ahead of use would otherwise trip the wallet service's unused-address gap.
const DERIVATION_OPTIONS: AddressOptions = AddressOptions { ignore_max_gap: true };

pub struct AddressAllocator<W> {
	wallet_service: Arc<W>,
	max_new_addresses: usize,
}

impl<W: WalletService> AddressAllocator<W> {
	pub fn new(wallet_service: Arc<W>, config: &CosignerConfig) -> Self {
		Self { wallet_service, max_new_addresses: config.max_new_addresses }
	}

	pub fn max_new_addresses(&self) -> usize {
		self.max_new_addresses
	}

	/// Derives `count` new receiving addresses. More than one address is derived concurrently and
	/// the first failure fails the whole batch.
	pub async fn derive_addresses(
		&self,
		exported: &str,
		count: usize,
	) -> Result<AddressPayload, CosignerError> {
		let session = WalletSession::open(self.wallet_service.clone(), exported)?;

		if count == 0 {
			return Err(CosignerError::InvalidAddressCount { max: self.max_new_addresses })
		}
		if count > self.max_new_addresses {
			return Err(CosignerError::TooManyAddresses {
				requested: count,
				max: self.max_new_addresses,
			})
		}

		let address = if count == 1 {
			DerivedAddresses::One(
				session
					.create_address(DERIVATION_OPTIONS)
					.await
					.map_err(CosignerError::AddressDerivationFailed)?,
			)
		} else {
			DerivedAddresses::Many(
				try_join_all((0..count).map(|_| session.create_address(DERIVATION_OPTIONS)))
					.await
					.map_err(CosignerError::AddressDerivationFailed)?,
			)
		};
		debug!(count = address.count(), "Derived addresses");

		Ok(AddressPayload { address })
	}
}
