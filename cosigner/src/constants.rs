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

// ======= Cosigner =======

/// Name this process registers under when it joins a wallet.
pub const DEFAULT_DISPLAY_NAME: &str = "this-side-cosigner";

/// Maximum number of addresses that may be derived in one request.
pub const MAX_NEW_ADDRESSES: usize = 100;

// ======= Metadata store =======

/// How long a join claim is held before it expires on its own. Must outlast a join, which is two
/// wallet service requests.
pub const DEFAULT_JOIN_CLAIM_TTL: Duration = Duration::from_secs(120);

pub const WALLET_KEY_PREFIX: &str = "wallet";
pub const JOIN_CLAIM_KEY_PREFIX: &str = "cosigner:join-claim";

// ======= Wallet service =======

pub const WALLET_SERVICE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wallet status reported by the wallet service once every copayer has joined.
pub const WALLET_STATUS_COMPLETE: &str = "complete";

// ======= Settings environment variables =======

/// Prefix for environment variables overriding settings, e.g. `COSIGNER__SERVER__PORT`.
pub const SETTINGS_ENV_PREFIX: &str = "COSIGNER";
pub const SETTINGS_ENV_SEPARATOR: &str = "__";

pub const METADATA_STORE_REDIS_URL: &str = "COSIGNER__METADATA_STORE__REDIS_URL";

pub const DEFAULT_CONFIG_PATH: &str = "config/Default.toml";
