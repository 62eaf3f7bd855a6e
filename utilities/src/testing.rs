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

use std::{io::Write, path::Path};

/// Writes `text` to a temporary `.toml` file and runs `closure` with its path. The file is
/// removed once the closure returns.
pub fn with_file<C: FnOnce(&Path)>(text: &[u8], closure: C) {
	let mut tempfile = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
	tempfile.write_all(text).unwrap();
	closure(tempfile.path());
}
