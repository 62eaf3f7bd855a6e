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

#[cfg(feature = "test-utils")]
pub mod testing;

#[macro_export]
macro_rules! assert_ok {
	($result:expr) => {
		match $result {
			Ok(value) => value,
			Err(error) => panic!("expected Ok(_), got Err({:?})", error),
		}
	};
}

#[macro_export]
macro_rules! assert_err {
	($result:expr) => {
		match $result {
			Ok(value) => panic!("expected Err(_), got Ok({:?})", value),
			Err(error) => error,
		}
	};
}

/// `file:line:column` of the macro call.
#[macro_export]
macro_rules! here {
	() => {
		concat!(file!(), ":", line!(), ":", column!())
	};
}

#[macro_export]
macro_rules! context {
	($e:expr) => {{
		// Using function ensures the expression's temporary's lifetimes last until after context!()
		// call
		#[inline(always)]
		fn get_expr_type<V, E, T: anyhow::Context<V, E>, Here: core::fmt::Display>(
			t: T,
			here: Here,
		) -> anyhow::Result<V> {
			t.with_context(|| {
				format!(
					"Error: '{}' with type '{}' failed at {}",
					stringify!($e),
					std::any::type_name::<T>(),
					here
				)
			})
		}

		get_expr_type($e, $crate::here!())
	}};
}

#[macro_export]
macro_rules! print_starting {
	() => {
		println!(
			"Starting {} v{} ({})",
			env!("CARGO_PKG_NAME"),
			env!("CARGO_PKG_VERSION"),
			option_env!("COMMIT_HASH").unwrap_or("local build")
		);
	};
}
