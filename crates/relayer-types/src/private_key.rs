// Copyright 2024 Standard Bridge Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ethers::signers::LocalWallet;

use bridge_relayer_utils::Result;

/// Expands a leading `~/` to the current user's home directory.
///
/// Paths without the prefix, and paths on systems where no home directory can
/// be determined, are returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories_next::UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

/// Loads a hex-encoded ECDSA private key from a file into a signing wallet.
///
/// The file holds a single 32-byte key as hex, with or without the `0x`
/// prefix; surrounding whitespace is ignored.
pub fn load_key_file<P: AsRef<Path>>(path: P) -> Result<LocalWallet> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let wallet = LocalWallet::from_str(raw.trim())?;
    Ok(wallet)
}
