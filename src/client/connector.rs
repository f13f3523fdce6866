//! Wallet-connector boundary
//!
//! The connector hands over a raw externally-owned-account identifier; the
//! core only ever sees the normalized form produced here.

use crate::error::WalletError;

/// Normalize a raw EOA identifier into the canonical owner user id:
/// 0x-prefixed, 20-byte hex, lowercase.
pub fn normalize_user_id(raw: &str) -> Result<String, WalletError> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| WalletError::MissingOwner(format!("missing 0x prefix: {:?}", raw)))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::MissingOwner(format!(
            "not a 20-byte hex id: {:?}",
            raw
        )));
    }

    Ok(format!("0x{}", hex_part.to_lowercase()))
}
