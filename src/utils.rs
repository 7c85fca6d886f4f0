//! Identifier minting helpers.

use bech32::Bech32m;
use uuid7::uuid7;

/// Human-readable prefix on every referral identifier.
pub const REFERRAL_HRP: &str = "ref_";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Mint an opaque referral identifier.
pub fn new_referral_id() -> String {
    new_uuid_to_bech32(REFERRAL_HRP).expect("static hrp failed to parse for bech32 encoding.")
}
