//! # Reference Obfuscation
//!
//! Persisted entities are exposed under obfuscated identifiers of the form
//! `TTHHH-HHH-HHH`: two or more hex digits of a type code, then nine hex
//! digits of `pk * 0xDEADBEEF mod 10^10` split in groups of three.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const NUM: u128 = 0xDEAD_BEEF;
const MOD: u128 = 10_000_000_000;
const MOD_INV: u128 = 0x1_7A99_1C0F;

static ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2,})([0-9A-Fa-f]{3})-([0-9A-Fa-f]{3})-([0-9A-Fa-f]{3})$").ok()
});

fn captures(reference: &str) -> Result<regex::Captures<'_>, InvalidId> {
    ID_RE
        .as_ref()
        .and_then(|re| re.captures(reference))
        .ok_or_else(|| InvalidId(reference.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid obfuscated id {0:?}")]
pub struct InvalidId(pub String);

#[derive(Debug, Clone, Copy, Default)]
pub struct IdObfuscator;

impl IdObfuscator {
    /// Obfuscate a primary key under a type code.
    pub fn encode_id(pk: u64, type_code: u32) -> String {
        let encoded = format!("{:09X}", (pk as u128 * NUM) % MOD);
        format!(
            "{:02X}{}-{}-{}",
            type_code,
            &encoded[..3],
            &encoded[3..6],
            &encoded[6..]
        )
    }

    /// Recover the primary key of an obfuscated id. Only keys below
    /// `10^10` survive the round trip.
    pub fn decode_id(reference: &str) -> Result<u64, InvalidId> {
        let caps = captures(reference)?;
        let digits: String = (2..=4).map(|group| &caps[group]).collect();
        let obfuscated =
            u128::from_str_radix(&digits, 16).map_err(|_| InvalidId(reference.to_string()))?;
        Ok(((obfuscated * MOD_INV) % MOD) as u64)
    }

    /// Type code carried by an obfuscated id.
    pub fn type_code(reference: &str) -> Result<u32, InvalidId> {
        let caps = captures(reference)?;
        u32::from_str_radix(&caps[1], 16).map_err(|_| InvalidId(reference.to_string()))
    }
}
