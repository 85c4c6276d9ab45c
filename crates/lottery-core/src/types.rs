use crate::error::LotteryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of the chat user issuing commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// EVM account or contract address, stored as lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainAddress(String);

impl ChainAddress {
    pub fn parse(value: &str) -> Result<Self, LotteryError> {
        let trimmed = value.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| LotteryError::InvalidAddress(format!("'{trimmed}' is missing 0x")))?;

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LotteryError::InvalidAddress(format!(
                "'{trimmed}' is not a 20-byte hex address"
            )));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// For compile-time constants already in canonical form.
    pub(crate) fn from_canonical(value: &'static str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChainAddress {
    type Error = LotteryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChainAddress> for String {
    fn from(value: ChainAddress) -> Self {
        value.0
    }
}

/// Number of tickets in a purchase. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct TicketAmount(u64);

impl TicketAmount {
    pub fn new(count: u64) -> Result<Self, LotteryError> {
        if count == 0 {
            return Err(LotteryError::InvalidCommand(
                "ticket-amount must be at least 1".to_string(),
            ));
        }
        Ok(Self(count))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_single(self) -> bool {
        self.0 == 1
    }
}

impl fmt::Display for TicketAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for TicketAmount {
    type Error = LotteryError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TicketAmount> for u64 {
    fn from(value: TicketAmount) -> Self {
        value.0
    }
}

/// Token quantity in base units (wei-style).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// `whole` tokens at the given precision, or `None` if that does not fit in a `u128`.
    pub fn from_whole(whole: u64, decimals: u8) -> Option<Self> {
        10u128
            .checked_pow(u32::from(decimals))
            .and_then(|scale| u128::from(whole).checked_mul(scale))
            .map(Self)
    }

    pub fn base_units(self) -> u128 {
        self.0
    }

    /// Decimal rendering with trailing zeros trimmed, e.g. `12.5` or `3`.
    pub fn format_units(self, decimals: u8) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        // Past 10^38 every u128 is a pure fraction.
        let (whole, fraction) = match 10u128.checked_pow(u32::from(decimals)) {
            Some(scale) => (self.0 / scale, self.0 % scale),
            None => (0, self.0),
        };
        if fraction == 0 {
            return whole.to_string();
        }
        let digits = format!("{:0width$}", fraction, width = usize::from(decimals));
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

/// Identifier of one workflow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single-use key under which a request waits at the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(Uuid);

impl PromptId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, LotteryError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|e| LotteryError::InvalidToken(format!("bad prompt id '{value}': {e}")))
    }

    /// 32 hex digits, no hyphens.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_normalized_to_lowercase() {
        let address = ChainAddress::parse("0xE101FB315A64CDA9944E570A7BFFAFE60B994B1D").unwrap();
        assert_eq!(address.as_str(), "0xe101fb315a64cda9944e570a7bffafe60b994b1d");
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(ChainAddress::parse("e101fb315a64cda9944e570a7bffafe60b994b1d").is_err());
        assert!(ChainAddress::parse("0x1234").is_err());
        assert!(ChainAddress::parse("0xzz01fb315a64cda9944e570a7bffafe60b994b1d").is_err());
    }

    #[test]
    fn ticket_amount_must_be_positive() {
        assert!(TicketAmount::new(0).is_err());
        assert_eq!(TicketAmount::new(3).unwrap().get(), 3);
        assert!(serde_json::from_str::<TicketAmount>("0").is_err());
    }

    #[test]
    fn token_amount_formats_like_ether() {
        assert_eq!(TokenAmount::from_whole(5, 18).unwrap().format_units(18), "5");
        assert_eq!(
            TokenAmount::from_base_units(12_500_000_000_000_000_000).format_units(18),
            "12.5"
        );
        assert_eq!(TokenAmount::from_base_units(1).format_units(18), "0.000000000000000001");
        assert_eq!(TokenAmount::ZERO.format_units(18), "0");
    }

    #[test]
    fn whole_amounts_never_saturate() {
        assert!(TokenAmount::from_whole(1, 39).is_none());
        assert!(TokenAmount::from_whole(u64::MAX, 38).is_none());
        assert_eq!(
            TokenAmount::from_whole(3, 38).unwrap().base_units(),
            3 * 10u128.pow(38)
        );
    }

    #[test]
    fn formatting_past_u128_precision_is_fractional() {
        assert_eq!(
            TokenAmount::from_base_units(5).format_units(40),
            format!("0.{}5", "0".repeat(39))
        );
    }

    #[test]
    fn prompt_id_round_trips_in_simple_form() {
        let id = PromptId::generate();
        assert_eq!(PromptId::parse(&id.simple()).unwrap(), id);
        assert_eq!(id.simple().len(), 32);
    }
}
