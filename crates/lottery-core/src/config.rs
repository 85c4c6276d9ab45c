use crate::error::LotteryError;
use crate::types::ChainAddress;
use std::time::Duration;

/// RLUSD stablecoin contract on Ethereum mainnet.
pub const RLUSD_TOKEN_ADDRESS: &str = "0xe101fb315a64cda9944e570a7bffafe60b994b1d";

/// Largest precision whose one-token unit fits in a `u128`.
pub const MAX_TOKEN_DECIMALS: u8 = 38;

/// Lottery runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct LotteryConfig {
    pub lottery_address: Option<ChainAddress>,
    pub token_address: ChainAddress,
    pub token_symbol: String,
    pub token_decimals: u8,
    /// Bound on each write's confirmation wait.
    pub confirmation_timeout: Duration,
    pub wallet_link_command: String,
    pub min_participants: u64,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            lottery_address: None,
            token_address: ChainAddress::from_canonical(RLUSD_TOKEN_ADDRESS),
            token_symbol: "RLUSD".to_string(),
            token_decimals: 18,
            confirmation_timeout: Duration::from_secs(60),
            wallet_link_command: "/connect-wallet".to_string(),
            min_participants: 1,
        }
    }
}

impl LotteryConfig {
    pub fn with_lottery_address(mut self, address: ChainAddress) -> Self {
        self.lottery_address = Some(address);
        self
    }

    /// Reject settings that would make token amounts unrepresentable.
    pub fn validate(&self) -> Result<(), LotteryError> {
        if self.token_decimals > MAX_TOKEN_DECIMALS {
            return Err(LotteryError::Configuration(format!(
                "token_decimals must be at most {MAX_TOKEN_DECIMALS}, got {}",
                self.token_decimals
            )));
        }
        Ok(())
    }

    pub fn require_lottery_address(&self) -> Result<&ChainAddress, LotteryError> {
        self.lottery_address.as_ref().ok_or_else(|| {
            LotteryError::Configuration(
                "LOTTERY_ADDRESS is not defined in the environment variables.".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_rlusd() {
        let config = LotteryConfig::default();
        assert_eq!(config.token_address.as_str(), RLUSD_TOKEN_ADDRESS);
        assert_eq!(config.token_symbol, "RLUSD");
        assert_eq!(config.confirmation_timeout, Duration::from_secs(60));
        assert_eq!(config.min_participants, 1);
    }

    #[test]
    fn missing_lottery_address_is_a_configuration_error() {
        let err = LotteryConfig::default()
            .require_lottery_address()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "LOTTERY_ADDRESS is not defined in the environment variables."
        );
    }

    #[test]
    fn oversized_token_precision_is_rejected() {
        let mut config = LotteryConfig::default();
        assert!(config.validate().is_ok());
        config.token_decimals = MAX_TOKEN_DECIMALS;
        assert!(config.validate().is_ok());
        config.token_decimals = MAX_TOKEN_DECIMALS + 1;
        assert!(matches!(config.validate(), Err(LotteryError::Configuration(_))));
    }
}
