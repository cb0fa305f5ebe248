//! Asset withdrawal planner
//!
//! Funds may sit partly in the exchange (credited to the Safe) and partly in
//! the Safe's own token balance. A withdrawal therefore takes up to two hops:
//! exchange → Safe for whatever the exchange holds (capped at the requested
//! amount), then Safe → destination for the full requested amount.

use std::sync::Arc;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::safe::chain::SafeChain;
use crate::safe::types::TokenInfo;

use super::intent::Intent;

/// Fractional digits kept from a human-entered amount
const AMOUNT_SCALE_DIGITS: usize = 3;
const AMOUNT_SCALE: u64 = 1_000;

/// Convert a human-entered decimal amount into token base units
///
/// The amount is floored to three fractional digits, then scaled by
/// `10^decimals`: `floor(amount * 1000) * 10^decimals / 1000`, all in
/// integer arithmetic.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    let invalid =
        || Error::Validation(format!("amount should be a positive number, got {:?}", amount));

    let (integer, fraction) = match amount.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (amount, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (integer.is_empty() && fraction.is_empty())
        || !all_digits(integer)
        || !all_digits(fraction)
    {
        return Err(invalid());
    }

    let integer = if integer.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(integer, 10).map_err(|_| invalid())?
    };

    let mut millis_digits: String = fraction.chars().take(AMOUNT_SCALE_DIGITS).collect();
    while millis_digits.len() < AMOUNT_SCALE_DIGITS {
        millis_digits.push('0');
    }
    let millis = U256::from_str_radix(&millis_digits, 10).map_err(|_| invalid())?;

    let scaled = integer
        .checked_mul(U256::from(AMOUNT_SCALE))
        .and_then(|v| v.checked_add(millis))
        .ok_or_else(invalid)?;
    let unit = U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| Error::Validation(format!("unsupported token decimals {}", decimals)))?;
    let base_units = scaled
        .checked_mul(unit)
        .ok_or_else(invalid)?
        / U256::from(AMOUNT_SCALE);

    if base_units.is_zero() {
        return Err(invalid());
    }

    Ok(base_units)
}

/// Render base units with the token's decimals for display
pub fn display_amount(amount: U256, token: &TokenInfo) -> String {
    match format_units(amount, token.decimals) {
        Ok(formatted) => format!("{} {}", formatted, token.symbol),
        Err(_) => format!("{} base units of {}", amount, token.symbol),
    }
}

/// A withdrawal as entered by the operator
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub token: Address,
    pub amount: String,
    pub destination: Address,
}

/// Balances read for a withdrawal and the resulting intents
#[derive(Debug, Clone)]
pub struct WithdrawalPlan {
    pub token: TokenInfo,
    pub requested: U256,
    pub custody_balance: U256,
    pub wallet_balance: U256,
    pub intents: Vec<Intent>,
}

/// Plans withdrawals out of one Safe
pub struct WithdrawalPlanner {
    chain: Arc<dyn SafeChain>,
    safe: Address,
    custody: Address,
}

impl WithdrawalPlanner {
    pub fn new(chain: Arc<dyn SafeChain>, safe: Address, custody: Address) -> Self {
        Self {
            chain,
            safe,
            custody,
        }
    }

    /// Read balances and produce the withdrawal intents
    pub async fn plan(&self, request: &WithdrawalRequest) -> Result<WithdrawalPlan> {
        let token = self.chain.token_info(request.token).await?;
        let requested = parse_token_amount(&request.amount, token.decimals)?;

        let custody_balance = self
            .chain
            .custody_balance(self.custody, self.safe, request.token)
            .await?;
        let wallet_balance = self.chain.balance_of(request.token, self.safe).await?;

        info!(
            "Withdrawal of {}: exchange holds {}, Safe holds {}",
            display_amount(requested, &token),
            display_amount(custody_balance, &token),
            display_amount(wallet_balance, &token)
        );

        let available = custody_balance.saturating_add(wallet_balance);
        if available < requested {
            warn!(
                "Not enough {} in exchange and Safe: {} available",
                token.symbol,
                display_amount(available, &token)
            );
            return Err(Error::InsufficientFunds {
                available,
                required: requested,
                symbol: token.symbol,
            });
        }

        let mut intents = Vec::with_capacity(2);
        if !custody_balance.is_zero() {
            intents.push(Intent::WithdrawAsset {
                token: request.token,
                amount: custody_balance.min(requested),
            });
        }
        intents.push(Intent::TransferAsset {
            token: request.token,
            amount: requested,
            destination: request.destination,
        });

        Ok(WithdrawalPlan {
            token,
            requested,
            custody_balance,
            wallet_balance,
            intents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::mock::MockChain;
    use alloy::primitives::address;

    const SAFE: Address = address!("0x5afe000000000000000000000000000000000000");
    const CUSTODY: Address = address!("0xdc00000000000000000000000000000000000000");
    const TOKEN: Address = address!("0x7070000000000000000000000000000000000000");
    const DEST: Address = address!("0xde57000000000000000000000000000000000000");

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    fn chain(custody: U256, wallet: U256) -> Arc<MockChain> {
        Arc::new(MockChain::with_state(|s| {
            s.token_info.insert(
                TOKEN,
                TokenInfo {
                    address: TOKEN,
                    symbol: "WETH".to_string(),
                    decimals: 18,
                },
            );
            s.custody.insert((SAFE, TOKEN), custody);
            s.balances.insert((TOKEN, SAFE), wallet);
        }))
    }

    fn request(amount: &str) -> WithdrawalRequest {
        WithdrawalRequest {
            token: TOKEN,
            amount: amount.to_string(),
            destination: DEST,
        }
    }

    #[test]
    fn test_parse_amount_fixed_point() {
        let expected =
            U256::from(10_500u64) * U256::from(10u64).pow(U256::from(18)) / U256::from(1_000u64);
        assert_eq!(parse_token_amount("10.5", 18).unwrap(), expected);
        assert_eq!(parse_token_amount("1", 6).unwrap(), U256::from(1_000_000u64));
        assert_eq!(parse_token_amount("0.001", 6).unwrap(), U256::from(1_000u64));
        assert_eq!(parse_token_amount(".25", 2).unwrap(), U256::from(25u64));
    }

    #[test]
    fn test_parse_amount_floors_beyond_three_digits() {
        assert_eq!(parse_token_amount("1.23456", 6).unwrap(), U256::from(1_234_000u64));
        // precision below the token's own decimals floors away
        assert_eq!(parse_token_amount("1.5", 0).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for bad in ["", ".", "abc", "-1", "1.2.3", "1e18", "0", "0.0004"] {
            assert!(
                matches!(parse_token_amount(bad, 18), Err(Error::Validation(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_wallet_only_withdrawal_has_single_transfer() {
        let planner = WithdrawalPlanner::new(chain(U256::ZERO, ether(20)), SAFE, CUSTODY);
        let plan = planner.plan(&request("10.5")).await.unwrap();

        let expected =
            U256::from(10_500u64) * U256::from(10u64).pow(U256::from(18)) / U256::from(1_000u64);
        assert_eq!(
            plan.intents,
            vec![Intent::TransferAsset {
                token: TOKEN,
                amount: expected,
                destination: DEST,
            }]
        );
    }

    #[tokio::test]
    async fn test_split_custody_takes_two_hops() {
        let planner = WithdrawalPlanner::new(chain(ether(3), ether(5)), SAFE, CUSTODY);
        let plan = planner.plan(&request("6")).await.unwrap();

        assert_eq!(
            plan.intents,
            vec![
                Intent::WithdrawAsset {
                    token: TOKEN,
                    amount: ether(3),
                },
                Intent::TransferAsset {
                    token: TOKEN,
                    amount: ether(6),
                    destination: DEST,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_custody_withdraw_capped_at_request() {
        let planner = WithdrawalPlanner::new(chain(ether(100), U256::ZERO), SAFE, CUSTODY);
        let plan = planner.plan(&request("2")).await.unwrap();
        assert_eq!(
            plan.intents[0],
            Intent::WithdrawAsset {
                token: TOKEN,
                amount: ether(2),
            }
        );
    }

    #[tokio::test]
    async fn test_shortfall_emits_nothing() {
        let planner = WithdrawalPlanner::new(chain(U256::ZERO, U256::ZERO), SAFE, CUSTODY);
        let result = planner.plan(&request("1")).await;

        match result {
            Err(err @ Error::InsufficientFunds { .. }) => {
                assert!(err.is_insufficient_authority());
            }
            other => panic!("expected InsufficientFunds, got {:?}", other.map(|p| p.intents)),
        }
    }
}
