//! Integer-only share accounting: rebase-decoupled share conversion, linear
//! unlock evaluation, and the early-withdrawal bonus factor.
//!
//! All reward math follows the discipline of spec §9: rational arithmetic of
//! the form `numerator * factor / denominator` with multiplication always
//! performed before division, using a 256-bit intermediate so that
//! `shares * balance` (both of which can independently approach `u128::MAX`
//! in pathological but valid states) never wraps before the division that
//! brings it back down to a `u64`/`u128` result.

use crate::error::GeyserError;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for overflow-safe intermediate products.
    pub struct U256(4);
}

impl U256 {
    pub const fn from_u128(val: u128) -> Self {
        U256([val as u64, (val >> 64) as u64, 0, 0])
    }

    pub fn to_u128(&self) -> Option<u128> {
        if self.0[2] != 0 || self.0[3] != 0 {
            return None;
        }
        Some((self.0[1] as u128) << 64 | self.0[0] as u128)
    }
}

/// `a * b / denom`, computed without overflowing the 128-bit inputs.
pub fn mul_div_u128(a: u128, b: u128, denom: u128) -> Result<u128, GeyserError> {
    if denom == 0 {
        return Err(GeyserError::MathOverflow);
    }
    let product = U256::from_u128(a)
        .checked_mul(U256::from_u128(b))
        .ok_or(GeyserError::MathOverflow)?;
    let result = product / U256::from_u128(denom);
    result.to_u128().ok_or(GeyserError::MathOverflow)
}

/// `shares_per_token(now) = total_shares / pool_balance` (or
/// `initial_shares_per_token` while the pool is empty), applied to `amount`.
///
/// Spec §4.1: `mint_shares(amount) = amount × shares_per_token(now)`, computed
/// *before* the deposit transfer lands in `pool_balance`.
pub fn mint_shares(
    amount: u64,
    total_shares: u128,
    pool_balance: u64,
    initial_shares_per_token: u64,
) -> Result<u128, GeyserError> {
    if total_shares == 0 {
        return (amount as u128)
            .checked_mul(initial_shares_per_token as u128)
            .ok_or(GeyserError::MathOverflow);
    }
    if pool_balance == 0 {
        // total_shares > 0 but the pool reports no tokens: every existing
        // staker's value has rounded to zero, so any new deposit is
        // infinitely dilutive. Reject rather than divide by zero.
        return Err(GeyserError::MathOverflow);
    }
    mul_div_u128(total_shares, amount as u128, pool_balance as u128)
}

/// `burn_value(shares) = shares × pool_balance / total_shares`.
///
/// Spec §4.1: computed *before* the outgoing transfer reduces `pool_balance`.
pub fn burn_value(shares: u128, total_shares: u128, pool_balance: u64) -> Result<u64, GeyserError> {
    if total_shares == 0 {
        return Ok(0);
    }
    let value = mul_div_u128(shares, pool_balance as u128, total_shares)?;
    u64::try_from(value).map_err(|_| GeyserError::MathOverflow)
}

/// Result of evaluating one schedule's linear release for an elapsed tick.
pub struct UnlockTick {
    /// Shares moved from locked to unlocked this tick.
    pub delta: u128,
    /// New `last_unlock_ts`, capped at `end_ts`.
    pub new_last_unlock_ts: i64,
}

/// Spec §4.3: linear unlock with dust-free remainder flush at `end_ts`.
///
/// `now` must be `>= last_unlock_ts` (callers only ever move time forward).
/// Past `end_ts` the entire locked remainder is released in one shot —
/// integer division truncates, so summing per-tick linear increments would
/// otherwise leave the schedule permanently short of `initial_locked_shares`.
pub fn evaluate_linear_unlock(
    initial_locked_shares: u128,
    already_unlocked_shares: u128,
    last_unlock_ts: i64,
    end_ts: i64,
    duration_seconds: u64,
    now: i64,
) -> Result<UnlockTick, GeyserError> {
    if now >= end_ts {
        let delta = initial_locked_shares.saturating_sub(already_unlocked_shares);
        return Ok(UnlockTick {
            delta,
            new_last_unlock_ts: end_ts,
        });
    }

    if now <= last_unlock_ts || duration_seconds == 0 {
        return Ok(UnlockTick {
            delta: 0,
            new_last_unlock_ts: now,
        });
    }

    let elapsed = (now - last_unlock_ts) as u128;
    let delta = mul_div_u128(initial_locked_shares, elapsed, duration_seconds as u128)?;
    Ok(UnlockTick {
        delta,
        new_last_unlock_ts: now,
    })
}

/// Spec §4.5/§9: the early-withdrawal bonus factor as a rational
/// `numerator / denominator`, never converted to floating point.
///
/// `bonus_factor(Δ) = start_bonus/100 + (1 − start_bonus/100) × min(Δ, period)/period`
///
/// Expressed over a common denominator of `100 × period`:
/// `numerator = start_bonus × period + (100 − start_bonus) × min(Δ, period)`
pub fn bonus_factor_ratio(
    elapsed_seconds: i64,
    start_bonus_permille: u8,
    bonus_period_seconds: u64,
) -> (u128, u128) {
    let period = bonus_period_seconds as u128;
    let start_bonus = start_bonus_permille as u128;
    let capped_elapsed = (elapsed_seconds.max(0) as u128).min(period);
    let numerator = start_bonus * period + (100 - start_bonus) * capped_elapsed;
    let denominator = 100 * period;
    (numerator, denominator)
}

/// Apply the bonus factor to an unbonused reward amount: `value * num / den`.
pub fn apply_bonus(value: u128, numerator: u128, denominator: u128) -> Result<u128, GeyserError> {
    mul_div_u128(value, numerator, denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_shares_empty_pool_uses_initial_multiplier() {
        let shares = mint_shares(100 * 10u64.pow(9), 0, 0, 1_000_000).unwrap();
        assert_eq!(shares, 100u128 * 10u128.pow(9) * 1_000_000);
    }

    #[test]
    fn mint_and_burn_round_trip_is_value_preserving() {
        // pool has 1000 tokens backing 1000 * 1e6 shares (1:1e6 ratio)
        let total_shares = 1000u128 * 1_000_000;
        let pool_balance = 1000u64;
        let minted = mint_shares(100, total_shares, pool_balance, 1_000_000).unwrap();
        let value = burn_value(minted, total_shares + minted, pool_balance + 100).unwrap();
        assert_eq!(value, 100);
    }

    #[test]
    fn rebase_doubles_value_without_changing_shares() {
        // 50 staked at 1e6 shares/token -> 50e6 shares, pool balance 50
        let total_shares = 50_000_000u128;
        let minted_before = total_shares;
        // rebase doubles the pool's reported balance to 100
        let value_after_rebase = burn_value(minted_before, total_shares, 100).unwrap();
        assert_eq!(value_after_rebase, 100);
    }

    #[test]
    fn linear_unlock_is_dust_free_over_two_ticks() {
        // lock 1 token's worth of shares for 10 years, tick at T-60s then T+65s
        let initial = 1_000_000_000u128; // 1.0 token at 1e9 shares/token-equivalent
        let duration = 10 * 365 * 24 * 3600u64;
        let end_ts = duration as i64;

        let tick1 = evaluate_linear_unlock(initial, 0, 0, end_ts, duration, end_ts - 60).unwrap();
        let tick2 = evaluate_linear_unlock(
            initial,
            tick1.delta,
            tick1.new_last_unlock_ts,
            end_ts,
            duration,
            end_ts + 65,
        )
        .unwrap();

        assert_eq!(tick1.delta + tick2.delta, initial);
    }

    #[test]
    fn linear_unlock_never_exceeds_initial_locked() {
        let initial = 100u128;
        let duration = 1000u64;
        let end_ts = 1000i64;
        let mut unlocked = 0u128;
        let mut last = 0i64;
        let mut t = 0i64;
        while t < end_ts + 100 {
            t += 37;
            let tick =
                evaluate_linear_unlock(initial, unlocked, last, end_ts, duration, t).unwrap();
            unlocked += tick.delta;
            last = tick.new_last_unlock_ts;
            assert!(unlocked <= initial);
        }
        assert_eq!(unlocked, initial);
    }

    #[test]
    fn bonus_factor_is_floor_at_stake_time_and_one_at_period_end() {
        let (num, den) = bonus_factor_ratio(0, 50, 86400);
        assert_eq!(num * 2, den); // 0.5 exactly

        let (num, den) = bonus_factor_ratio(86400, 50, 86400);
        assert_eq!(num, den); // 1.0 exactly

        let (num, den) = bonus_factor_ratio(12 * 3600, 50, 86400);
        // 0.5 + 0.5 * 0.5 = 0.75
        assert_eq!(num * 4, den * 3);
    }

    #[test]
    fn bonus_factor_caps_past_the_period() {
        let (num_at_period, den) = bonus_factor_ratio(86400, 50, 86400);
        let (num_past_period, _) = bonus_factor_ratio(86400 * 10, 50, 86400);
        assert_eq!(num_at_period, num_past_period);
        assert_eq!(num_at_period, den);
    }
}
