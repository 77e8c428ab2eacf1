//! Shared `refresh()` accounting step (spec §4.2) and the `update_accounting`
//! read/refresh instruction (spec §6).

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::set_return_data,
    pubkey::Pubkey,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    events::emit_tokens_unlocked,
    math::{burn_value, evaluate_linear_unlock, mul_div_u128},
    state::{now_timestamp, GeyserPool, UserStake},
};

/// Spec §4.2 step 1: evaluate every schedule, moving vested shares from
/// locked to unlocked. Returns the total shares unlocked this tick.
pub fn refresh_schedules(pool: &mut GeyserPool, now: i64) -> Result<u128, GeyserError> {
    let mut unlocked_this_tick: u128 = 0;

    for schedule in pool.schedules_mut() {
        let tick = evaluate_linear_unlock(
            schedule.initial_locked_shares,
            schedule.unlocked_shares,
            schedule.last_unlock_ts,
            schedule.end_ts,
            schedule.duration_seconds,
            now,
        )?;
        if tick.delta == 0 && tick.new_last_unlock_ts == schedule.last_unlock_ts {
            continue;
        }
        schedule.unlocked_shares = schedule
            .unlocked_shares
            .checked_add(tick.delta)
            .ok_or(GeyserError::MathOverflow)?;
        schedule.last_unlock_ts = tick.new_last_unlock_ts;
        unlocked_this_tick = unlocked_this_tick
            .checked_add(tick.delta)
            .ok_or(GeyserError::MathOverflow)?;
    }

    if unlocked_this_tick > 0 {
        pool.total_locked_shares = pool
            .total_locked_shares
            .checked_sub(unlocked_this_tick)
            .ok_or(GeyserError::MathUnderflow)?;
        pool.total_unlocked_shares = pool
            .total_unlocked_shares
            .checked_add(unlocked_this_tick)
            .ok_or(GeyserError::MathOverflow)?;
    }

    Ok(unlocked_this_tick)
}

/// Spec §4.2 step 2: advance the global share-seconds accumulator.
pub fn refresh_global_share_seconds(pool: &mut GeyserPool, now: i64) -> Result<(), GeyserError> {
    let elapsed = now.saturating_sub(pool.last_accounting_ts).max(0) as u128;
    if elapsed > 0 {
        let delta = pool
            .total_staking_shares
            .checked_mul(elapsed)
            .ok_or(GeyserError::MathOverflow)?;
        pool.total_staking_share_seconds = pool
            .total_staking_share_seconds
            .checked_add(delta)
            .ok_or(GeyserError::MathOverflow)?;
    }
    pool.last_accounting_ts = now;
    Ok(())
}

/// Spec §4.2 step 3: advance one user's share-seconds accumulator.
pub fn refresh_user_share_seconds(user: &mut UserStake, now: i64) -> Result<(), GeyserError> {
    let elapsed = now.saturating_sub(user.last_accounting_ts_for_user).max(0) as u128;
    if elapsed > 0 {
        let delta = user
            .staking_shares
            .checked_mul(elapsed)
            .ok_or(GeyserError::MathOverflow)?;
        user.staking_share_seconds = user
            .staking_share_seconds
            .checked_add(delta)
            .ok_or(GeyserError::MathOverflow)?;
    }
    user.last_accounting_ts_for_user = now;
    Ok(())
}

/// Full `refresh()` per spec §4.2: schedules, then global share-seconds,
/// then (optionally) the caller's share-seconds. Returns shares unlocked
/// this tick so callers can emit `TokensUnlocked` once they know the
/// distribution vault's live balance.
pub fn refresh(
    pool: &mut GeyserPool,
    user: Option<&mut UserStake>,
    now: i64,
) -> Result<u128, GeyserError> {
    let unlocked_this_tick = refresh_schedules(pool, now)?;
    refresh_global_share_seconds(pool, now)?;
    if let Some(user) = user {
        refresh_user_share_seconds(user, now)?;
    }
    Ok(unlocked_this_tick)
}

/// Emit `TokensUnlocked` if `refresh()` moved any shares this tick (spec
/// §4.2: "`refresh` emits a `TokensUnlocked` event if any shares moved to
/// unlocked"). Every caller of `refresh` — not just `update_accounting` —
/// must route its result through this so vesting ticks are never silent.
pub fn emit_unlock_event(
    pool: &GeyserPool,
    distribution_vault_balance: u64,
    unlocked_this_tick: u128,
) -> Result<(), GeyserError> {
    if unlocked_this_tick == 0 {
        return Ok(());
    }
    let total_distribution_shares = pool.total_locked_shares + pool.total_unlocked_shares;
    let unlocked_amount = burn_value(
        unlocked_this_tick,
        total_distribution_shares,
        distribution_vault_balance,
    )?;
    let total_unlocked_amount = burn_value(
        pool.total_unlocked_shares,
        total_distribution_shares,
        distribution_vault_balance,
    )?;
    emit_tokens_unlocked(unlocked_amount, total_unlocked_amount);
    Ok(())
}

/// `update_accounting()`: refresh and report the tuple named in spec §6:
/// `(total_locked, total_unlocked, user_share_seconds, total_share_seconds,
/// reward_entitlement, now)`, delivered via `set_return_data` since
/// instructions have no other return channel. `user_share_seconds` and
/// `total_share_seconds` are share-seconds accumulators, not token amounts,
/// and routinely exceed `u64::MAX` for any real pool, so both are packed as
/// full 16-byte little-endian `u128`s; the remaining fields are `u64`.
///
/// Accounts:
/// 0. `[writable]` Pool account
/// 1. `[]` Distribution token vault (for token-amount conversions)
/// 2. `[writable]` Caller's user-stake account; if not yet initialized,
///    the caller's figures report as zero
pub fn process_update_accounting(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;
    let user_stake_info = next_account_info(iter)?;

    if pool_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut pool = GeyserPool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }
    if pool.distribution_vault != *distribution_vault_info.key {
        return Err(GeyserError::InvalidDistributionVault.into());
    }

    let now = now_timestamp()?;
    let user_existed = !user_stake_info.data_is_empty();

    let mut user = if user_existed {
        if user_stake_info.owner != program_id {
            return Err(GeyserError::InvalidAccountOwner.into());
        }
        let user = UserStake::try_from_slice(&user_stake_info.try_borrow_data()?)?;
        if user.pool != *pool_info.key {
            return Err(GeyserError::InvalidPool.into());
        }
        Some(user)
    } else {
        None
    };

    let unlocked_this_tick = refresh(&mut pool, user.as_mut(), now)?;

    let vault_balance = {
        let vault_data = distribution_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&vault_data)?
            .base
            .amount
    };

    let total_distribution_shares = pool.total_locked_shares + pool.total_unlocked_shares;
    let total_locked_amount =
        burn_value(pool.total_locked_shares, total_distribution_shares, vault_balance)?;
    let total_unlocked_amount =
        burn_value(pool.total_unlocked_shares, total_distribution_shares, vault_balance)?;

    emit_unlock_event(&pool, vault_balance, unlocked_this_tick)?;

    let (user_share_seconds, reward_entitlement) = match &user {
        Some(u) if pool.total_staking_share_seconds > 0 => {
            let entitlement_shares = mul_div_u128(
                pool.total_unlocked_shares,
                u.staking_share_seconds,
                pool.total_staking_share_seconds,
            )?;
            let entitlement_amount =
                burn_value(entitlement_shares, total_distribution_shares, vault_balance)?;
            (u.staking_share_seconds, entitlement_amount)
        }
        Some(u) => (u.staking_share_seconds, 0),
        None => (0, 0),
    };

    {
        let mut pool_data = pool_info.try_borrow_mut_data()?;
        pool.serialize(&mut &mut pool_data[..])?;
    }
    if let Some(user) = &user {
        if user_existed {
            let mut data = user_stake_info.try_borrow_mut_data()?;
            user.serialize(&mut &mut data[..])?;
        }
    }

    let mut payload = Vec::with_capacity(8 * 4 + 16 * 2);
    payload.extend_from_slice(&total_locked_amount.to_le_bytes());
    payload.extend_from_slice(&total_unlocked_amount.to_le_bytes());
    payload.extend_from_slice(&user_share_seconds.to_le_bytes());
    payload.extend_from_slice(&pool.total_staking_share_seconds.to_le_bytes());
    payload.extend_from_slice(&reward_entitlement.to_le_bytes());
    payload.extend_from_slice(&(now as u64).to_le_bytes());
    set_return_data(&payload);

    msg!("Accounting refreshed at {}", now);

    Ok(())
}
