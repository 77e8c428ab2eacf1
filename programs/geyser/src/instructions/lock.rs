//! Owner-only `lock_tokens` instruction: introduce a new linear unlock
//! schedule (spec §4.6).

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke,
    pubkey::Pubkey,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    events::emit_tokens_locked,
    instructions::accounting::{emit_unlock_event, refresh},
    math::{burn_value, mint_shares},
    state::{now_timestamp, GeyserPool, Schedule},
};

/// Accounts:
/// 0. `[writable]` Pool account
/// 1. `[writable]` Distribution vault
/// 2. `[writable]` Authority's distribution-asset token account
/// 3. `[]` Distribution mint
/// 4. `[signer]` Pool authority
/// 5. `[]` Token 2022 program
pub fn process_lock_tokens(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
    duration_seconds: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(GeyserError::ZeroAmount.into());
    }

    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;
    let authority_token_info = next_account_info(iter)?;
    let distribution_mint_info = next_account_info(iter)?;
    let authority_info = next_account_info(iter)?;
    let token_program_info = next_account_info(iter)?;

    if !authority_info.is_signer {
        return Err(GeyserError::MissingRequiredSigner.into());
    }
    if *token_program_info.key != spl_token_2022::id() {
        return Err(GeyserError::InvalidAccountOwner.into());
    }

    if pool_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut pool = GeyserPool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }
    if pool.authority != *authority_info.key {
        return Err(GeyserError::NotOwner.into());
    }
    if pool.distribution_mint != *distribution_mint_info.key
        || pool.distribution_vault != *distribution_vault_info.key
    {
        return Err(GeyserError::InvalidDistributionVault.into());
    }
    if pool.schedule_count as usize >= pool.max_unlock_schedules as usize {
        return Err(GeyserError::ScheduleLimit.into());
    }

    let now = now_timestamp()?;
    let unlocked_this_tick = refresh(&mut pool, None, now)?;

    let distribution_vault_balance = {
        let data = distribution_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    emit_unlock_event(&pool, distribution_vault_balance, unlocked_this_tick)?;

    let total_distribution_shares = pool.total_locked_shares + pool.total_unlocked_shares;
    let initial_locked_shares = mint_shares(
        amount,
        total_distribution_shares,
        distribution_vault_balance,
        pool.initial_shares_per_token,
    )?;
    if initial_locked_shares == 0 {
        return Err(GeyserError::ZeroAmount.into());
    }

    pool.push_schedule(Schedule {
        initial_locked_shares,
        unlocked_shares: 0,
        last_unlock_ts: now,
        end_ts: now
            .checked_add(duration_seconds as i64)
            .ok_or(GeyserError::MathOverflow)?,
        duration_seconds,
    })?;
    pool.total_locked_shares = pool
        .total_locked_shares
        .checked_add(initial_locked_shares)
        .ok_or(GeyserError::MathOverflow)?;

    {
        let mut pool_data = pool_info.try_borrow_mut_data()?;
        pool.serialize(&mut &mut pool_data[..])?;
    }

    let mint_data = distribution_mint_info.try_borrow_data()?;
    let decimals = StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&mint_data)?
        .base
        .decimals;
    drop(mint_data);

    invoke(
        &spl_token_2022::instruction::transfer_checked(
            &spl_token_2022::id(),
            authority_token_info.key,
            distribution_mint_info.key,
            distribution_vault_info.key,
            authority_info.key,
            &[],
            amount,
            decimals,
        )?,
        &[
            authority_token_info.clone(),
            distribution_mint_info.clone(),
            distribution_vault_info.clone(),
            authority_info.clone(),
        ],
    )?;

    let total_locked_amount = burn_value(
        pool.total_locked_shares,
        total_distribution_shares + initial_locked_shares,
        distribution_vault_balance.checked_add(amount).ok_or(GeyserError::MathOverflow)?,
    )?;
    emit_tokens_locked(amount, total_locked_amount, duration_seconds);

    msg!("Locked {} for {} seconds", amount, duration_seconds);

    Ok(())
}
