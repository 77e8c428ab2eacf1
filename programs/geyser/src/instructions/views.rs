//! Read-only introspection instructions (spec §6). None of these call
//! `refresh()`: they are pure functions of currently persisted state and
//! live vault balances, safe to invoke without mutating anything.

use borsh::BorshDeserialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    program::set_return_data,
    pubkey::Pubkey,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    math::burn_value,
    state::{GeyserPool, UserStake},
};

fn load_pool(program_id: &Pubkey, pool_info: &AccountInfo) -> Result<GeyserPool, solana_program::program_error::ProgramError> {
    if pool_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let pool = GeyserPool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }
    Ok(pool)
}

fn vault_balance(vault_info: &AccountInfo) -> Result<u64, solana_program::program_error::ProgramError> {
    let data = vault_info.try_borrow_data()?;
    Ok(StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?.base.amount)
}

/// Accounts: 0. `[]` Pool; 1. `[]` Staking vault
pub fn process_total_staked(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;

    let pool = load_pool(program_id, pool_info)?;
    if pool.staking_vault != *staking_vault_info.key {
        return Err(GeyserError::InvalidStakingVault.into());
    }

    let balance = vault_balance(staking_vault_info)?;
    set_return_data(&balance.to_le_bytes());
    Ok(())
}

/// Accounts: 0. `[]` Pool; 1. `[]` Staking vault; 2. `[]` User-stake account
pub fn process_total_staked_for(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;
    let user_stake_info = next_account_info(iter)?;

    let pool = load_pool(program_id, pool_info)?;
    if pool.staking_vault != *staking_vault_info.key {
        return Err(GeyserError::InvalidStakingVault.into());
    }

    let value = if user_stake_info.data_is_empty() {
        0u64
    } else {
        if user_stake_info.owner != program_id {
            return Err(GeyserError::InvalidAccountOwner.into());
        }
        let user = UserStake::try_from_slice(&user_stake_info.try_borrow_data()?)?;
        if user.pool != *pool_info.key {
            return Err(GeyserError::InvalidPool.into());
        }
        let balance = vault_balance(staking_vault_info)?;
        burn_value(user.staking_shares, pool.total_staking_shares, balance)?
    };

    set_return_data(&value.to_le_bytes());
    Ok(())
}

/// Accounts: 0. `[]` Pool; 1. `[]` Distribution vault
pub fn process_total_locked(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;

    let pool = load_pool(program_id, pool_info)?;
    if pool.distribution_vault != *distribution_vault_info.key {
        return Err(GeyserError::InvalidDistributionVault.into());
    }

    let balance = vault_balance(distribution_vault_info)?;
    let total_distribution_shares = pool.total_locked_shares + pool.total_unlocked_shares;
    let value = burn_value(pool.total_locked_shares, total_distribution_shares, balance)?;
    set_return_data(&value.to_le_bytes());
    Ok(())
}

/// Accounts: 0. `[]` Pool; 1. `[]` Distribution vault
pub fn process_total_unlocked(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;

    let pool = load_pool(program_id, pool_info)?;
    if pool.distribution_vault != *distribution_vault_info.key {
        return Err(GeyserError::InvalidDistributionVault.into());
    }

    let balance = vault_balance(distribution_vault_info)?;
    let total_distribution_shares = pool.total_locked_shares + pool.total_unlocked_shares;
    let value = burn_value(pool.total_unlocked_shares, total_distribution_shares, balance)?;
    set_return_data(&value.to_le_bytes());
    Ok(())
}

/// Accounts: 0. `[]` Pool
pub fn process_unlock_schedule_count(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let pool = load_pool(program_id, pool_info)?;
    set_return_data(&[pool.schedule_count]);
    Ok(())
}

/// Accounts: 0. `[]` Pool
pub fn process_unlock_schedule_at(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    index: u8,
) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let pool = load_pool(program_id, pool_info)?;

    let schedule = pool
        .schedules()
        .get(index as usize)
        .ok_or(GeyserError::ScheduleIndexOutOfRange)?;

    let mut payload = Vec::with_capacity(16 + 16 + 8 + 8 + 8);
    payload.extend_from_slice(&schedule.initial_locked_shares.to_le_bytes());
    payload.extend_from_slice(&schedule.unlocked_shares.to_le_bytes());
    payload.extend_from_slice(&schedule.last_unlock_ts.to_le_bytes());
    payload.extend_from_slice(&schedule.end_ts.to_le_bytes());
    payload.extend_from_slice(&schedule.duration_seconds.to_le_bytes());
    set_return_data(&payload);
    Ok(())
}
