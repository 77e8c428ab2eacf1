//! Unstake instruction and reward computation (spec §4.5)

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    pubkey::Pubkey,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    events::{emit_tokens_claimed, emit_unstaked},
    instructions::accounting::{emit_unlock_event, refresh},
    math::{apply_bonus, bonus_factor_ratio, burn_value, mint_shares, mul_div_u128},
    state::{now_timestamp, GeyserPool, UserStake},
};

/// Result of running the LIFO withdrawal algorithm of spec §4.5 against a
/// (possibly cloned) user/pool pair. Shared by the mutating `unstake`
/// instruction and the read-only `unstake_query`.
struct UnstakeOutcome {
    shares_to_burn: u128,
    reward_shares: u128,
}

/// Traverse `user.stakes` newest-first, consuming `shares_to_burn` total
/// staking shares, crediting each consumed slice's time-weighted reward
/// at the bonus factor implied by that slice's age. Mutates `user.stakes`,
/// `user.staking_shares`, `user.staking_share_seconds` and
/// `pool.total_staking_share_seconds` in place; does not touch
/// `total_staking_shares`/`total_unlocked_shares` (left to the caller, so
/// `unstake_query` can run this against a scratch copy without resizing
/// the real accounts).
fn run_lifo_withdrawal(
    pool: &GeyserPool,
    user: &mut UserStake,
    shares_to_burn: u128,
    total_staking_share_seconds: &mut u128,
    now: i64,
) -> Result<UnstakeOutcome, GeyserError> {
    let mut remaining = shares_to_burn;
    let mut reward_shares: u128 = 0;

    while remaining > 0 {
        let stake = user.stakes.last_mut().ok_or(GeyserError::UnstakeExceedsBalance)?;

        let sliced_shares = remaining.min(stake.shares);
        let stake_time_sec = (now - stake.timestamp).max(0) as u128;
        let sliced_share_seconds = sliced_shares
            .checked_mul(stake_time_sec)
            .ok_or(GeyserError::MathOverflow)?;

        // Price this slice against the pre-slice global denominator (spec
        // §4.5 step 3) so one large unstake matches many small ones.
        let raw_reward_shares = if *total_staking_share_seconds > 0 {
            mul_div_u128(
                pool.total_unlocked_shares,
                sliced_share_seconds,
                *total_staking_share_seconds,
            )?
        } else {
            0
        };

        user.staking_share_seconds = user
            .staking_share_seconds
            .checked_sub(sliced_share_seconds)
            .ok_or(GeyserError::MathUnderflow)?;
        *total_staking_share_seconds = total_staking_share_seconds
            .checked_sub(sliced_share_seconds)
            .ok_or(GeyserError::MathUnderflow)?;

        let (num, den) = bonus_factor_ratio(
            stake_time_sec as i64,
            pool.start_bonus_permille,
            pool.bonus_period_seconds,
        );
        let bonused_shares = apply_bonus(raw_reward_shares, num, den)?;
        reward_shares = reward_shares
            .checked_add(bonused_shares)
            .ok_or(GeyserError::MathOverflow)?;
        // The unbonused remainder is forfeited back to total_unlocked_shares
        // rather than burned (spec §9 open question, resolved per its stated
        // test convention).

        stake.shares -= sliced_shares;
        remaining -= sliced_shares;
        if stake.shares == 0 {
            user.stakes.pop();
        }
    }

    user.staking_shares = user
        .staking_shares
        .checked_sub(shares_to_burn)
        .ok_or(GeyserError::MathUnderflow)?;

    Ok(UnstakeOutcome {
        shares_to_burn,
        reward_shares,
    })
}

/// Accounts:
/// 0. `[writable]` Pool account
/// 1. `[writable]` Caller's user-stake account
/// 2. `[writable]` Staking vault
/// 3. `[writable]` Caller's staking-asset token account
/// 4. `[]` Staking mint
/// 5. `[writable]` Distribution vault
/// 6. `[writable]` Caller's distribution-asset token account
/// 7. `[]` Distribution mint
/// 8. `[writable, signer]` Caller
/// 9. `[]` Token 2022 program
pub fn process_unstake(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    amount: u64,
    data: &[u8],
) -> ProgramResult {
    if amount == 0 {
        return Err(GeyserError::ZeroAmount.into());
    }

    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let user_stake_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;
    let caller_staking_token_info = next_account_info(iter)?;
    let staking_mint_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;
    let caller_distribution_token_info = next_account_info(iter)?;
    let distribution_mint_info = next_account_info(iter)?;
    let caller_info = next_account_info(iter)?;
    let token_program_info = next_account_info(iter)?;

    if !caller_info.is_signer {
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
    if pool.staking_mint != *staking_mint_info.key || pool.staking_vault != *staking_vault_info.key
    {
        return Err(GeyserError::InvalidStakingVault.into());
    }
    if pool.distribution_mint != *distribution_mint_info.key
        || pool.distribution_vault != *distribution_vault_info.key
    {
        return Err(GeyserError::InvalidDistributionVault.into());
    }

    if user_stake_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut user = UserStake::try_from_slice(&user_stake_info.try_borrow_data()?)?;
    if !user.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }
    if user.owner != *caller_info.key {
        return Err(GeyserError::InvalidOwner.into());
    }
    if user.pool != *pool_info.key {
        return Err(GeyserError::InvalidPool.into());
    }

    let now = now_timestamp()?;
    let unlocked_this_tick = refresh(&mut pool, Some(&mut user), now)?;

    let staking_vault_balance = {
        let data = staking_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };

    let caller_staked_value =
        burn_value(user.staking_shares, pool.total_staking_shares, staking_vault_balance)?;
    if amount > caller_staked_value {
        return Err(GeyserError::UnstakeExceedsBalance.into());
    }

    let shares_to_burn = mint_shares(
        amount,
        pool.total_staking_shares,
        staking_vault_balance,
        pool.initial_shares_per_token,
    )?;
    if shares_to_burn == 0 {
        return Err(GeyserError::UnstakeTooSmall.into());
    }

    let distribution_shares_before = pool.total_locked_shares + pool.total_unlocked_shares;
    let distribution_vault_balance = {
        let data = distribution_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    emit_unlock_event(&pool, distribution_vault_balance, unlocked_this_tick)?;

    let mut total_staking_share_seconds = pool.total_staking_share_seconds;
    let outcome = run_lifo_withdrawal(
        &pool,
        &mut user,
        shares_to_burn,
        &mut total_staking_share_seconds,
        now,
    )?;
    pool.total_staking_share_seconds = total_staking_share_seconds;

    pool.total_staking_shares = pool
        .total_staking_shares
        .checked_sub(outcome.shares_to_burn)
        .ok_or(GeyserError::MathUnderflow)?;
    pool.total_unlocked_shares = pool
        .total_unlocked_shares
        .checked_sub(outcome.reward_shares)
        .ok_or(GeyserError::MathUnderflow)?;

    let reward_amount = burn_value(
        outcome.reward_shares,
        distribution_shares_before,
        distribution_vault_balance,
    )?;

    {
        let mut pool_data = pool_info.try_borrow_mut_data()?;
        pool.serialize(&mut &mut pool_data[..])?;
    }
    // Unstake only ever shrinks the stake journal, so no rent top-up is
    // possible here; shrink in place rather than going through
    // `realloc_and_save` (which assumes growth and wants a system program
    // account this instruction has no reason to require).
    let needed_len = UserStake::space_for(user.stakes.len());
    if user_stake_info.data_len() > needed_len {
        user_stake_info.realloc(needed_len, false)?;
    }
    {
        let mut data = user_stake_info.try_borrow_mut_data()?;
        user.serialize(&mut &mut data[..])?;
    }

    let staking_mint_data = staking_mint_info.try_borrow_data()?;
    let staking_decimals =
        StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&staking_mint_data)?
            .base
            .decimals;
    drop(staking_mint_data);

    let pool_seeds = &[
        crate::state::POOL_SEED,
        pool.staking_mint.as_ref(),
        pool.distribution_mint.as_ref(),
        &[pool.bump],
    ];

    invoke_signed(
        &spl_token_2022::instruction::transfer_checked(
            &spl_token_2022::id(),
            staking_vault_info.key,
            staking_mint_info.key,
            caller_staking_token_info.key,
            pool_info.key,
            &[],
            amount,
            staking_decimals,
        )?,
        &[
            staking_vault_info.clone(),
            staking_mint_info.clone(),
            caller_staking_token_info.clone(),
            pool_info.clone(),
        ],
        &[pool_seeds],
    )?;

    if reward_amount > 0 {
        let distribution_mint_data = distribution_mint_info.try_borrow_data()?;
        let distribution_decimals =
            StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&distribution_mint_data)?
                .base
                .decimals;
        drop(distribution_mint_data);

        invoke_signed(
            &spl_token_2022::instruction::transfer_checked(
                &spl_token_2022::id(),
                distribution_vault_info.key,
                distribution_mint_info.key,
                caller_distribution_token_info.key,
                pool_info.key,
                &[],
                reward_amount,
                distribution_decimals,
            )?,
            &[
                distribution_vault_info.clone(),
                distribution_mint_info.clone(),
                caller_distribution_token_info.clone(),
                pool_info.clone(),
            ],
            &[pool_seeds],
        )?;
    }

    let post_transfer_staking_balance = staking_vault_balance
        .checked_sub(amount)
        .ok_or(GeyserError::MathUnderflow)?;
    let total_staked_for_caller = burn_value(
        user.staking_shares,
        pool.total_staking_shares,
        post_transfer_staking_balance,
    )?;

    emit_unstaked(&user.owner, amount, total_staked_for_caller, data);
    if reward_amount > 0 {
        emit_tokens_claimed(&user.owner, reward_amount);
    }

    msg!("Unstaked {} (reward {})", amount, reward_amount);

    Ok(())
}

/// Read-only variant of `process_unstake`: runs the same computation
/// against in-memory clones of the pool and user state and reports the
/// reward via `set_return_data`, without persisting or transferring
/// anything (spec §4.5, "A `unstake_query(amount)` variant...").
///
/// Accounts: identical prefix to `process_unstake`'s accounts 0–2 and the
/// user's staking token account is not required since nothing moves.
/// 0. `[]` Pool account
/// 1. `[]` Caller's user-stake account
/// 2. `[]` Staking vault
/// 3. `[]` Distribution vault
pub fn process_unstake_query(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    caller: Pubkey,
    amount: u64,
) -> ProgramResult {
    if amount == 0 {
        return Err(GeyserError::ZeroAmount.into());
    }

    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let user_stake_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;

    if pool_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut pool = GeyserPool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }

    if user_stake_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut user = UserStake::try_from_slice(&user_stake_info.try_borrow_data()?)?;
    if user.owner != caller || user.pool != *pool_info.key {
        return Err(GeyserError::InvalidOwner.into());
    }

    let now = now_timestamp()?;
    refresh(&mut pool, Some(&mut user), now)?;

    let staking_vault_balance = {
        let data = staking_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    let caller_staked_value =
        burn_value(user.staking_shares, pool.total_staking_shares, staking_vault_balance)?;
    if amount > caller_staked_value {
        return Err(GeyserError::UnstakeExceedsBalance.into());
    }

    let shares_to_burn = mint_shares(
        amount,
        pool.total_staking_shares,
        staking_vault_balance,
        pool.initial_shares_per_token,
    )?;
    if shares_to_burn == 0 {
        return Err(GeyserError::UnstakeTooSmall.into());
    }

    let distribution_shares_before = pool.total_locked_shares + pool.total_unlocked_shares;
    let distribution_vault_balance = {
        let data = distribution_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };

    let mut total_staking_share_seconds = pool.total_staking_share_seconds;
    let outcome = run_lifo_withdrawal(
        &pool,
        &mut user,
        shares_to_burn,
        &mut total_staking_share_seconds,
        now,
    )?;

    let reward_amount = burn_value(
        outcome.reward_shares,
        distribution_shares_before,
        distribution_vault_balance,
    )?;

    solana_program::program::set_return_data(&reward_amount.to_le_bytes());
    Ok(())
}
