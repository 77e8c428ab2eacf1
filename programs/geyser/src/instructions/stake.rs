//! Stake instruction: `stake`/`stake_for` (spec §4.4)

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    events::emit_staked,
    instructions::accounting::{emit_unlock_event, refresh},
    math::mint_shares,
    state::{now_timestamp, GeyserPool, Stake, UserStake, USER_SEED},
};

/// Accounts:
/// 0. `[writable]` Pool account
/// 1. `[writable]` Beneficiary's user-stake account (PDA: `["geyser-user", pool, beneficiary]`)
/// 2. `[writable]` Staking vault
/// 3. `[writable]` Depositor's staking-asset token account
/// 4. `[]` Staking mint
/// 5. `[writable, signer]` Depositor/payer
/// 6. `[]` System program
/// 7. `[]` Token 2022 program
/// 8. `[]` Distribution token vault (for `TokensUnlocked` amount conversion
///    if this stake's `refresh()` vests a schedule)
///
/// `beneficiary` is the stake's owner; it equals the depositor for `stake`
/// and may differ for `stake_for`.
pub fn process_stake(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    beneficiary: Pubkey,
    amount: u64,
    data: &[u8],
) -> ProgramResult {
    if amount == 0 {
        return Err(GeyserError::ZeroAmount.into());
    }
    if beneficiary == Pubkey::default() {
        return Err(GeyserError::BeneficiaryIsNull.into());
    }

    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let user_stake_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;
    let depositor_token_info = next_account_info(iter)?;
    let staking_mint_info = next_account_info(iter)?;
    let depositor_info = next_account_info(iter)?;
    let system_program_info = next_account_info(iter)?;
    let token_program_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;

    if !depositor_info.is_signer {
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
    if pool.staking_mint != *staking_mint_info.key {
        return Err(GeyserError::InvalidStakingMint.into());
    }
    if pool.staking_vault != *staking_vault_info.key {
        return Err(GeyserError::InvalidStakingVault.into());
    }
    if pool.distribution_vault != *distribution_vault_info.key {
        return Err(GeyserError::InvalidDistributionVault.into());
    }

    let (expected_user_stake, user_bump) =
        UserStake::derive_pda(pool_info.key, &beneficiary, program_id);
    if *user_stake_info.key != expected_user_stake {
        return Err(GeyserError::InvalidPDA.into());
    }

    let now = now_timestamp()?;

    let is_new_user = user_stake_info.data_is_empty();
    let mut user = if is_new_user {
        UserStake::new(beneficiary, *pool_info.key, user_bump)
    } else {
        if user_stake_info.owner != program_id {
            return Err(GeyserError::InvalidAccountOwner.into());
        }
        let user = UserStake::try_from_slice(&user_stake_info.try_borrow_data()?)?;
        if user.owner != beneficiary {
            return Err(GeyserError::InvalidOwner.into());
        }
        if user.pool != *pool_info.key {
            return Err(GeyserError::InvalidPool.into());
        }
        user
    };

    let unlocked_this_tick = refresh(&mut pool, Some(&mut user), now)?;

    let distribution_vault_balance = {
        let data = distribution_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    emit_unlock_event(&pool, distribution_vault_balance, unlocked_this_tick)?;

    // mint_shares is computed against the pool balance *before* this
    // deposit's transfer lands (spec §4.1).
    let staking_vault_balance = {
        let data = staking_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    let minted = mint_shares(
        amount,
        pool.total_staking_shares,
        staking_vault_balance,
        pool.initial_shares_per_token,
    )?;
    if minted == 0 {
        return Err(GeyserError::StakeTooSmall.into());
    }

    user.stakes.push(Stake {
        shares: minted,
        timestamp: now,
    });
    user.staking_shares = user
        .staking_shares
        .checked_add(minted)
        .ok_or(GeyserError::MathOverflow)?;
    pool.total_staking_shares = pool
        .total_staking_shares
        .checked_add(minted)
        .ok_or(GeyserError::MathOverflow)?;

    if is_new_user {
        let rent = Rent::get()?;
        let space = UserStake::space_for(user.stakes.len());
        let lamports = rent.minimum_balance(space);
        let seeds = &[
            USER_SEED,
            pool_info.key.as_ref(),
            beneficiary.as_ref(),
            &[user_bump],
        ];
        invoke_signed(
            &system_instruction::create_account(
                depositor_info.key,
                user_stake_info.key,
                lamports,
                space as u64,
                program_id,
            ),
            &[
                depositor_info.clone(),
                user_stake_info.clone(),
                system_program_info.clone(),
            ],
            &[seeds],
        )?;
        let mut data = user_stake_info.try_borrow_mut_data()?;
        user.serialize(&mut &mut data[..])?;
    } else {
        user.realloc_and_save(user_stake_info, depositor_info, system_program_info)?;
    }

    {
        let mut pool_data = pool_info.try_borrow_mut_data()?;
        pool.serialize(&mut &mut pool_data[..])?;
    }

    let mint_data = staking_mint_info.try_borrow_data()?;
    let decimals = StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&mint_data)?
        .base
        .decimals;
    drop(mint_data);

    invoke(
        &spl_token_2022::instruction::transfer_checked(
            &spl_token_2022::id(),
            depositor_token_info.key,
            staking_mint_info.key,
            staking_vault_info.key,
            depositor_info.key,
            &[],
            amount,
            decimals,
        )?,
        &[
            depositor_token_info.clone(),
            staking_mint_info.clone(),
            staking_vault_info.clone(),
            depositor_info.clone(),
        ],
    )?;

    let post_transfer_vault_balance = {
        let data = staking_vault_info.try_borrow_data()?;
        StateWithExtensions::<spl_token_2022::state::Account>::unpack(&data)?
            .base
            .amount
    };
    let total_staked_for_beneficiary = crate::math::burn_value(
        user.staking_shares,
        pool.total_staking_shares,
        post_transfer_vault_balance,
    )?;
    emit_staked(&beneficiary, amount, total_staked_for_beneficiary, data);

    msg!("Staked {} for {}", amount, beneficiary);

    Ok(())
}
