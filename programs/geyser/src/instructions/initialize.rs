//! Construct a new geyser pool for a (staking mint, distribution mint) pair
//! (spec §4.7).

use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token_2022::extension::StateWithExtensions;

use crate::{
    error::GeyserError,
    state::{now_timestamp, GeyserPool, MAX_SCHEDULE_CAPACITY, POOL_SEED},
};

/// Accounts:
/// 0. `[writable]` Pool account (PDA: `["geyser", staking_mint, distribution_mint]`)
/// 1. `[]` Staking mint (Token 2022)
/// 2. `[]` Distribution mint (Token 2022; may equal the staking mint)
/// 3. `[writable]` Staking vault (PDA: `["geyser-staking-vault", pool]`)
/// 4. `[writable]` Distribution vault (PDA: `["geyser-distribution-vault", pool]`)
/// 5. `[writable, signer]` Authority/payer
/// 6. `[]` System program
/// 7. `[]` Token 2022 program
/// 8. `[]` Rent sysvar
#[allow(clippy::too_many_arguments)]
pub fn process_initialize_pool(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    initial_shares_per_token: u64,
    start_bonus_permille: u8,
    bonus_period_seconds: u64,
    max_unlock_schedules: u8,
) -> ProgramResult {
    let iter = &mut accounts.iter();

    let pool_info = next_account_info(iter)?;
    let staking_mint_info = next_account_info(iter)?;
    let distribution_mint_info = next_account_info(iter)?;
    let staking_vault_info = next_account_info(iter)?;
    let distribution_vault_info = next_account_info(iter)?;
    let authority_info = next_account_info(iter)?;
    let system_program_info = next_account_info(iter)?;
    let token_program_info = next_account_info(iter)?;
    let _rent_sysvar_info = next_account_info(iter)?;

    if !authority_info.is_signer {
        return Err(GeyserError::MissingRequiredSigner.into());
    }

    // Spec §4.7 construction validation
    if start_bonus_permille > 100 {
        return Err(GeyserError::StartBonusTooHigh.into());
    }
    if bonus_period_seconds == 0 {
        return Err(GeyserError::BonusPeriodZero.into());
    }
    if max_unlock_schedules == 0 || (max_unlock_schedules as usize) > MAX_SCHEDULE_CAPACITY {
        return Err(GeyserError::ScheduleCapacityExceeded.into());
    }

    if *token_program_info.key != spl_token_2022::id() {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    if staking_mint_info.owner != &spl_token_2022::id() {
        return Err(GeyserError::InvalidStakingMint.into());
    }
    if distribution_mint_info.owner != &spl_token_2022::id() {
        return Err(GeyserError::InvalidDistributionMint.into());
    }

    let (expected_pool, pool_bump) = GeyserPool::derive_pda(
        staking_mint_info.key,
        distribution_mint_info.key,
        program_id,
    );
    if *pool_info.key != expected_pool {
        return Err(GeyserError::InvalidPDA.into());
    }

    let (expected_staking_vault, staking_vault_bump) =
        GeyserPool::derive_staking_vault_pda(pool_info.key, program_id);
    if *staking_vault_info.key != expected_staking_vault {
        return Err(GeyserError::InvalidPDA.into());
    }

    let (expected_distribution_vault, distribution_vault_bump) =
        GeyserPool::derive_distribution_vault_pda(pool_info.key, program_id);
    if *distribution_vault_info.key != expected_distribution_vault {
        return Err(GeyserError::InvalidPDA.into());
    }

    let rent = Rent::get()?;
    let now = now_timestamp()?;

    let pool_seeds = &[
        POOL_SEED,
        staking_mint_info.key.as_ref(),
        distribution_mint_info.key.as_ref(),
        &[pool_bump],
    ];
    invoke_signed(
        &system_instruction::create_account(
            authority_info.key,
            pool_info.key,
            rent.minimum_balance(GeyserPool::LEN),
            GeyserPool::LEN as u64,
            program_id,
        ),
        &[
            authority_info.clone(),
            pool_info.clone(),
            system_program_info.clone(),
        ],
        &[pool_seeds],
    )?;

    create_vault(
        authority_info,
        staking_vault_info,
        staking_mint_info,
        pool_info,
        system_program_info,
        &rent,
        &[
            crate::state::STAKING_VAULT_SEED,
            pool_info.key.as_ref(),
            &[staking_vault_bump],
        ],
    )?;

    create_vault(
        authority_info,
        distribution_vault_info,
        distribution_mint_info,
        pool_info,
        system_program_info,
        &rent,
        &[
            crate::state::DISTRIBUTION_VAULT_SEED,
            pool_info.key.as_ref(),
            &[distribution_vault_bump],
        ],
    )?;

    let pool = GeyserPool::new(
        *authority_info.key,
        *staking_mint_info.key,
        *distribution_mint_info.key,
        *staking_vault_info.key,
        *distribution_vault_info.key,
        initial_shares_per_token,
        start_bonus_permille,
        bonus_period_seconds,
        max_unlock_schedules,
        now,
        pool_bump,
    );

    let mut pool_data = pool_info.try_borrow_mut_data()?;
    pool.serialize(&mut &mut pool_data[..])?;

    msg!(
        "Initialized geyser pool: start_bonus={}%, bonus_period={}s, max_schedules={}",
        start_bonus_permille,
        bonus_period_seconds,
        max_unlock_schedules
    );

    Ok(())
}

fn create_vault<'a>(
    payer_info: &AccountInfo<'a>,
    vault_info: &AccountInfo<'a>,
    mint_info: &AccountInfo<'a>,
    owner_info: &AccountInfo<'a>,
    system_program_info: &AccountInfo<'a>,
    rent: &Rent,
    seeds: &[&[u8]],
) -> ProgramResult {
    let vault_size = spl_token_2022::extension::ExtensionType::try_calculate_account_len::<
        spl_token_2022::state::Account,
    >(&[])?;

    invoke_signed(
        &system_instruction::create_account(
            payer_info.key,
            vault_info.key,
            rent.minimum_balance(vault_size),
            vault_size as u64,
            &spl_token_2022::id(),
        ),
        &[
            payer_info.clone(),
            vault_info.clone(),
            system_program_info.clone(),
        ],
        &[seeds],
    )?;

    invoke_signed(
        &spl_token_2022::instruction::initialize_account3(
            &spl_token_2022::id(),
            vault_info.key,
            mint_info.key,
            owner_info.key,
        )?,
        &[vault_info.clone(), mint_info.clone()],
        &[seeds],
    )?;

    // Confirm the mint unpacks (reject corrupt/incompatible mint accounts
    // before the pool is considered initialized).
    let mint_data = mint_info.try_borrow_data()?;
    let _ = StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&mint_data)?;

    Ok(())
}
