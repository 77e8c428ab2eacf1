//! Geyser: a continuous-vesting token distribution engine
//!
//! Users stake a (possibly rebasing) staking asset and earn time-weighted
//! entitlement to a distribution asset released linearly from one or more
//! unlock schedules. Entitlement is proportional to both the quantity
//! staked and the duration it remains staked; early withdrawals receive a
//! bonus-scaled fraction of their earned reward that grows linearly from a
//! configurable floor up to 100% over a configured bonus period.
//!
//! Staking-asset quantities are never persisted as token amounts — only
//! as internal "staking shares" — so the share→token conversion is always
//! read live off the staking vault's balance. This decouples the engine's
//! accounting from external rebases of the staking asset: a rebase event
//! changes every holder's balance but no share count.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, entrypoint, entrypoint::ProgramResult, msg,
    program_error::ProgramError, pubkey::Pubkey,
};

pub mod error;
pub mod events;
pub mod instructions;
pub mod math;
pub mod state;

use instructions::*;

solana_program::declare_id!("GeyserVest111111111111111111111111111111111");

solana_security_txt::security_txt! {
    name: "geyser",
    project_url: "https://github.com",
    contacts: "email:security@example.com",
    policy: "https://github.com",
    preferred_languages: "en",
    source_code: "https://github.com"
}

/// Program instructions.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub enum GeyserInstruction {
    /// Construct a new pool for a (staking mint, distribution mint) pair.
    /// (spec §4.7)
    ///
    /// Accounts: see [`instructions::initialize::process_initialize_pool`].
    InitializePool {
        initial_shares_per_token: u64,
        start_bonus_permille: u8,
        bonus_period_seconds: u64,
        max_unlock_schedules: u8,
    },

    /// Stake on behalf of the calling signer. (spec §4.4)
    ///
    /// `data` is an opaque passthrough forwarded unmodified onto the
    /// `Staked` event; the engine never inspects it (spec §9).
    ///
    /// Accounts: see [`instructions::stake::process_stake`].
    Stake { amount: u64, data: Vec<u8> },

    /// Stake on behalf of `beneficiary`. (spec §4.4)
    ///
    /// Accounts: see [`instructions::stake::process_stake`].
    StakeFor {
        beneficiary: Pubkey,
        amount: u64,
        data: Vec<u8>,
    },

    /// Withdraw staked tokens and claim the associated reward. (spec §4.5)
    ///
    /// Accounts: see [`instructions::unstake::process_unstake`].
    Unstake { amount: u64, data: Vec<u8> },

    /// Read-only preview of the reward an `Unstake` of this size would pay
    /// the given caller, without mutating or transferring anything.
    ///
    /// Accounts: see [`instructions::unstake::process_unstake_query`].
    UnstakeQuery { caller: Pubkey, amount: u64 },

    /// Advance the accounting accumulator and report its current figures.
    /// (spec §4.2, §6)
    ///
    /// Accounts: see [`instructions::accounting::process_update_accounting`].
    UpdateAccounting,

    /// Owner-only: introduce a new linear unlock schedule. (spec §4.6)
    ///
    /// Accounts: see [`instructions::lock::process_lock_tokens`].
    LockTokens { amount: u64, duration_seconds: u64 },

    /// Owner-only: transfer the pool's owner role.
    ///
    /// Accounts: see [`instructions::transfer_authority::process_transfer_ownership`].
    TransferOwnership { new_owner: Pubkey },

    /// Current staking-vault balance of the staking asset.
    ///
    /// Accounts: see [`instructions::views::process_total_staked`].
    TotalStaked,

    /// `user.staking_shares` converted to a staking-asset amount.
    ///
    /// Accounts: see [`instructions::views::process_total_staked_for`].
    TotalStakedFor,

    /// Distribution-asset value of `total_locked_shares`.
    ///
    /// Accounts: see [`instructions::views::process_total_locked`].
    TotalLocked,

    /// Distribution-asset value of `total_unlocked_shares`.
    ///
    /// Accounts: see [`instructions::views::process_total_unlocked`].
    TotalUnlocked,

    /// Number of unlock schedules ever introduced (including fully-vested
    /// ones, which remain as inert records so indices stay stable).
    ///
    /// Accounts: see [`instructions::views::process_unlock_schedule_count`].
    UnlockScheduleCount,

    /// Introspect one schedule by index.
    ///
    /// Accounts: see [`instructions::views::process_unlock_schedule_at`].
    UnlockScheduleAt { index: u8 },
}

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);

/// Program entrypoint.
pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    if program_id != &crate::id() {
        return Err(ProgramError::IncorrectProgramId);
    }

    let instruction = GeyserInstruction::try_from_slice(instruction_data)
        .map_err(|_| ProgramError::InvalidInstructionData)?;

    match instruction {
        GeyserInstruction::InitializePool {
            initial_shares_per_token,
            start_bonus_permille,
            bonus_period_seconds,
            max_unlock_schedules,
        } => {
            msg!("Instruction: InitializePool");
            process_initialize_pool(
                program_id,
                accounts,
                initial_shares_per_token,
                start_bonus_permille,
                bonus_period_seconds,
                max_unlock_schedules,
            )
        }
        GeyserInstruction::Stake { amount, data } => {
            msg!("Instruction: Stake (amount={})", amount);
            let caller = *accounts
                .get(5)
                .ok_or(ProgramError::NotEnoughAccountKeys)?
                .key;
            process_stake(program_id, accounts, caller, amount, &data)
        }
        GeyserInstruction::StakeFor { beneficiary, amount, data } => {
            msg!("Instruction: StakeFor (amount={})", amount);
            process_stake(program_id, accounts, beneficiary, amount, &data)
        }
        GeyserInstruction::Unstake { amount, data } => {
            msg!("Instruction: Unstake (amount={})", amount);
            process_unstake(program_id, accounts, amount, &data)
        }
        GeyserInstruction::UnstakeQuery { caller, amount } => {
            msg!("Instruction: UnstakeQuery (amount={})", amount);
            process_unstake_query(program_id, accounts, caller, amount)
        }
        GeyserInstruction::UpdateAccounting => {
            msg!("Instruction: UpdateAccounting");
            process_update_accounting(program_id, accounts)
        }
        GeyserInstruction::LockTokens { amount, duration_seconds } => {
            msg!("Instruction: LockTokens (amount={}, duration={}s)", amount, duration_seconds);
            process_lock_tokens(program_id, accounts, amount, duration_seconds)
        }
        GeyserInstruction::TransferOwnership { new_owner } => {
            msg!("Instruction: TransferOwnership");
            process_transfer_ownership(program_id, accounts, new_owner)
        }
        GeyserInstruction::TotalStaked => {
            msg!("Instruction: TotalStaked");
            process_total_staked(program_id, accounts)
        }
        GeyserInstruction::TotalStakedFor => {
            msg!("Instruction: TotalStakedFor");
            process_total_staked_for(program_id, accounts)
        }
        GeyserInstruction::TotalLocked => {
            msg!("Instruction: TotalLocked");
            process_total_locked(program_id, accounts)
        }
        GeyserInstruction::TotalUnlocked => {
            msg!("Instruction: TotalUnlocked");
            process_total_unlocked(program_id, accounts)
        }
        GeyserInstruction::UnlockScheduleCount => {
            msg!("Instruction: UnlockScheduleCount");
            process_unlock_schedule_count(program_id, accounts)
        }
        GeyserInstruction::UnlockScheduleAt { index } => {
            msg!("Instruction: UnlockScheduleAt ({})", index);
            process_unlock_schedule_at(program_id, accounts, index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stake_instruction_round_trips() {
        let instruction = GeyserInstruction::Stake {
            amount: 1_000_000,
            data: vec![7, 7, 7],
        };
        let serialized = borsh::to_vec(&instruction).unwrap();
        let deserialized: GeyserInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();
        match deserialized {
            GeyserInstruction::Stake { amount, data } => {
                assert_eq!(amount, 1_000_000);
                assert_eq!(data, vec![7, 7, 7]);
            }
            _ => panic!("wrong instruction type"),
        }
    }

    #[test]
    fn initialize_pool_instruction_round_trips() {
        let instruction = GeyserInstruction::InitializePool {
            initial_shares_per_token: 1_000_000,
            start_bonus_permille: 50,
            bonus_period_seconds: 86_400,
            max_unlock_schedules: 5,
        };
        let serialized = borsh::to_vec(&instruction).unwrap();
        let deserialized: GeyserInstruction =
            BorshDeserialize::try_from_slice(&serialized).unwrap();
        match deserialized {
            GeyserInstruction::InitializePool {
                initial_shares_per_token,
                start_bonus_permille,
                bonus_period_seconds,
                max_unlock_schedules,
            } => {
                assert_eq!(initial_shares_per_token, 1_000_000);
                assert_eq!(start_bonus_permille, 50);
                assert_eq!(bonus_period_seconds, 86_400);
                assert_eq!(max_unlock_schedules, 5);
            }
            _ => panic!("wrong instruction type"),
        }
    }
}
