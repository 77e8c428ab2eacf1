//! Account state structures for the continuous-vesting distribution engine

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo, clock::Clock, entrypoint::ProgramResult, program::invoke,
    program_error::ProgramError, pubkey::Pubkey, rent::Rent, system_instruction, sysvar::Sysvar,
};

use crate::error::GeyserError;

/// Seed prefixes for PDAs
pub const POOL_SEED: &[u8] = b"geyser";
pub const USER_SEED: &[u8] = b"geyser-user";
pub const STAKING_VAULT_SEED: &[u8] = b"geyser-staking-vault";
pub const DISTRIBUTION_VAULT_SEED: &[u8] = b"geyser-distribution-vault";

/// Account discriminators
pub const POOL_DISCRIMINATOR: [u8; 8] = [0xc7, 0x5f, 0x7e, 0x2d, 0x3b, 0x1a, 0x9c, 0x4e];
pub const USER_DISCRIMINATOR: [u8; 8] = [0xa3, 0x8b, 0x5d, 0x2f, 0x7c, 0x4a, 0x1e, 0x9d];

/// Compile-time capacity of the schedule array. `max_unlock_schedules` is a
/// runtime-configured bound `<=` this value (spec §3: "fixed upper bound
/// on the number of schedules, e.g. 5").
pub const MAX_SCHEDULE_CAPACITY: usize = 16;

/// One linear-release unlock schedule (spec §3 "Unlock schedule").
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Distribution-pool shares introduced by this schedule.
    pub initial_locked_shares: u128,
    /// Cumulative shares already released by this schedule.
    pub unlocked_shares: u128,
    /// Wall time of the last release against this schedule.
    pub last_unlock_ts: i64,
    /// Wall time at which the schedule is fully vested.
    pub end_ts: i64,
    /// Total duration of the schedule, in seconds.
    pub duration_seconds: u64,
}

impl Schedule {
    pub const LEN: usize = 16 + 16 + 8 + 8 + 8;

    pub fn is_fully_unlocked(&self) -> bool {
        self.unlocked_shares >= self.initial_locked_shares
    }
}

/// One stake deposit in a user's LIFO journal (spec §3 `Stake`).
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stake {
    pub shares: u128,
    pub timestamp: i64,
}

impl Stake {
    pub const LEN: usize = 16 + 8;
}

/// Global pool state. PDA: `["geyser", staking_mint, distribution_mint]`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct GeyserPool {
    pub discriminator: [u8; 8],

    /// Owner role; only signer allowed to call `lock_tokens` and
    /// `transfer_ownership`.
    pub authority: Pubkey,

    pub staking_mint: Pubkey,
    pub distribution_mint: Pubkey,
    pub staking_vault: Pubkey,
    pub distribution_vault: Pubkey,

    /// Share multiplier used while a pool (staking or distribution) is empty.
    pub initial_shares_per_token: u64,
    /// Minimum reward fraction (percent, 0..=100) applied at stake time.
    pub start_bonus_permille: u8,
    /// Seconds after staking at which the bonus factor reaches 100%.
    pub bonus_period_seconds: u64,
    /// Runtime bound on `schedule_count`, `<= MAX_SCHEDULE_CAPACITY`.
    pub max_unlock_schedules: u8,

    pub total_staking_shares: u128,
    pub total_locked_shares: u128,
    pub total_unlocked_shares: u128,
    pub total_staking_share_seconds: u128,
    pub last_accounting_ts: i64,

    pub bump: u8,
    pub schedule_count: u8,
    pub schedules: [Schedule; MAX_SCHEDULE_CAPACITY],
}

impl GeyserPool {
    pub const LEN: usize = 8 // discriminator
        + 32 * 5 // authority, staking_mint, distribution_mint, staking_vault, distribution_vault
        + 8 // initial_shares_per_token
        + 1 // start_bonus_permille
        + 8 // bonus_period_seconds
        + 1 // max_unlock_schedules
        + 16 * 4 // total_staking_shares, total_locked_shares, total_unlocked_shares, total_staking_share_seconds
        + 8 // last_accounting_ts
        + 1 // bump
        + 1 // schedule_count
        + Schedule::LEN * MAX_SCHEDULE_CAPACITY;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        authority: Pubkey,
        staking_mint: Pubkey,
        distribution_mint: Pubkey,
        staking_vault: Pubkey,
        distribution_vault: Pubkey,
        initial_shares_per_token: u64,
        start_bonus_permille: u8,
        bonus_period_seconds: u64,
        max_unlock_schedules: u8,
        now: i64,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: POOL_DISCRIMINATOR,
            authority,
            staking_mint,
            distribution_mint,
            staking_vault,
            distribution_vault,
            initial_shares_per_token,
            start_bonus_permille,
            bonus_period_seconds,
            max_unlock_schedules,
            total_staking_shares: 0,
            total_locked_shares: 0,
            total_unlocked_shares: 0,
            total_staking_share_seconds: 0,
            last_accounting_ts: now,
            bump,
            schedule_count: 0,
            schedules: [Schedule::default(); MAX_SCHEDULE_CAPACITY],
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == POOL_DISCRIMINATOR
    }

    pub fn derive_pda(
        staking_mint: &Pubkey,
        distribution_mint: &Pubkey,
        program_id: &Pubkey,
    ) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[POOL_SEED, staking_mint.as_ref(), distribution_mint.as_ref()],
            program_id,
        )
    }

    pub fn derive_staking_vault_pda(pool: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[STAKING_VAULT_SEED, pool.as_ref()], program_id)
    }

    pub fn derive_distribution_vault_pda(pool: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[DISTRIBUTION_VAULT_SEED, pool.as_ref()], program_id)
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules[..self.schedule_count as usize]
    }

    pub fn schedules_mut(&mut self) -> &mut [Schedule] {
        &mut self.schedules[..self.schedule_count as usize]
    }

    pub fn push_schedule(&mut self, schedule: Schedule) -> Result<(), GeyserError> {
        if self.schedule_count as usize >= self.max_unlock_schedules as usize {
            return Err(GeyserError::ScheduleLimit);
        }
        self.schedules[self.schedule_count as usize] = schedule;
        self.schedule_count += 1;
        Ok(())
    }
}

/// Per-user stake record. PDA: `["geyser-user", pool, owner]`.
///
/// Created lazily on first stake and never destroyed (spec §3 Lifecycles):
/// historical state must be retained for invariant replay consistency, so
/// this crate intentionally has no "close account" instruction.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone)]
pub struct UserStake {
    pub discriminator: [u8; 8],
    pub owner: Pubkey,
    pub pool: Pubkey,

    pub staking_shares: u128,
    pub staking_share_seconds: u128,
    pub last_accounting_ts_for_user: i64,

    pub bump: u8,

    /// Ordered deposit journal; appended on stake, LIFO-consumed on unstake.
    pub stakes: Vec<Stake>,
}

impl UserStake {
    /// Size with an empty stake journal (discriminator + pubkeys + scalars +
    /// borsh's 4-byte Vec length prefix).
    pub const BASE_LEN: usize = 8 + 32 + 32 + 16 + 16 + 8 + 1 + 4;

    pub fn space_for(stake_count: usize) -> usize {
        Self::BASE_LEN + stake_count * Stake::LEN
    }

    pub fn new(owner: Pubkey, pool: Pubkey, bump: u8) -> Self {
        Self {
            discriminator: USER_DISCRIMINATOR,
            owner,
            pool,
            staking_shares: 0,
            staking_share_seconds: 0,
            last_accounting_ts_for_user: 0,
            bump,
            stakes: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.discriminator == USER_DISCRIMINATOR
    }

    pub fn derive_pda(pool: &Pubkey, owner: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[USER_SEED, pool.as_ref(), owner.as_ref()], program_id)
    }

    /// Grow the backing account (and top up rent) so `self` (with one more
    /// stake entry than currently stored) fits, then persist. Mirrors the
    /// realloc-then-serialize pattern used throughout this program's sibling
    /// instructions for accounts with dynamically-sized tails.
    pub fn realloc_and_save<'info>(
        &self,
        account_info: &AccountInfo<'info>,
        payer_info: &AccountInfo<'info>,
        system_program_info: &AccountInfo<'info>,
    ) -> ProgramResult {
        let needed_len = Self::space_for(self.stakes.len());
        if account_info.data_len() < needed_len {
            let rent = Rent::get()?;
            let new_minimum = rent.minimum_balance(needed_len);
            let current_lamports = account_info.lamports();
            if new_minimum > current_lamports {
                invoke(
                    &system_instruction::transfer(
                        payer_info.key,
                        account_info.key,
                        new_minimum - current_lamports,
                    ),
                    &[
                        payer_info.clone(),
                        account_info.clone(),
                        system_program_info.clone(),
                    ],
                )?;
            }
            account_info.realloc(needed_len, false)?;
        }

        let mut data = account_info.try_borrow_mut_data()?;
        self.serialize(&mut &mut data[..])
            .map_err(|_| ProgramError::from(GeyserError::AccountDataTooSmall))?;
        Ok(())
    }
}

/// Read the current Unix timestamp from the `Clock` sysvar.
pub fn now_timestamp() -> Result<i64, ProgramError> {
    Ok(Clock::get()?.unix_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        let pool = GeyserPool::new(
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            1_000_000,
            50,
            86400,
            5,
            0,
            255,
        );
        let serialized = borsh::to_vec(&pool).unwrap();
        assert_eq!(serialized.len(), GeyserPool::LEN);
    }

    #[test]
    fn test_user_stake_base_len() {
        let user = UserStake::new(Pubkey::default(), Pubkey::default(), 255);
        let serialized = borsh::to_vec(&user).unwrap();
        assert_eq!(serialized.len(), UserStake::BASE_LEN);
    }

    #[test]
    fn test_user_stake_space_for_grows_by_stake_len() {
        let mut user = UserStake::new(Pubkey::default(), Pubkey::default(), 255);
        user.stakes.push(Stake {
            shares: 1,
            timestamp: 1,
        });
        user.stakes.push(Stake {
            shares: 2,
            timestamp: 2,
        });
        let serialized = borsh::to_vec(&user).unwrap();
        assert_eq!(serialized.len(), UserStake::space_for(2));
        assert_eq!(serialized.len(), UserStake::BASE_LEN + 2 * Stake::LEN);
    }

    #[test]
    fn test_push_schedule_respects_max_unlock_schedules() {
        let mut pool = GeyserPool::new(
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            Pubkey::default(),
            1_000_000,
            50,
            86400,
            2,
            0,
            255,
        );
        assert!(pool.push_schedule(Schedule::default()).is_ok());
        assert!(pool.push_schedule(Schedule::default()).is_ok());
        assert_eq!(
            pool.push_schedule(Schedule::default()),
            Err(GeyserError::ScheduleLimit)
        );
        assert_eq!(pool.schedules().len(), 2);
    }
}
