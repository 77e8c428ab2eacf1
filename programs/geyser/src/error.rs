use solana_program::program_error::ProgramError;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeyserError {
    #[error("Invalid instruction data")]
    InvalidInstruction,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Account not initialized")]
    NotInitialized,

    #[error("Invalid pool PDA")]
    InvalidPDA,

    #[error("Invalid account owner")]
    InvalidAccountOwner,

    #[error("Invalid staking mint")]
    InvalidStakingMint,

    #[error("Invalid distribution mint")]
    InvalidDistributionMint,

    #[error("Invalid staking vault")]
    InvalidStakingVault,

    #[error("Invalid distribution vault")]
    InvalidDistributionVault,

    #[error("Missing required signer")]
    MissingRequiredSigner,

    #[error("Caller is not the pool owner")]
    NotOwner,

    #[error("Invalid stake account owner")]
    InvalidOwner,

    #[error("Stake account does not belong to this pool")]
    InvalidPool,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Beneficiary must not be the null address")]
    BeneficiaryIsNull,

    #[error("start_bonus_permille must be <= 100")]
    StartBonusTooHigh,

    #[error("bonus_period_seconds must be > 0")]
    BonusPeriodZero,

    #[error("max_unlock_schedules exceeds program capacity")]
    ScheduleCapacityExceeded,

    #[error("Unlock schedule list is full")]
    ScheduleLimit,

    #[error("Schedule index out of range")]
    ScheduleIndexOutOfRange,

    #[error("Staked amount mints to zero shares")]
    StakeTooSmall,

    #[error("Unstaked amount burns to zero shares")]
    UnstakeTooSmall,

    #[error("Unstake amount exceeds staked balance")]
    UnstakeExceedsBalance,

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Account data too small for stake journal growth")]
    AccountDataTooSmall,
}

impl From<GeyserError> for ProgramError {
    fn from(e: GeyserError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
