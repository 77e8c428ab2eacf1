//! Owner-only `transfer_ownership` instruction.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
};

use crate::{error::GeyserError, events::emit_ownership_transferred, state::GeyserPool};

/// Accounts:
/// 0. `[writable]` Pool account
/// 1. `[signer]` Current owner
pub fn process_transfer_ownership(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    new_owner: Pubkey,
) -> ProgramResult {
    let iter = &mut accounts.iter();
    let pool_info = next_account_info(iter)?;
    let owner_info = next_account_info(iter)?;

    if !owner_info.is_signer {
        return Err(GeyserError::MissingRequiredSigner.into());
    }

    if pool_info.owner != program_id {
        return Err(GeyserError::InvalidAccountOwner.into());
    }
    let mut pool = GeyserPool::try_from_slice(&pool_info.try_borrow_data()?)?;
    if !pool.is_initialized() {
        return Err(GeyserError::NotInitialized.into());
    }
    if pool.authority != *owner_info.key {
        return Err(GeyserError::NotOwner.into());
    }

    let previous_owner = pool.authority;
    pool.authority = new_owner;

    let mut pool_data = pool_info.try_borrow_mut_data()?;
    pool.serialize(&mut &mut pool_data[..])?;

    emit_ownership_transferred(&previous_owner, &new_owner);
    msg!("Ownership transferred to {}", new_owner);

    Ok(())
}
