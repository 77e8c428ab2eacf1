//! Structured binary log events emitted via sol_log_data
//!
//! Each event has a fixed 8-byte discriminator (first 8 bytes of
//! sha256("event:Name")) followed by its fields in the order documented on
//! each `emit_*` function. `data` passthrough fields are length-prefixed
//! (u32 LE) since the caller-supplied payload is unbounded.

use solana_program::{log::sol_log_data, pubkey::Pubkey};

pub const STAKED_DISCRIMINATOR: [u8; 8] = [0x4e, 0x1a, 0x7f, 0x3c, 0x9d, 0x2b, 0x6e, 0x81];
pub const UNSTAKED_DISCRIMINATOR: [u8; 8] = [0x7c, 0x2d, 0x5a, 0x1f, 0x8b, 0x3e, 0x94, 0x60];
pub const TOKENS_CLAIMED_DISCRIMINATOR: [u8; 8] = [0x11, 0xac, 0x3f, 0x7d, 0x52, 0xe9, 0x08, 0xb4];
pub const TOKENS_LOCKED_DISCRIMINATOR: [u8; 8] = [0x2a, 0x9e, 0x44, 0xc1, 0x6f, 0xd7, 0x33, 0x08];
pub const TOKENS_UNLOCKED_DISCRIMINATOR: [u8; 8] = [0x55, 0x0b, 0xd2, 0x8a, 0x1c, 0x6f, 0x4e, 0x93];
pub const OWNERSHIP_TRANSFERRED_DISCRIMINATOR: [u8; 8] =
    [0x63, 0xf1, 0x0a, 0x5d, 0x2e, 0x97, 0x4b, 0xc8];

/// `Staked(user, amount, total, data)`
pub fn emit_staked(user: &Pubkey, amount: u64, total: u64, data: &[u8]) {
    let mut buf = Vec::with_capacity(8 + 32 + 8 + 8 + 4 + data.len());
    buf.extend_from_slice(&STAKED_DISCRIMINATOR);
    buf.extend_from_slice(user.as_ref());
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(&total.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
    sol_log_data(&[&buf]);
}

/// `Unstaked(user, amount, total, data)`
pub fn emit_unstaked(user: &Pubkey, amount: u64, total: u64, data: &[u8]) {
    let mut buf = Vec::with_capacity(8 + 32 + 8 + 8 + 4 + data.len());
    buf.extend_from_slice(&UNSTAKED_DISCRIMINATOR);
    buf.extend_from_slice(user.as_ref());
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(&total.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
    sol_log_data(&[&buf]);
}

/// `TokensClaimed(user, amount)`
pub fn emit_tokens_claimed(user: &Pubkey, amount: u64) {
    let mut data = [0u8; 48];
    data[..8].copy_from_slice(&TOKENS_CLAIMED_DISCRIMINATOR);
    data[8..40].copy_from_slice(user.as_ref());
    data[40..48].copy_from_slice(&amount.to_le_bytes());
    sol_log_data(&[&data]);
}

/// `TokensLocked(amount, total_locked_amount, duration_sec)`
pub fn emit_tokens_locked(amount: u64, total_locked_amount: u64, duration_seconds: u64) {
    let mut data = [0u8; 32];
    data[..8].copy_from_slice(&TOKENS_LOCKED_DISCRIMINATOR);
    data[8..16].copy_from_slice(&amount.to_le_bytes());
    data[16..24].copy_from_slice(&total_locked_amount.to_le_bytes());
    data[24..32].copy_from_slice(&duration_seconds.to_le_bytes());
    sol_log_data(&[&data]);
}

/// `TokensUnlocked(amount, total)`
pub fn emit_tokens_unlocked(amount: u64, total: u64) {
    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&TOKENS_UNLOCKED_DISCRIMINATOR);
    data[8..16].copy_from_slice(&amount.to_le_bytes());
    data[16..24].copy_from_slice(&total.to_le_bytes());
    sol_log_data(&[&data]);
}

/// `OwnershipTransferred(previous_owner, new_owner)`
pub fn emit_ownership_transferred(previous_owner: &Pubkey, new_owner: &Pubkey) {
    let mut data = [0u8; 72];
    data[..8].copy_from_slice(&OWNERSHIP_TRANSFERRED_DISCRIMINATOR);
    data[8..40].copy_from_slice(previous_owner.as_ref());
    data[40..72].copy_from_slice(new_owner.as_ref());
    sol_log_data(&[&data]);
}
