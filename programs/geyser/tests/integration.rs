//! End-to-end coverage of the concrete scenarios in spec §8, driven through
//! `solana-program-test`'s `BanksClient` against the real instruction
//! handlers (no mocking of the accounting engine itself).

use borsh::BorshDeserialize;
use geyser::{
    id as geyser_id,
    process_instruction,
    state::{GeyserPool, UserStake},
    GeyserInstruction,
};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_option::COption,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_program, sysvar,
};
use solana_program_test::{processor, ProgramTest, ProgramTestContext};
use solana_sdk::{
    account::Account,
    clock::Clock,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use spl_token_2022::state::{Account as TokenAccount, AccountState, Mint};

const ONE_TOKEN: u64 = 1_000_000_000; // 9 decimals
const ONE_YEAR_SECS: i64 = 365 * 24 * 3600;
const INITIAL_SHARES_PER_TOKEN: u64 = 1_000_000;
const START_BONUS_PERMILLE: u8 = 50;
const BONUS_PERIOD_SECONDS: u64 = 86_400;
const MAX_SCHEDULES: u8 = 5;

fn packed_mint(decimals: u8, mint_authority: Pubkey) -> Account {
    let mint = Mint {
        mint_authority: COption::Some(mint_authority),
        supply: 0,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(mint, &mut data).unwrap();
    Account {
        lamports: Rent::default().minimum_balance(Mint::LEN),
        data,
        owner: spl_token_2022::id(),
        executable: false,
        rent_epoch: 0,
    }
}

fn packed_token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let account = TokenAccount {
        mint,
        owner,
        amount,
        delegate: COption::None,
        state: AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data).unwrap();
    Account {
        lamports: Rent::default().minimum_balance(TokenAccount::LEN),
        data,
        owner: spl_token_2022::id(),
        executable: false,
        rent_epoch: 0,
    }
}

/// Everything needed to drive one pool through a test: the staking and
/// distribution mints are independent, and `user` is simultaneously the
/// pool authority and the (only) staker, which keeps account setup small
/// without changing any of the accounting exercised.
struct Fixture {
    context: ProgramTestContext,
    user: Keypair,
    pool: Pubkey,
    staking_vault: Pubkey,
    distribution_vault: Pubkey,
    user_stake: Pubkey,
    staking_mint: Pubkey,
    distribution_mint: Pubkey,
    user_staking_token: Pubkey,
    user_distribution_token: Pubkey,
}

async fn setup(staking_balance: u64, distribution_balance: u64) -> Fixture {
    let program_id = geyser_id();
    let mut program_test = ProgramTest::new(
        "geyser",
        program_id,
        processor!(process_instruction),
    );
    program_test.add_program(
        "spl_token_2022",
        spl_token_2022::id(),
        processor!(spl_token_2022::processor::Processor::process),
    );

    let user = Keypair::new();
    program_test.add_account(
        user.pubkey(),
        Account {
            lamports: 10_000_000_000,
            data: vec![],
            owner: system_program::id(),
            executable: false,
            rent_epoch: 0,
        },
    );

    let staking_mint = Keypair::new();
    let distribution_mint = Keypair::new();
    let mint_authority = Keypair::new();
    program_test.add_account(
        staking_mint.pubkey(),
        packed_mint(9, mint_authority.pubkey()),
    );
    program_test.add_account(
        distribution_mint.pubkey(),
        packed_mint(9, mint_authority.pubkey()),
    );

    let user_staking_token = Keypair::new();
    let user_distribution_token = Keypair::new();
    program_test.add_account(
        user_staking_token.pubkey(),
        packed_token_account(staking_mint.pubkey(), user.pubkey(), staking_balance),
    );
    program_test.add_account(
        user_distribution_token.pubkey(),
        packed_token_account(
            distribution_mint.pubkey(),
            user.pubkey(),
            distribution_balance,
        ),
    );

    let (pool, _) = GeyserPool::derive_pda(&staking_mint.pubkey(), &distribution_mint.pubkey(), &program_id);
    let (staking_vault, _) = GeyserPool::derive_staking_vault_pda(&pool, &program_id);
    let (distribution_vault, _) = GeyserPool::derive_distribution_vault_pda(&pool, &program_id);
    let (user_stake, _) = UserStake::derive_pda(&pool, &user.pubkey(), &program_id);

    let mut context = program_test.start_with_context().await;

    let init_ix = Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(pool, false),
            AccountMeta::new_readonly(staking_mint.pubkey(), false),
            AccountMeta::new_readonly(distribution_mint.pubkey(), false),
            AccountMeta::new(staking_vault, false),
            AccountMeta::new(distribution_vault, false),
            AccountMeta::new(user.pubkey(), true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token_2022::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: borsh::to_vec(&GeyserInstruction::InitializePool {
            initial_shares_per_token: INITIAL_SHARES_PER_TOKEN,
            start_bonus_permille: START_BONUS_PERMILLE,
            bonus_period_seconds: BONUS_PERIOD_SECONDS,
            max_unlock_schedules: MAX_SCHEDULES,
        })
        .unwrap(),
    };
    send(&mut context, init_ix, &user).await;

    Fixture {
        context,
        user,
        pool,
        staking_vault,
        distribution_vault,
        user_stake,
        staking_mint: staking_mint.pubkey(),
        distribution_mint: distribution_mint.pubkey(),
        user_staking_token: user_staking_token.pubkey(),
        user_distribution_token: user_distribution_token.pubkey(),
    }
}

async fn send(context: &mut ProgramTestContext, instruction: Instruction, signer: &Keypair) {
    let blockhash = context.banks_client.get_latest_blockhash().await.unwrap();
    let tx = Transaction::new_signed_with_payer(
        &[instruction],
        Some(&signer.pubkey()),
        &[signer],
        blockhash,
    );
    context.banks_client.process_transaction(tx).await.unwrap();
}

impl Fixture {
    async fn stake(&mut self, amount: u64) {
        let ix = Instruction {
            program_id: geyser_id(),
            accounts: vec![
                AccountMeta::new(self.pool, false),
                AccountMeta::new(self.user_stake, false),
                AccountMeta::new(self.staking_vault, false),
                AccountMeta::new(self.user_staking_token, false),
                AccountMeta::new_readonly(self.staking_mint, false),
                AccountMeta::new(self.user.pubkey(), true),
                AccountMeta::new_readonly(system_program::id(), false),
                AccountMeta::new_readonly(spl_token_2022::id(), false),
                AccountMeta::new_readonly(self.distribution_vault, false),
            ],
            data: borsh::to_vec(&GeyserInstruction::Stake { amount, data: vec![] }).unwrap(),
        };
        send(&mut self.context, ix, &self.user).await;
    }

    async fn lock_tokens(&mut self, amount: u64, duration_seconds: u64) {
        let ix = Instruction {
            program_id: geyser_id(),
            accounts: vec![
                AccountMeta::new(self.pool, false),
                AccountMeta::new(self.distribution_vault, false),
                AccountMeta::new(self.user_distribution_token, false),
                AccountMeta::new_readonly(self.distribution_mint, false),
                AccountMeta::new(self.user.pubkey(), true),
                AccountMeta::new_readonly(spl_token_2022::id(), false),
            ],
            data: borsh::to_vec(&GeyserInstruction::LockTokens { amount, duration_seconds })
                .unwrap(),
        };
        send(&mut self.context, ix, &self.user).await;
    }

    async fn unstake(&mut self, amount: u64) {
        let ix = Instruction {
            program_id: geyser_id(),
            accounts: vec![
                AccountMeta::new(self.pool, false),
                AccountMeta::new(self.user_stake, false),
                AccountMeta::new(self.staking_vault, false),
                AccountMeta::new(self.user_staking_token, false),
                AccountMeta::new_readonly(self.staking_mint, false),
                AccountMeta::new(self.distribution_vault, false),
                AccountMeta::new(self.user_distribution_token, false),
                AccountMeta::new_readonly(self.distribution_mint, false),
                AccountMeta::new(self.user.pubkey(), true),
                AccountMeta::new_readonly(spl_token_2022::id(), false),
            ],
            data: borsh::to_vec(&GeyserInstruction::Unstake { amount, data: vec![] }).unwrap(),
        };
        send(&mut self.context, ix, &self.user).await;
    }

    async fn warp_seconds(&mut self, delta_seconds: i64) {
        let mut clock: Clock = self.context.banks_client.get_sysvar().await.unwrap();
        clock.unix_timestamp += delta_seconds;
        self.context.set_sysvar(&clock);
    }

    async fn token_balance(&mut self, account: Pubkey) -> u64 {
        let data = self
            .context
            .banks_client
            .get_account(account)
            .await
            .unwrap()
            .unwrap()
            .data;
        TokenAccount::unpack(&data).unwrap().amount
    }

    async fn user_stake_state(&mut self) -> UserStake {
        let data = self
            .context
            .banks_client
            .get_account(self.user_stake)
            .await
            .unwrap()
            .unwrap()
            .data;
        UserStake::try_from_slice(&data).unwrap()
    }
}

/// Spec §8 scenario 3: "Single staker full reward". Owner locks 100.0 for
/// one year, the sole staker has 50.0 staked the entire time; after one
/// year they unstake 30.0 and should get exactly 30.0 principal back plus
/// 60.0 reward, since the bonus period (1 day) has long elapsed.
#[tokio::test]
async fn single_staker_full_reward_matches_spec_scenario() {
    let mut fx = setup(1_000 * ONE_TOKEN, 1_000 * ONE_TOKEN).await;

    fx.stake(50 * ONE_TOKEN).await;

    let distribution_balance_before_lock = fx.token_balance(fx.user_distribution_token).await;
    fx.lock_tokens(100 * ONE_TOKEN, ONE_YEAR_SECS as u64).await;

    fx.warp_seconds(ONE_YEAR_SECS + 10).await;

    let staking_balance_before_unstake = fx.token_balance(fx.user_staking_token).await;
    fx.unstake(30 * ONE_TOKEN).await;

    let staking_balance_after = fx.token_balance(fx.user_staking_token).await;
    assert_eq!(
        staking_balance_after - staking_balance_before_unstake,
        30 * ONE_TOKEN
    );

    let distribution_balance_after = fx.token_balance(fx.user_distribution_token).await;
    let locked_amount = 100 * ONE_TOKEN;
    assert_eq!(
        distribution_balance_after - (distribution_balance_before_lock - locked_amount),
        60 * ONE_TOKEN
    );

    let user_state = fx.user_stake_state().await;
    assert_eq!(user_state.staking_shares, 20 * (ONE_TOKEN as u128) * (INITIAL_SHARES_PER_TOKEN as u128));
    assert_eq!(user_state.stakes.len(), 1);
}

/// Spec §8 algebraic law: stake/unstake with zero time elapsed returns the
/// same staking-asset amount and earns zero reward when nothing has been
/// unlocked yet.
#[tokio::test]
async fn stake_then_immediate_unstake_is_value_preserving_with_no_reward() {
    let mut fx = setup(1_000 * ONE_TOKEN, 0).await;

    fx.stake(100 * ONE_TOKEN).await;
    let staking_balance_before = fx.token_balance(fx.user_staking_token).await;
    let distribution_balance_before = fx.token_balance(fx.user_distribution_token).await;

    fx.unstake(100 * ONE_TOKEN).await;

    let staking_balance_after = fx.token_balance(fx.user_staking_token).await;
    assert_eq!(
        staking_balance_after - staking_balance_before,
        100 * ONE_TOKEN
    );

    let distribution_balance_after = fx.token_balance(fx.user_distribution_token).await;
    assert_eq!(distribution_balance_after, distribution_balance_before);

    let user_state = fx.user_stake_state().await;
    assert_eq!(user_state.staking_shares, 0);
    assert!(user_state.stakes.is_empty());
}

/// Spec §8 invariant 4 / scenario 7: a schedule fully vests with no dust
/// once `now >= end_ts`, regardless of whether the final tick lands exactly
/// on the boundary or past it.
#[tokio::test]
async fn schedule_fully_unlocks_without_dust() {
    let mut fx = setup(10 * ONE_TOKEN, ONE_TOKEN).await;

    fx.stake(5 * ONE_TOKEN).await;
    fx.lock_tokens(ONE_TOKEN, 10 * ONE_YEAR_SECS as u64).await;

    fx.warp_seconds(10 * ONE_YEAR_SECS - 60).await;
    // Touch accounting without unstaking by querying the pool state via a
    // zero-effect refresh path: unstake a dust amount is not available
    // (would round to zero), so drive the refresh through another stake.
    fx.stake(1).await;

    fx.warp_seconds(65).await;
    fx.stake(1).await;

    let pool_data = fx
        .context
        .banks_client
        .get_account(fx.pool)
        .await
        .unwrap()
        .unwrap()
        .data;
    let pool = GeyserPool::try_from_slice(&pool_data).unwrap();
    assert_eq!(pool.total_locked_shares, 0);
    assert_eq!(pool.schedules()[0].unlocked_shares, pool.schedules()[0].initial_locked_shares);
}
