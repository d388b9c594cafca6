//! Wallet flows against an in-process mint

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use cwk::amount::SplitTarget;
use cwk::cashu_core::nuts::{CurrencyUnit, ProofsMethods, State, Token};
use cwk::cashu_core::Amount;
use cwk::database::{WalletDatabase, WalletMemoryDatabase};
use cwk::{Error, Wallet};

use common::FakeMint;

const MINT_URL: &str = "https://fake.mint.example";
const MNEMONIC: &str =
    "half depart obvious quality work element tank gorilla view sugar picture humble";

/// BOLT11 test vector over 250_000 sat
const TEST_INVOICE: &str = "lnbc2500u1pvjluezsp5zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zygshp58yjmdan79s6qqdhdzgynm4zwqd5d7xmw5fk98klysy043l2ahrqspp5qqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqqqsyqcyq5rqwzqfqypqdq5xysxxatsyp3k7enxv4jsxqzpu9qrsgquk0rl77nj30yxdy8j9vdx85fkpmdla2087ne0xh8nhedh8w27kyke0lp53pe5clth2l6j95s92zcz2v5h9z8xrzm0j2w3sye65pjzqgpl44gc8";

async fn wallet_with_mint(mint: Arc<FakeMint>) -> Wallet {
    let localstore = Arc::new(WalletMemoryDatabase::new());
    let mut wallet = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
    wallet.set_client(mint);
    wallet.init_from_mnemonic(MNEMONIC, None).unwrap();
    // Memory store: hand in counters explicitly to lift the safety gate
    wallet.import_counters(HashMap::new()).await.unwrap();
    wallet
}

async fn mint_proofs(wallet: &Wallet, amount: u64) -> cwk::cashu_core::nuts::Proofs {
    let quote = wallet.mint_quote(Amount::from(amount), None).await.unwrap();
    wallet.mint(&quote.id, SplitTarget::None).await.unwrap()
}

#[tokio::test]
async fn test_mint_produces_proofs() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let proofs = mint_proofs(&wallet, 100).await;

    assert_eq!(proofs.total_amount().unwrap(), Amount::from(100));
    let amounts: Vec<u64> = proofs.iter().map(|p| u64::from(p.amount)).collect();
    assert_eq!(amounts, vec![4, 32, 64]);

    assert_eq!(wallet.total_balance().await.unwrap(), Amount::from(100));

    // One counter consumed per output
    let counter = wallet
        .localstore
        .get_keyset_counter(&wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    assert_eq!(counter, 3);
}

#[tokio::test]
async fn test_mint_requires_seed_and_safe_state() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let localstore = Arc::new(WalletMemoryDatabase::new());
    let mut wallet = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
    wallet.set_client(mint);

    // Quotes are a pass-through and work without a seed
    let quote = wallet.mint_quote(Amount::from(10), None).await.unwrap();

    assert!(matches!(
        wallet.mint(&quote.id, SplitTarget::None).await,
        Err(Error::NoSeed)
    ));

    wallet.init_from_mnemonic(MNEMONIC, None).unwrap();

    // Seed present, but counters on a memory store are not durable
    assert!(matches!(
        wallet.mint(&quote.id, SplitTarget::None).await,
        Err(Error::UnsafeState)
    ));

    // And a fresh mnemonic cannot be generated against ephemeral storage
    assert!(matches!(
        wallet.generate_mnemonic(),
        Err(Error::StorageRequired)
    ));

    wallet.import_counters(HashMap::new()).await.unwrap();
    let proofs = wallet.mint(&quote.id, SplitTarget::None).await.unwrap();
    assert_eq!(proofs.total_amount().unwrap(), Amount::from(10));
}

#[tokio::test]
async fn test_mint_crash_recovery_via_quote_id() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let quote = wallet.mint_quote(Amount::from(100), None).await.unwrap();
    let minted = wallet.mint(&quote.id, SplitTarget::None).await.unwrap();

    // A caller that crashed after persist finds the proofs by quote id
    let recovered = wallet.proofs_by_mint_quote(&quote.id).await.unwrap();
    assert_eq!(recovered.total_amount().unwrap(), Amount::from(100));
    assert_eq!(
        recovered.ys().unwrap().len(),
        minted.ys().unwrap().len()
    );

    // Re-running the mint for the same quote cannot double issue
    assert!(wallet.mint(&quote.id, SplitTarget::None).await.is_err());
}

#[tokio::test]
async fn test_swap_is_atomic_and_inputs_end_spent() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 100).await;
    let input_ys = inputs.ys().unwrap();

    let outputs = wallet.swap(inputs, Amount::from(100).split()).await.unwrap();

    assert_eq!(outputs.total_amount().unwrap(), Amount::from(100));
    assert_eq!(wallet.total_balance().await.unwrap(), Amount::from(100));

    // Inputs are SPENT rows with a spent_at stamp, not deleted
    let stored = wallet
        .localstore
        .get_proofs(&wallet.wallet_id, Some(vec![State::Spent]))
        .await
        .unwrap();
    assert_eq!(stored.len(), input_ys.len());
    assert!(stored.iter().all(|info| input_ys.contains(&info.y)));
    assert!(stored.iter().all(|info| info.spent_at.is_some()));
}

#[tokio::test]
async fn test_swap_rejects_unbalanced_targets() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 100).await;

    assert!(matches!(
        wallet.swap(inputs, Amount::from(90).split()).await,
        Err(Error::AmountMismatch)
    ));
}

#[tokio::test]
async fn test_swap_accounts_for_input_fees() {
    // 500 ppk: two inputs cost one unit of fee
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 500));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 10).await;
    assert_eq!(inputs.len(), 2);

    let fee = wallet.get_proofs_fee(&inputs).await.unwrap();
    assert_eq!(fee, Amount::from(1));

    // Targets must equal inputs minus fee
    assert!(matches!(
        wallet.swap(inputs.clone(), Amount::from(10).split()).await,
        Err(Error::AmountMismatch)
    ));

    let outputs = wallet.swap(inputs, Amount::from(9).split()).await.unwrap();
    assert_eq!(outputs.total_amount().unwrap(), Amount::from(9));
}

#[tokio::test]
async fn test_split_separates_send_and_keep() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 100).await;

    let (keep, send) = wallet.split(inputs, Amount::from(37)).await.unwrap();

    assert_eq!(send.total_amount().unwrap(), Amount::from(37));
    assert_eq!(keep.total_amount().unwrap(), Amount::from(63));

    let mut send_amounts: Vec<u64> = send.iter().map(|p| u64::from(p.amount)).collect();
    send_amounts.sort();
    assert_eq!(send_amounts, vec![1, 4, 32]);
}

#[tokio::test]
async fn test_split_insufficient_balance() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 10).await;

    assert!(matches!(
        wallet.split(inputs, Amount::from(11)).await,
        Err(Error::InsufficientFunds { .. })
    ));
}

#[tokio::test]
async fn test_receive_token() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let sender = wallet_with_mint(mint.clone()).await;

    let proofs = mint_proofs(&sender, 64).await;
    let token = Token::new(
        sender.mint_url.clone(),
        proofs,
        Some("here you go".to_string()),
        CurrencyUnit::Sat,
    );

    // Receiver: separate store, same seedless safety setup
    let receiver = {
        let localstore = Arc::new(WalletMemoryDatabase::new());
        let mut wallet = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
        wallet.set_client(mint.clone());
        wallet
            .init_from_mnemonic(
                "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
                None,
            )
            .unwrap();
        wallet.import_counters(HashMap::new()).await.unwrap();
        wallet
    };

    let received = receiver.receive(&token.to_string()).await.unwrap();
    assert_eq!(received, Amount::from(64));
    assert_eq!(receiver.total_balance().await.unwrap(), Amount::from(64));

    // The source proofs are now spent at the mint
    assert!(matches!(
        receiver.receive(&token.to_string()).await,
        Err(Error::Protocol { code: Some(11001), .. })
    ));
}

#[tokio::test]
async fn test_receive_from_foreign_mint_rejected() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let proofs = mint_proofs(&wallet, 64).await;
    let counter_before = wallet
        .localstore
        .get_keyset_counter(&wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    let proofs_before = wallet
        .localstore
        .get_proofs(&wallet.wallet_id, None)
        .await
        .unwrap()
        .len();

    let foreign_token = Token::new(
        "https://other.mint.example".parse().unwrap(),
        proofs,
        None,
        CurrencyUnit::Sat,
    );

    assert!(matches!(
        wallet.receive(&foreign_token.to_string()).await,
        Err(Error::WrongMint { .. })
    ));

    // No counter advanced, no proof written
    let counter_after = wallet
        .localstore
        .get_keyset_counter(&wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    let proofs_after = wallet
        .localstore
        .get_proofs(&wallet.wallet_id, None)
        .await
        .unwrap()
        .len();

    assert_eq!(counter_before, counter_after);
    assert_eq!(proofs_before, proofs_after);
}

#[tokio::test]
async fn test_melt_pays_and_returns_change() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    // Invoice is 250_000 sat; fund with more to force change
    mint_proofs(&wallet, 1 << 18).await;

    let quote = wallet.melt_quote(TEST_INVOICE.to_string()).await.unwrap();
    assert_eq!(quote.amount, Amount::from(250_000));
    assert_eq!(quote.fee_reserve, Amount::from(2));

    let melted = wallet.melt(&quote.id).await.unwrap();

    assert!(melted.paid());
    assert!(melted.preimage.is_some());
    assert_eq!(melted.amount, Amount::from(250_000));
    assert_eq!(melted.fee_paid, Amount::from(common::MELT_LIGHTNING_FEE));

    let expected_change =
        Amount::from((1_u64 << 18) - 250_000 - common::MELT_LIGHTNING_FEE);
    assert_eq!(melted.change.total_amount().unwrap(), expected_change);
    assert_eq!(wallet.total_balance().await.unwrap(), expected_change);
}

#[tokio::test]
async fn test_melt_insufficient_inputs() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    mint_proofs(&wallet, 100).await;

    let quote = wallet.melt_quote(TEST_INVOICE.to_string()).await.unwrap();

    assert!(matches!(
        wallet.melt(&quote.id).await,
        Err(Error::InsufficientFunds { .. })
    ));
}

#[tokio::test]
async fn test_restore_recovers_proofs_and_counter() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    // Counters 0, 1, 2 consumed
    mint_proofs(&wallet, 100).await;

    // Same seed, fresh store: storage was lost
    let recovered_wallet = {
        let localstore = Arc::new(WalletMemoryDatabase::new());
        let mut wallet = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
        wallet.set_client(mint.clone());
        wallet.init_from_mnemonic(MNEMONIC, None).unwrap();
        wallet
    };

    let restored = recovered_wallet.restore().await.unwrap();
    assert_eq!(restored, Amount::from(100));
    assert_eq!(
        recovered_wallet.total_balance().await.unwrap(),
        Amount::from(100)
    );

    let counter = recovered_wallet
        .localstore
        .get_keyset_counter(&recovered_wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    assert_eq!(counter, 3);

    // Restore lifts the safety gate, and the next mint must not reuse a
    // counter: the mint rejects duplicate outputs, so success proves
    // counters 3.. were used
    let quote = recovered_wallet
        .mint_quote(Amount::from(7), None)
        .await
        .unwrap();
    let proofs = recovered_wallet
        .mint(&quote.id, SplitTarget::None)
        .await
        .unwrap();
    assert_eq!(proofs.total_amount().unwrap(), Amount::from(7));

    let counter = recovered_wallet
        .localstore
        .get_keyset_counter(&recovered_wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    assert_eq!(counter, 6);
}

#[tokio::test]
async fn test_restore_after_spend_skips_spent_proofs() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let inputs = mint_proofs(&wallet, 100).await;
    // Swap, spending the original three proofs (counters 3..6 for outputs)
    wallet.swap(inputs, Amount::from(100).split()).await.unwrap();

    let recovered_wallet = {
        let localstore = Arc::new(WalletMemoryDatabase::new());
        let mut wallet = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
        wallet.set_client(mint.clone());
        wallet.init_from_mnemonic(MNEMONIC, None).unwrap();
        wallet
    };

    let restored = recovered_wallet.restore().await.unwrap();

    // Only the post-swap proofs are spendable
    assert_eq!(restored, Amount::from(100));
    let counter = recovered_wallet
        .localstore
        .get_keyset_counter(&recovered_wallet.wallet_id, &mint.keyset_id())
        .await
        .unwrap();
    assert_eq!(counter, 6);
}

#[tokio::test]
async fn test_sync_proof_states_marks_spent() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let wallet = wallet_with_mint(mint.clone()).await;

    let proofs = mint_proofs(&wallet, 64).await;

    // Token handed to an outside party who redeemed it
    let other = {
        let localstore = Arc::new(WalletMemoryDatabase::new());
        let mut other = Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore).unwrap();
        other.set_client(mint.clone());
        other
            .init_from_mnemonic(
                "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
                None,
            )
            .unwrap();
        other.import_counters(HashMap::new()).await.unwrap();
        other
    };
    let token = Token::new(wallet.mint_url.clone(), proofs, None, CurrencyUnit::Sat);
    other.receive(&token.to_string()).await.unwrap();

    // Our store still says unspent until the sync
    assert_eq!(wallet.total_balance().await.unwrap(), Amount::from(64));

    let swept = wallet.sync_proof_states().await.unwrap();
    assert_eq!(swept, Amount::from(64));
    assert_eq!(wallet.total_balance().await.unwrap(), Amount::ZERO);
}

#[tokio::test]
async fn test_wallet_ids_partition_one_store() {
    let mint = Arc::new(FakeMint::new(CurrencyUnit::Sat, 0));
    let localstore = Arc::new(WalletMemoryDatabase::new());

    let sat_wallet = {
        let mut wallet =
            Wallet::new(MINT_URL, CurrencyUnit::Sat, localstore.clone()).unwrap();
        wallet.set_client(mint.clone());
        wallet.init_from_mnemonic(MNEMONIC, None).unwrap();
        wallet.import_counters(HashMap::new()).await.unwrap();
        wallet
    };

    mint_proofs(&sat_wallet, 16).await;

    let usd_wallet = Wallet::new(MINT_URL, CurrencyUnit::Usd, localstore.clone()).unwrap();

    assert_ne!(sat_wallet.wallet_id, usd_wallet.wallet_id);
    assert_eq!(usd_wallet.total_balance().await.unwrap(), Amount::ZERO);
    assert_eq!(sat_wallet.total_balance().await.unwrap(), Amount::from(16));
}
