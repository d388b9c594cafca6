//! Cashu wallet
//!
//! A [`Wallet`] is bound to a single mint and a single unit. It composes
//! deterministic secret derivation, BDHKE blinding and the proof/counter
//! store into the mint / swap / melt / receive / restore operations, and
//! owns the counter-safety invariants along the way.
//!
//! Operations are intended to be issued serially per instance. Several
//! instances may share one database; counter atomicity lives in the store.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bip39::Mnemonic;
use bitcoin::bip32::Xpriv;
use bitcoin::Network;
use cashu_core::nuts::{CurrencyUnit, Id, Proofs, ProofsMethods};
use cashu_core::{Amount, MintUrl};
use tracing::instrument;

use crate::database::WalletDatabase;
use crate::fees::calculate_fee;
use crate::Error;

pub mod client;
mod keysets;
mod melt;
mod mint;
mod proofs;
mod receive;
mod restore;
mod swap;
pub mod types;

pub use client::{HttpClient, MintConnector};
pub use types::{MeltQuote, Melted, MintQuote, ProofInfo, WalletId};

/// Cashu wallet for one mint and one unit
#[derive(Debug, Clone)]
pub struct Wallet {
    /// Mint url
    pub mint_url: MintUrl,
    /// Unit of the wallet
    pub unit: CurrencyUnit,
    /// Store partition key for this `(mint, unit)` pair
    pub wallet_id: WalletId,
    /// Storage backend
    pub localstore: Arc<dyn WalletDatabase + Send + Sync>,
    client: Arc<dyn MintConnector>,
    xpriv: Option<Xpriv>,
    counters_restored: Arc<AtomicBool>,
}

impl Wallet {
    /// Create new [`Wallet`] without a seed
    ///
    /// Quote and state-check operations work immediately; anything that
    /// derives outputs needs [`Wallet::init_from_mnemonic`] first.
    pub fn new(
        mint_url: &str,
        unit: CurrencyUnit,
        localstore: Arc<dyn WalletDatabase + Send + Sync>,
    ) -> Result<Self, Error> {
        let mint_url = MintUrl::from_str(mint_url)?;
        let wallet_id = WalletId::new(&mint_url, &unit);
        let client = Arc::new(HttpClient::new(mint_url.clone()));

        Ok(Self {
            mint_url,
            unit,
            wallet_id,
            localstore,
            client,
            xpriv: None,
            counters_restored: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the mint client, e.g. with a proxied or in-process one
    pub fn set_client(&mut self, client: Arc<dyn MintConnector>) {
        self.client = client;
    }

    /// Generate a fresh mnemonic for this wallet
    ///
    /// Refuses on an ephemeral store: counters derived from a brand new
    /// seed would be lost on exit and the next run would reuse them.
    pub fn generate_mnemonic(&self) -> Result<Mnemonic, Error> {
        if !self.localstore.is_persistent() {
            return Err(Error::StorageRequired);
        }

        Ok(Mnemonic::generate(12)?)
    }

    /// Initialize the seed from a BIP-39 mnemonic
    pub fn init_from_mnemonic(
        &mut self,
        phrase: &str,
        passphrase: Option<&str>,
    ) -> Result<(), Error> {
        let mnemonic = Mnemonic::from_str(phrase)?;
        let seed = mnemonic.to_seed(passphrase.unwrap_or(""));
        self.xpriv = Some(Xpriv::new_master(Network::Bitcoin, &seed)?);
        Ok(())
    }

    /// Seed counters explicitly, lifting the safe-state gate on an
    /// ephemeral store
    ///
    /// For callers that carry counters across runs themselves. The values
    /// must come from durable state or a prior [`Wallet::restore`]; guessing
    /// here risks reusing a counter and stranding funds.
    pub async fn import_counters(&self, counters: HashMap<Id, u32>) -> Result<(), Error> {
        for (keyset_id, counter) in counters {
            self.localstore
                .set_keyset_counter(&self.wallet_id, &keyset_id, counter)
                .await?;
        }
        self.counters_restored.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Safe-state gate for output-producing operations
    ///
    /// Seed must be present, and counters must be durable (persistent
    /// store) or explicitly restored. Not advice: deriving outputs outside
    /// these conditions can burn the same counter twice.
    pub(crate) fn ensure_safe_state(&self) -> Result<Xpriv, Error> {
        let xpriv = self.xpriv.ok_or(Error::NoSeed)?;

        if !self.localstore.is_persistent() && !self.counters_restored.load(Ordering::SeqCst) {
            return Err(Error::UnsafeState);
        }

        Ok(xpriv)
    }

    pub(crate) fn xpriv(&self) -> Result<Xpriv, Error> {
        self.xpriv.ok_or(Error::NoSeed)
    }

    pub(crate) fn client(&self) -> &Arc<dyn MintConnector> {
        &self.client
    }

    pub(crate) fn mark_counters_restored(&self) {
        self.counters_restored.store(true, Ordering::SeqCst);
    }

    /// Fee required to spend a set of proofs
    #[instrument(skip_all)]
    pub async fn get_proofs_fee(&self, proofs: &Proofs) -> Result<Amount, Error> {
        let mut fee_per_keyset = HashMap::new();

        for keyset_id in proofs.count_by_keyset().keys() {
            let keyset_info = self
                .localstore
                .get_keyset_by_id(&self.wallet_id, keyset_id)
                .await?
                .ok_or(Error::UnknownKeyset(*keyset_id))?;
            fee_per_keyset.insert(*keyset_id, keyset_info.input_fee_ppk);
        }

        calculate_fee(&proofs.count_by_keyset(), &fee_per_keyset)
    }

    /// Total unspent balance
    #[instrument(skip(self))]
    pub async fn total_balance(&self) -> Result<Amount, Error> {
        Ok(self.get_unspent_proofs().await?.total_amount()?)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bip39::Mnemonic;
    use cashu_core::util::hex;

    const VECTOR_PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_mnemonic_entropy_round_trip() {
        for entropy_bits in [128, 160, 192, 224, 256] {
            let entropy = vec![0x7f_u8; entropy_bits / 8];
            let mnemonic = Mnemonic::from_entropy(&entropy).unwrap();
            assert_eq!(mnemonic.to_entropy(), entropy);
            assert!(Mnemonic::from_str(&mnemonic.to_string()).is_ok());
        }
    }

    #[test]
    fn test_bip39_reference_vector() {
        // All-zero entropy
        let mnemonic = Mnemonic::from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(mnemonic.to_string(), VECTOR_PHRASE);

        let seed = mnemonic.to_seed("");
        assert_eq!(
            hex::encode(seed),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc19a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );

        let seed = mnemonic.to_seed("TREZOR");
        assert_eq!(
            hex::encode(seed),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_bad_mnemonic_rejected() {
        // Last word carries the checksum
        let phrase =
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        assert!(Mnemonic::from_str(phrase).is_err());

        assert!(Mnemonic::from_str("definitely not a mnemonic").is_err());
    }
}
