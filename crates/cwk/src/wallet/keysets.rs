//! Keyset loading and selection

use cashu_core::nuts::{Id, KeySet, KeySetInfo, Keys};
use tracing::instrument;

use crate::{Error, Wallet};

impl Wallet {
    /// Load the mint's keysets and select the active one for this wallet's
    /// unit
    ///
    /// Keysets of every unit are stored (restore walks them all); selection
    /// filters to the wallet unit. With several active keysets the lowest
    /// id wins, deterministically across wallets of the same seed.
    #[instrument(skip(self))]
    pub async fn load_mint(&self) -> Result<KeySetInfo, Error> {
        if self
            .localstore
            .get_mint(&self.wallet_id)
            .await?
            .is_none()
        {
            match self.client().get_mint_info().await {
                Ok(mint_info) => {
                    self.localstore
                        .add_mint(&self.wallet_id, Some(mint_info))
                        .await?;
                }
                Err(err) => {
                    tracing::warn!("Could not get mint info: {}", err);
                }
            }
        }

        let keysets = self.refresh_keysets().await?;

        let mut active: Vec<&KeySetInfo> = keysets
            .iter()
            .filter(|k| k.unit == self.unit && k.active)
            .collect();
        active.sort_by_key(|k| k.id);

        match active.first() {
            Some(keyset) => Ok((*keyset).clone()),
            None => {
                let mut available: Vec<_> = keysets.into_iter().map(|k| k.unit).collect();
                available.sort();
                available.dedup();

                Err(Error::NoActiveKeyset {
                    unit: self.unit.clone(),
                    available,
                })
            }
        }
    }

    /// Fetch the keyset listing from the mint and store it
    #[instrument(skip(self))]
    pub async fn refresh_keysets(&self) -> Result<Vec<KeySetInfo>, Error> {
        let keysets = self.client().get_mint_keysets().await?.keysets;
        self.localstore
            .add_mint_keysets(&self.wallet_id, keysets.clone())
            .await?;
        Ok(keysets)
    }

    /// Active keyset for the wallet unit, from the store when fresh enough
    #[instrument(skip(self))]
    pub async fn get_active_keyset(&self) -> Result<KeySetInfo, Error> {
        let stored = self.localstore.get_mint_keysets(&self.wallet_id).await?;

        let mut active: Vec<KeySetInfo> = stored
            .into_iter()
            .filter(|k| k.unit == self.unit && k.active)
            .collect();
        active.sort_by_key(|k| k.id);

        match active.into_iter().next() {
            Some(keyset) => Ok(keyset),
            None => self.load_mint().await,
        }
    }

    /// Keys of a keyset, fetched and verified on first use
    ///
    /// Amounts wider than the host integer were already dropped during
    /// deserialization; the remaining keys must hash back to the keyset id.
    #[instrument(skip(self))]
    pub async fn load_keyset_keys(&self, keyset_id: Id) -> Result<Keys, Error> {
        if let Some(keys) = self.localstore.get_keys(&self.wallet_id, &keyset_id).await? {
            return Ok(keys);
        }

        let keyset: KeySet = self.client().get_keyset_keys(keyset_id).await?;

        // Legacy ids hash with a scheme this wallet no longer implements
        if !keyset_id.is_legacy() && Id::from(&keyset.keys) != keyset_id {
            return Err(Error::KeysetIdMismatch(keyset_id));
        }

        self.localstore
            .add_keys(&self.wallet_id, keyset.clone())
            .await?;

        Ok(keyset.keys)
    }
}
