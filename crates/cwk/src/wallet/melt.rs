//! Melting: burn proofs to have the mint pay a Lightning invoice

use std::str::FromStr;

use cashu_core::amount::to_unit;
use cashu_core::dhke::construct_proofs;
use cashu_core::nuts::{
    CurrencyUnit, MeltBolt11Request, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
    MeltQuoteState, PreMintSecrets, Proofs, ProofsMethods, State,
};
use cashu_core::util::unix_time;
use cashu_core::{Amount, Bolt11Invoice};
use tracing::instrument;

use super::types::{MeltQuote, Melted, ProofInfo};
use crate::lightning_address::{LightningAddress, LnurlClient};
use crate::{Error, Wallet};

impl Wallet {
    /// Request a quote to pay a bolt11 invoice
    #[instrument(skip(self, request))]
    pub async fn melt_quote(&self, request: String) -> Result<MeltQuote, Error> {
        let invoice = Bolt11Invoice::from_str(&request)
            .map_err(|err| Error::Invoice(err.to_string()))?;

        let amount_msat = invoice
            .amount_milli_satoshis()
            .ok_or(Error::InvoiceAmountUndefined)?;

        let amount_quote_unit = to_unit(amount_msat, &CurrencyUnit::Msat, &self.unit)?;

        let quote_request = MeltQuoteBolt11Request {
            request: request.clone(),
            unit: self.unit.clone(),
        };

        let quote_res = self.client().post_melt_quote(quote_request).await?;

        if quote_res.amount != amount_quote_unit {
            tracing::warn!(
                "Mint quoted {} for an invoice of {}",
                quote_res.amount,
                amount_quote_unit
            );
            return Err(Error::IncorrectQuoteAmount {
                expected: amount_quote_unit,
                got: quote_res.amount,
            });
        }

        let quote = MeltQuote {
            id: quote_res.quote,
            amount: quote_res.amount,
            request,
            unit: self.unit.clone(),
            fee_reserve: quote_res.fee_reserve,
            state: quote_res.state,
            expiry: quote_res.expiry.unwrap_or(0),
            payment_preimage: quote_res.payment_preimage,
        };

        self.localstore
            .add_melt_quote(&self.wallet_id, quote.clone())
            .await?;

        Ok(quote)
    }

    /// Request a melt quote for a lightning address
    ///
    /// Resolves the address, fetches an invoice for `amount` and quotes it
    /// like any other bolt11 melt.
    #[instrument(skip(self, comment))]
    pub async fn melt_lightning_address_quote(
        &self,
        address: &str,
        amount: Amount,
        comment: Option<&str>,
    ) -> Result<MeltQuote, Error> {
        let address = LightningAddress::from_str(address)?;

        let lnurl = LnurlClient::new();
        let pay_request = lnurl.resolve(&address).await?;

        let amount_msat = to_unit(amount, &self.unit, &CurrencyUnit::Msat)?;
        let invoice = lnurl
            .get_invoice(&pay_request, amount_msat.into(), comment)
            .await?;

        self.melt_quote(invoice).await
    }

    /// Check the state of a melt quote with the mint
    #[instrument(skip(self))]
    pub async fn melt_quote_state(
        &self,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let response = self.client().get_melt_quote_status(quote_id).await?;

        match self
            .localstore
            .get_melt_quote(&self.wallet_id, quote_id)
            .await?
        {
            Some(mut quote) => {
                quote.state = response.state;
                self.localstore
                    .add_melt_quote(&self.wallet_id, quote)
                    .await?;
            }
            None => {
                tracing::info!("Melt quote {} unknown to this wallet", quote_id);
            }
        }

        Ok(response)
    }

    /// Melt specific proofs against a quote
    ///
    /// Inputs must cover `amount + fee_reserve`. Change outputs for the
    /// unspent reserve are derived deterministically with counters advanced
    /// before the network call. On PAID, the spent-marking of inputs and
    /// the insert of change commit as one transaction.
    #[instrument(skip(self, inputs))]
    pub async fn melt_proofs(&self, quote_id: &str, inputs: Proofs) -> Result<Melted, Error> {
        let xpriv = self.ensure_safe_state()?;

        let quote = self
            .localstore
            .get_melt_quote(&self.wallet_id, quote_id)
            .await?
            .ok_or_else(|| Error::UnknownQuote(quote_id.to_string()))?;

        if quote.expiry != 0 && quote.expiry < unix_time() {
            return Err(Error::ExpiredQuote(quote.expiry));
        }

        let inputs_total = inputs.total_amount()?;
        let total_needed = quote.amount + quote.fee_reserve;
        if inputs_total < total_needed {
            return Err(Error::InsufficientFunds {
                have: inputs_total,
                need: total_needed,
            });
        }

        let active_keyset = self.get_active_keyset().await?;
        let keys = self.load_keyset_keys(active_keyset.id).await?;

        // Blank change outputs; the mint assigns amounts when the payment
        // settles. Counters committed before the network call.
        let change_capacity = inputs_total - quote.amount;
        let blank_count = if change_capacity > Amount::ZERO {
            ((u64::from(change_capacity) as f64).log2().ceil() as u32).max(1)
        } else {
            0
        };

        let start_counter = if blank_count > 0 {
            let next = self
                .localstore
                .increment_keyset_counter(&self.wallet_id, &active_keyset.id, blank_count)
                .await?;
            next - blank_count
        } else {
            0
        };

        let premint_secrets =
            PreMintSecrets::from_xpriv_blank(active_keyset.id, start_counter, xpriv, change_capacity)?;

        let input_ys = inputs.ys()?;
        self.localstore
            .update_proofs_state(&self.wallet_id, input_ys.clone(), State::Pending)
            .await?;

        let request = MeltBolt11Request {
            quote: quote_id.to_string(),
            inputs: inputs.clone(),
            outputs: (!premint_secrets.is_empty()).then(|| premint_secrets.blinded_messages()),
        };

        let response = match self.client().post_melt(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("Melt failed: {}", err);
                // Reclaim whatever the mint did not take; best effort
                if let Err(reclaim_err) = self.reclaim_unspent(inputs).await {
                    tracing::warn!("Could not reclaim melt inputs: {}", reclaim_err);
                }
                return Err(err);
            }
        };

        self.finalize_melt(&quote, premint_secrets, response, input_ys, inputs_total, &keys)
            .await
    }

    /// Melt, selecting inputs from the wallet's unspent proofs
    #[instrument(skip(self))]
    pub async fn melt(&self, quote_id: &str) -> Result<Melted, Error> {
        let quote = self
            .localstore
            .get_melt_quote(&self.wallet_id, quote_id)
            .await?
            .ok_or_else(|| Error::UnknownQuote(quote_id.to_string()))?;

        let available = self.get_unspent_proofs().await?;
        let inputs = Wallet::select_proofs(quote.amount + quote.fee_reserve, available)?;

        self.melt_proofs(quote_id, inputs).await
    }

    async fn finalize_melt(
        &self,
        quote: &MeltQuote,
        premint_secrets: PreMintSecrets,
        response: MeltQuoteBolt11Response,
        input_ys: Vec<cashu_core::nuts::PublicKey>,
        inputs_total: Amount,
        keys: &cashu_core::nuts::Keys,
    ) -> Result<Melted, Error> {
        if response.state != MeltQuoteState::Paid {
            // Lightning payment still in flight (or failed); inputs stay
            // pending until a state sync resolves them
            return Ok(Melted {
                state: response.state,
                preimage: response.payment_preimage,
                change: Proofs::new(),
                amount: quote.amount,
                fee_paid: Amount::ZERO,
            });
        }

        let change = match response.change {
            Some(change_signatures) => {
                let count = change_signatures.len().min(premint_secrets.len());
                construct_proofs(
                    change_signatures.into_iter().take(count).collect(),
                    premint_secrets.rs()[..count].to_vec(),
                    premint_secrets.secrets()[..count].to_vec(),
                    keys,
                )?
            }
            None => Proofs::new(),
        };

        let change_total = change.total_amount()?;

        let change_infos = change
            .iter()
            .map(|proof| ProofInfo::new(proof.clone(), State::Unspent, quote.unit.clone()))
            .collect::<Result<Vec<ProofInfo>, _>>()?;

        // One transaction: change in, inputs spent
        self.localstore
            .update_proofs(&self.wallet_id, change_infos, input_ys)
            .await?;

        self.localstore
            .remove_melt_quote(&self.wallet_id, &quote.id)
            .await?;

        Ok(Melted {
            state: response.state,
            preimage: response.payment_preimage,
            change,
            amount: quote.amount,
            fee_paid: inputs_total - quote.amount - change_total,
        })
    }
}
