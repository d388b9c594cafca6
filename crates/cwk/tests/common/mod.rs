//! In-process mint for driving the wallet in tests
//!
//! Signs with real keys over the real BDHKE primitives, tracks issued
//! blinded messages and spent `Y`s, and rejects double spends and
//! duplicate outputs the way a production mint does.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cwk::cashu_core::dhke::{sign_message, verify_message};
use cwk::cashu_core::nuts::{
    BlindSignature, BlindedMessage, CheckStateRequest, CheckStateResponse, CurrencyUnit, Id,
    KeySet, KeysetResponse, KeySetInfo, Keys, MeltBolt11Request,
    MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MintBolt11Request,
    MintBolt11Response, MintInfo, MintQuoteBolt11Request, MintQuoteBolt11Response, MintQuoteState,
    Proof, ProofState, RestoreRequest, RestoreResponse, SecretKey, State, SwapRequest,
    SwapResponse,
};
use cwk::cashu_core::{Amount, Bolt11Invoice};
use cwk::{Error, MintConnector};

/// Lightning fee the fake mint charges out of every melt's fee reserve
pub const MELT_LIGHTNING_FEE: u64 = 1;

struct FakeKeyset {
    info: KeySetInfo,
    secret_keys: BTreeMap<Amount, SecretKey>,
    keys: Keys,
}

#[derive(Default)]
struct MintState {
    signed: HashMap<[u8; 33], BlindSignature>,
    spent: HashMap<[u8; 33], ()>,
    mint_quotes: HashMap<String, (Amount, MintQuoteState)>,
    melt_quotes: HashMap<String, (Amount, Amount, MeltQuoteState)>,
}

/// In-process mint
pub struct FakeMint {
    keyset: FakeKeyset,
    state: Mutex<MintState>,
    quote_counter: AtomicU64,
}

impl std::fmt::Debug for FakeMint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeMint")
            .field("keyset_id", &self.keyset.info.id)
            .finish()
    }
}

impl FakeMint {
    pub fn new(unit: CurrencyUnit, input_fee_ppk: u64) -> Self {
        let mut secret_keys = BTreeMap::new();
        let mut public_keys = BTreeMap::new();

        for order in 0..21 {
            let amount = Amount::from(1_u64 << order);
            let secret_key = SecretKey::generate();
            public_keys.insert(amount, secret_key.public_key());
            secret_keys.insert(amount, secret_key);
        }

        let keys = Keys::new(public_keys);
        let id = Id::from(&keys);

        Self {
            keyset: FakeKeyset {
                info: KeySetInfo {
                    id,
                    unit,
                    active: true,
                    input_fee_ppk,
                },
                secret_keys,
                keys,
            },
            state: Mutex::new(MintState::default()),
            quote_counter: AtomicU64::new(0),
        }
    }

    pub fn keyset_id(&self) -> Id {
        self.keyset.info.id
    }

    /// Number of outputs this mint has ever signed
    pub fn signed_count(&self) -> usize {
        self.state.lock().unwrap().signed.len()
    }

    fn next_quote_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.quote_counter.fetch_add(1, Ordering::SeqCst))
    }

    fn protocol(code: i32, detail: &str) -> Error {
        Error::Protocol {
            code: Some(code),
            detail: detail.to_string(),
        }
    }

    /// Sign one output, rejecting blinded messages seen before
    fn sign_output(
        &self,
        state: &mut MintState,
        output: &BlindedMessage,
        amount: Amount,
    ) -> Result<BlindSignature, Error> {
        let b_bytes = output.blinded_secret.to_bytes();
        if state.signed.contains_key(&b_bytes) {
            return Err(Self::protocol(11003, "outputs have already been signed before"));
        }

        let secret_key = self
            .keyset
            .secret_keys
            .get(&amount)
            .ok_or_else(|| Self::protocol(10002, "no key for amount"))?;

        let c = sign_message(secret_key, &output.blinded_secret)
            .map_err(|_| Self::protocol(10001, "could not sign"))?;

        let signature = BlindSignature {
            amount,
            keyset_id: self.keyset.info.id,
            c,
            dleq: None,
        };

        state.signed.insert(b_bytes, signature.clone());
        Ok(signature)
    }

    /// Verify and burn inputs, rejecting already-spent proofs
    fn spend_inputs(&self, state: &mut MintState, inputs: &[Proof]) -> Result<Amount, Error> {
        let mut total = Amount::ZERO;

        for proof in inputs {
            let y = proof.y().map_err(|_| Self::protocol(10001, "bad secret"))?;
            if state.spent.contains_key(&y.to_bytes()) {
                return Err(Self::protocol(11001, "Token already spent"));
            }

            let secret_key = self
                .keyset
                .secret_keys
                .get(&proof.amount)
                .ok_or_else(|| Self::protocol(10002, "no key for amount"))?;
            verify_message(secret_key, proof.c, proof.secret.as_bytes())
                .map_err(|_| Self::protocol(10001, "Token not verified"))?;

            total = total + proof.amount;
        }

        for proof in inputs {
            let y = proof.y().expect("verified above");
            state.spent.insert(y.to_bytes(), ());
        }

        Ok(total)
    }

    fn input_fee(&self, inputs: &[Proof]) -> Amount {
        Amount::from((self.keyset.info.input_fee_ppk * inputs.len() as u64).div_ceil(1000))
    }
}

#[async_trait]
impl MintConnector for FakeMint {
    async fn get_mint_info(&self) -> Result<MintInfo, Error> {
        Ok(MintInfo {
            name: Some("fake mint".to_string()),
            ..Default::default()
        })
    }

    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error> {
        Ok(KeysetResponse {
            keysets: vec![self.keyset.info.clone()],
        })
    }

    async fn get_mint_keys(&self) -> Result<Vec<KeySet>, Error> {
        Ok(vec![KeySet {
            id: self.keyset.info.id,
            unit: self.keyset.info.unit.clone(),
            keys: self.keyset.keys.clone(),
        }])
    }

    async fn get_keyset_keys(&self, keyset_id: Id) -> Result<KeySet, Error> {
        if keyset_id != self.keyset.info.id {
            return Err(Self::protocol(12001, "keyset not found"));
        }
        Ok(KeySet {
            id: self.keyset.info.id,
            unit: self.keyset.info.unit.clone(),
            keys: self.keyset.keys.clone(),
        })
    }

    async fn post_mint_quote(
        &self,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let quote_id = self.next_quote_id("mint-quote");
        // The invoice is considered paid immediately
        self.state
            .lock()
            .unwrap()
            .mint_quotes
            .insert(quote_id.clone(), (request.amount, MintQuoteState::Paid));

        Ok(MintQuoteBolt11Response {
            quote: quote_id,
            request: "lnbc1fake".to_string(),
            state: MintQuoteState::Paid,
            expiry: None,
        })
    }

    async fn get_mint_quote_status(
        &self,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let state = self.state.lock().unwrap();
        let (_, quote_state) = state
            .mint_quotes
            .get(quote_id)
            .ok_or_else(|| Self::protocol(20005, "quote not found"))?;

        Ok(MintQuoteBolt11Response {
            quote: quote_id.to_string(),
            request: "lnbc1fake".to_string(),
            state: *quote_state,
            expiry: None,
        })
    }

    async fn post_mint(&self, request: MintBolt11Request) -> Result<MintBolt11Response, Error> {
        let mut state = self.state.lock().unwrap();

        let (amount, quote_state) = state
            .mint_quotes
            .get(&request.quote)
            .copied()
            .ok_or_else(|| Self::protocol(20005, "quote not found"))?;

        match quote_state {
            MintQuoteState::Paid => {}
            MintQuoteState::Issued => {
                return Err(Self::protocol(20002, "quote already issued"));
            }
            MintQuoteState::Unpaid => {
                return Err(Self::protocol(20001, "quote not paid"));
            }
        }

        let outputs_total = Amount::try_sum(request.outputs.iter().map(|o| o.amount))
            .map_err(|_| Self::protocol(11006, "amount out of range"))?;
        if outputs_total != amount {
            return Err(Self::protocol(11005, "transaction unbalanced"));
        }

        let signatures = request
            .outputs
            .iter()
            .map(|output| self.sign_output(&mut state, output, output.amount))
            .collect::<Result<Vec<_>, _>>()?;

        state
            .mint_quotes
            .insert(request.quote, (amount, MintQuoteState::Issued));

        Ok(MintBolt11Response { signatures })
    }

    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let invoice = Bolt11Invoice::from_str(&request.request)
            .map_err(|_| Self::protocol(20006, "invalid invoice"))?;
        let amount = Amount::from(
            invoice
                .amount_milli_satoshis()
                .ok_or_else(|| Self::protocol(20006, "amountless invoice"))?
                / 1000,
        );
        let fee_reserve = Amount::from(2);

        let quote_id = self.next_quote_id("melt-quote");
        self.state.lock().unwrap().melt_quotes.insert(
            quote_id.clone(),
            (amount, fee_reserve, MeltQuoteState::Unpaid),
        );

        Ok(MeltQuoteBolt11Response {
            quote: quote_id,
            amount,
            fee_reserve,
            state: MeltQuoteState::Unpaid,
            expiry: None,
            payment_preimage: None,
            change: None,
        })
    }

    async fn get_melt_quote_status(
        &self,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let state = self.state.lock().unwrap();
        let (amount, fee_reserve, quote_state) = state
            .melt_quotes
            .get(quote_id)
            .copied()
            .ok_or_else(|| Self::protocol(20005, "quote not found"))?;

        Ok(MeltQuoteBolt11Response {
            quote: quote_id.to_string(),
            amount,
            fee_reserve,
            state: quote_state,
            expiry: None,
            payment_preimage: None,
            change: None,
        })
    }

    async fn post_melt(&self, request: MeltBolt11Request) -> Result<MeltQuoteBolt11Response, Error> {
        let mut state = self.state.lock().unwrap();

        let (amount, fee_reserve, _) = state
            .melt_quotes
            .get(&request.quote)
            .copied()
            .ok_or_else(|| Self::protocol(20005, "quote not found"))?;

        let inputs_total = self.spend_inputs(&mut state, &request.inputs)?;

        if inputs_total < amount + fee_reserve {
            return Err(Self::protocol(11005, "transaction unbalanced"));
        }

        // "Pay" the invoice, consuming part of the reserve
        let change_total = inputs_total - amount - Amount::from(MELT_LIGHTNING_FEE);

        let change = match request.outputs {
            Some(outputs) if change_total > Amount::ZERO => {
                let change_amounts = change_total.split();
                // More change denominations than blank outputs cannot be
                // expressed; the wallet sized the blanks to prevent this
                assert!(change_amounts.len() <= outputs.len());

                let signatures = outputs
                    .iter()
                    .zip(change_amounts)
                    .map(|(output, amount)| self.sign_output(&mut state, output, amount))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(signatures)
            }
            _ => None,
        };

        state.melt_quotes.insert(
            request.quote.clone(),
            (amount, fee_reserve, MeltQuoteState::Paid),
        );

        Ok(MeltQuoteBolt11Response {
            quote: request.quote,
            amount,
            fee_reserve,
            state: MeltQuoteState::Paid,
            expiry: None,
            payment_preimage: Some("f".repeat(64)),
            change,
        })
    }

    async fn post_swap(&self, request: SwapRequest) -> Result<SwapResponse, Error> {
        let mut state = self.state.lock().unwrap();

        let inputs_total = self.spend_inputs(&mut state, &request.inputs)?;
        let outputs_total = Amount::try_sum(request.outputs.iter().map(|o| o.amount))
            .map_err(|_| Self::protocol(11006, "amount out of range"))?;

        let fee = self.input_fee(&request.inputs);
        if outputs_total + fee != inputs_total {
            return Err(Self::protocol(11005, "transaction unbalanced"));
        }

        let signatures = request
            .outputs
            .iter()
            .map(|output| self.sign_output(&mut state, output, output.amount))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SwapResponse { signatures })
    }

    async fn post_check_state(
        &self,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let state = self.state.lock().unwrap();

        let states = request
            .ys
            .into_iter()
            .map(|y| ProofState {
                y,
                state: if state.spent.contains_key(&y.to_bytes()) {
                    State::Spent
                } else {
                    State::Unspent
                },
                witness: None,
            })
            .collect();

        Ok(CheckStateResponse { states })
    }

    async fn post_restore(&self, request: RestoreRequest) -> Result<RestoreResponse, Error> {
        let state = self.state.lock().unwrap();

        let mut outputs = Vec::new();
        let mut signatures = Vec::new();

        for output in request.outputs {
            if let Some(signature) = state.signed.get(&output.blinded_secret.to_bytes()) {
                outputs.push(output);
                signatures.push(signature.clone());
            }
        }

        Ok(RestoreResponse {
            outputs,
            signatures,
        })
    }
}
