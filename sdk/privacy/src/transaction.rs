//! Transaction Builder
//!
//! Assembles one shielded transaction of a single token from spendable notes
//! and requested outputs, then hands it to the prover.
//!
//! ```text
//! Transaction ──attach_exit (≤ 1)──► Transaction
//!      │
//!      └─build_request──► UnprovedTransaction ──prove / prove_dummy──► ProvedTransaction
//! ```
//!
//! Each stage consumes the previous one, so a request can only be proved
//! once; retrying needs a fresh [`Transaction`].

use alloy_primitives::B256;
use ark_bls12_381::Fr;
use futures::future::try_join_all;
use log::{debug, info};
use shadepool_config::{BuilderConfig, ShadepoolConfig};

use crate::abi;
use crate::bound_params::{AdaptId, BoundParams, Chain, UnshieldFlag, hash_bound_params};
use crate::error::{PrivacyError, Result};
use crate::hash::{fr_from_bytes, fr_to_bytes};
use crate::keys::WalletKeyContext;
use crate::memo::OutputType;
use crate::merkle::{MerkleTreeService, MerkleWitness};
use crate::note::{ExitData, TransactNote, UnshieldNote, total_note_values};
use crate::nullifier::derive_nullifier;
use crate::prover::{PrivateInputs, Proof, Prover, PublicInputs, TransactionRequest};
use crate::token::TokenData;
use crate::txo::{Txo, total_spend};

/// Requested transfer outputs per transaction; a fifth slot is kept for change
pub const MAX_TRANSFER_OUTPUTS: usize = 4;

/// A transaction being assembled
#[derive(Debug, Clone)]
pub struct Transaction {
    chain: Chain,
    token: TokenData,
    token_hash: Fr,
    spending_tree: u16,
    utxos: Vec<Txo>,
    outputs: Vec<TransactNote>,
    adapt_id: AdaptId,
    exit: Option<UnshieldNote>,
    memo_max_bytes: usize,
    min_gas_price: u128,
}

impl Transaction {
    pub fn new(
        chain: Chain,
        token: TokenData,
        spending_tree: u16,
        utxos: Vec<Txo>,
        outputs: Vec<TransactNote>,
        adapt_id: AdaptId,
    ) -> Result<Self> {
        let defaults = BuilderConfig::default();
        if outputs.len() > MAX_TRANSFER_OUTPUTS {
            return Err(PrivacyError::TooManyOutputs {
                max: MAX_TRANSFER_OUTPUTS,
                got: outputs.len(),
            });
        }

        Ok(Self {
            chain,
            token_hash: token.hash(),
            token,
            spending_tree,
            utxos,
            outputs,
            adapt_id,
            exit: None,
            memo_max_bytes: defaults.memo_max_bytes,
            min_gas_price: u128::from(defaults.min_gas_price),
        })
    }

    /// Chain and builder settings taken from `config`
    pub fn from_config(
        config: &ShadepoolConfig,
        token: TokenData,
        spending_tree: u16,
        utxos: Vec<Txo>,
        outputs: Vec<TransactNote>,
        adapt_id: AdaptId,
    ) -> Result<Self> {
        let chain = Chain::from(&config.chain);
        Ok(Self::new(chain, token, spending_tree, utxos, outputs, adapt_id)?
            .with_builder_config(&config.builder))
    }

    /// Apply builder settings from configuration
    pub fn with_builder_config(mut self, config: &BuilderConfig) -> Self {
        self.memo_max_bytes = config.memo_max_bytes;
        self.min_gas_price = u128::from(config.min_gas_price);
        self
    }

    /// Gas price floor bound into the proof; must fit in 72 bits
    pub fn with_min_gas_price(mut self, min_gas_price: u128) -> Self {
        self.min_gas_price = min_gas_price;
        self
    }

    /// Send part of the value out of the pool. Allowed once.
    pub fn attach_exit(&mut self, exit: ExitData) -> Result<()> {
        if self.exit.is_some() {
            return Err(PrivacyError::ExitAlreadyAttached);
        }
        if exit.token.hash() != self.token_hash {
            return Err(PrivacyError::TokenMismatch);
        }

        debug!("Attached exit to tree {} transaction", self.spending_tree);
        self.exit = Some(exit.into());
        Ok(())
    }

    pub fn exit_value(&self) -> u128 {
        self.exit.as_ref().map(|e| e.value).unwrap_or(0)
    }

    pub fn unshield_flag(&self) -> UnshieldFlag {
        match &self.exit {
            None => UnshieldFlag::None,
            Some(exit) if exit.allow_override => UnshieldFlag::Override,
            Some(_) => UnshieldFlag::Unshield,
        }
    }

    pub fn token(&self) -> &TokenData {
        &self.token
    }

    /// Derive nullifiers, fetch witnesses, balance value and encrypt outputs.
    ///
    /// Every utxo must live in the spending tree. Witnesses are fetched
    /// concurrently; every input-side and output-side array keeps the order
    /// of `utxos` and of the outputs.
    pub async fn build_request<M, W>(self, merkle_tree: &M, wallet: &W) -> Result<UnprovedTransaction>
    where
        M: MerkleTreeService,
        W: WalletKeyContext,
    {
        let tree = u32::from(self.spending_tree);
        if let Some(utxo) = self.utxos.iter().find(|utxo| utxo.tree != tree) {
            return Err(PrivacyError::TreeMismatch {
                expected: tree,
                got: utxo.tree,
            });
        }
        let chain_id = self.chain.full_network_id()?;
        let unshield = self.unshield_flag();
        let exit_value = self.exit_value();

        let merkle_root = merkle_tree
            .get_root(tree)
            .await
            .map_err(|e| PrivacyError::MerkleRoot {
                tree,
                reason: e.to_string(),
            })?;

        let nullifying_key = wallet.nullifying_key();
        let nullifiers: Vec<Fr> = self
            .utxos
            .iter()
            .map(|utxo| derive_nullifier(&nullifying_key, utxo.position))
            .collect();

        let witnesses: Vec<MerkleWitness> = try_join_all(self.utxos.iter().map(|utxo| async move {
            merkle_tree
                .get_merkle_witness(tree, utxo.position)
                .await
                .map_err(|e| PrivacyError::WitnessFetch {
                    tree,
                    position: utxo.position,
                    reason: e.to_string(),
                })
        }))
        .await?;

        let total_in = total_spend(&self.utxos)?;
        let total_out = total_note_values(&self.outputs)?
            .checked_add(exit_value)
            .ok_or(PrivacyError::ValueOverflow)?;
        let change = total_in
            .checked_sub(total_out)
            .ok_or(PrivacyError::InsufficientFunds {
                total_in,
                total_out,
            })?;

        let own_address = wallet.address_keys();
        let mut outputs = self.outputs;
        if change > 0 {
            debug!("Adding change output");
            outputs.push(TransactNote::create_transfer(
                own_address,
                &own_address,
                change,
                self.token.clone(),
                true,
                OutputType::Change,
                None,
            ));
        }

        let viewing = wallet.viewing_key_pair();
        let commitment_ciphertext = outputs
            .iter()
            .map(|note| note.encrypt(viewing, self.memo_max_bytes))
            .collect::<Result<Vec<_>>>()?;

        let bound_params = BoundParams {
            tree_number: self.spending_tree,
            min_gas_price: self.min_gas_price,
            unshield,
            chain_id,
            adapt_contract: self.adapt_id.contract,
            adapt_params: self.adapt_id.parameters,
            commitment_ciphertext,
        };
        let ledger_bound_params = bound_params.to_abi()?;
        let bound_params_hash = hash_bound_params(&ledger_bound_params);

        let mut commitments_out: Vec<Fr> = outputs.iter().map(TransactNote::hash).collect();
        let mut value_out: Vec<u128> = outputs.iter().map(|note| note.value).collect();
        let mut npk_out: Vec<Fr> = outputs.iter().map(TransactNote::note_public_key).collect();
        if let Some(exit) = &self.exit {
            commitments_out.push(exit.hash());
            value_out.push(exit.value);
            npk_out.push(exit.note_public_key());
        }

        let value_in: Vec<u128> = self.utxos.iter().map(|utxo| utxo.note.value()).collect();
        if value_in.len() == 1 && value_out.len() == 1 && value_in[0] == 0 && value_out[0] == 0 {
            return Err(PrivacyError::NullInputsOutputs);
        }

        let exit_note = self.exit.unwrap_or_else(UnshieldNote::empty);

        info!(
            "Built transaction request: tree={}, inputs={}, outputs={}, unshield={:?}",
            self.spending_tree,
            nullifiers.len(),
            commitments_out.len(),
            unshield
        );

        Ok(UnprovedTransaction {
            request: TransactionRequest {
                public_inputs: PublicInputs {
                    merkle_root,
                    bound_params_hash,
                    nullifiers,
                    commitments_out,
                },
                private_inputs: PrivateInputs {
                    token_hash: self.token_hash,
                    random_in: self
                        .utxos
                        .iter()
                        .map(|utxo| fr_from_bytes(utxo.note.random()))
                        .collect(),
                    value_in,
                    path_elements: witnesses.into_iter().map(|w| w.elements).collect(),
                    leaves_indices: self.utxos.iter().map(|utxo| utxo.position).collect(),
                    value_out,
                    public_key: wallet.spending_public_key(),
                    npk_out,
                    nullifying_key,
                },
                bound_params,
            },
            ledger_bound_params,
            exit_preimage: exit_note.preimage()?,
        })
    }
}

/// A fully assembled request waiting for its proof
#[derive(Debug, Clone)]
pub struct UnprovedTransaction {
    request: TransactionRequest,
    ledger_bound_params: abi::BoundParams,
    exit_preimage: abi::CommitmentPreimage,
}

/// Proof plus the transaction struct submitted to the pool contract
#[derive(Debug, Clone)]
pub struct ProvedTransaction {
    pub proof: Proof,
    pub transaction: abi::Transaction,
}

impl UnprovedTransaction {
    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    pub fn public_inputs(&self) -> &PublicInputs {
        &self.request.public_inputs
    }

    pub fn private_inputs(&self) -> &PrivateInputs {
        &self.request.private_inputs
    }

    pub fn bound_params(&self) -> &BoundParams {
        &self.request.bound_params
    }

    /// Prove with the real backend, reporting progress through `on_progress`
    pub async fn prove<P: Prover>(
        self,
        prover: &P,
        mut on_progress: impl FnMut(f64),
    ) -> Result<ProvedTransaction> {
        let proof = prover
            .prove(&self.request, &mut on_progress)
            .await
            .map_err(|e| PrivacyError::Prover(e.to_string()))?;

        info!(
            "Proved transaction with {} nullifiers",
            self.request.public_inputs.nullifiers.len()
        );
        Ok(self.finalize(prover, proof))
    }

    /// Transaction with a placeholder proof, for gas estimation
    pub fn prove_dummy<P: Prover>(self, prover: &P) -> ProvedTransaction {
        let proof = prover.dummy_prove(&self.request.public_inputs);
        self.finalize(prover, proof)
    }

    fn finalize<P: Prover>(self, prover: &P, proof: Proof) -> ProvedTransaction {
        let public_inputs = &self.request.public_inputs;
        let to_word = |f: &Fr| B256::from(fr_to_bytes(f));

        let transaction = abi::Transaction {
            proof: prover.format_proof(&proof),
            merkleRoot: to_word(&public_inputs.merkle_root),
            nullifiers: public_inputs.nullifiers.iter().map(to_word).collect(),
            commitments: public_inputs.commitments_out.iter().map(to_word).collect(),
            boundParams: self.ledger_bound_params,
            unshieldPreimage: self.exit_preimage,
        };
        ProvedTransaction { proof, transaction }
    }
}
