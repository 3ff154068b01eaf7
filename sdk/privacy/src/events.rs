//! Pool Event Decoding
//!
//! Turns raw ledger logs into wallet-side commitment and nullifier records.
//!
//! Pool-entry logs come in two shapes sharing the event name `Shield`: the
//! current one with a per-note fee array, and the legacy one without it. The
//! shape of every log is tagged explicitly by the caller ([`ShieldLogShape`])
//! and each tag is decoded strictly with its own signature.
//!
//! Batches are all-or-nothing: one undecodable log rejects the whole batch.

use alloy_primitives::{Address, B256, LogData, U256};
use alloy_sol_types::SolEvent;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use shadepool_config::ScanConfig;

use crate::abi;
use crate::codec::{CommitmentCiphertext, decode_commitment_ciphertext};
use crate::error::{PrivacyError, Result};
use crate::hash::{fr_from_bytes, fr_to_bytes};
use crate::note::derive_commitment_hash;
use crate::token::TokenData;

/// A ledger log with the transaction context it was emitted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub txid: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub data: LogData,
}

/// Event signature a pool-entry log was emitted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShieldLogShape {
    Current,
    LegacyPreMar23,
}

impl ShieldLogShape {
    /// Shape of a pool-entry log at `block_number` per the scan cutoff
    pub fn for_block(block_number: u64, scan: &ScanConfig) -> Self {
        if scan.is_legacy_shield_block(block_number) {
            Self::LegacyPreMar23
        } else {
            Self::Current
        }
    }
}

/// Pool-entry log tagged with its shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldLog {
    pub shape: ShieldLogShape,
    pub log: RawLog,
}

impl ShieldLog {
    pub fn tagged(log: RawLog, scan: &ScanConfig) -> Self {
        Self {
            shape: ShieldLogShape::for_block(log.block_number, scan),
            log,
        }
    }
}

/// One note entering the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldCommitment {
    pub hash: B256,
    pub preimage: abi::CommitmentPreimage,
    pub encrypted_bundle: [B256; 3],
    pub shield_key: B256,
    pub fee: Option<U256>,
}

/// Commitments from one pool-entry log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldEventRecord {
    pub txid: B256,
    pub block_number: u64,
    pub tree_number: u32,
    pub start_position: u64,
    pub commitments: Vec<ShieldCommitment>,
}

/// One transfer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactCommitment {
    pub hash: B256,
    pub ciphertext: CommitmentCiphertext,
}

/// Commitments from one transfer log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactEventRecord {
    pub txid: B256,
    pub block_number: u64,
    pub tree_number: u32,
    pub start_position: u64,
    pub commitments: Vec<TransactCommitment>,
}

/// Value leaving the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnshieldRecord {
    pub txid: B256,
    pub block_number: u64,
    pub to_address: Address,
    pub token: TokenData,
    pub amount: U256,
    pub fee: U256,
    /// Position of the log within its block
    pub event_log_index: u64,
}

/// A spent note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NullifierRecord {
    pub txid: B256,
    pub block_number: u64,
    pub tree_number: u16,
    pub nullifier: B256,
}

fn ensure_args(log: &RawLog, event: &'static str) -> Result<()> {
    if log.data.data.is_empty() {
        return Err(PrivacyError::MissingEventArgs(event));
    }
    Ok(())
}

fn decode<E: SolEvent>(log: &RawLog, event: &'static str) -> Result<E> {
    ensure_args(log, event)?;
    E::decode_log_data(&log.data, true).map_err(|e| PrivacyError::EventDecode {
        event,
        reason: e.to_string(),
    })
}

fn to_u32(value: U256, event: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| PrivacyError::EventDecode {
        event,
        reason: format!("tree number out of range: {value}"),
    })
}

fn to_u64(value: U256, event: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| PrivacyError::EventDecode {
        event,
        reason: format!("position out of range: {value}"),
    })
}

fn shield_commitment_hash(preimage: &abi::CommitmentPreimage) -> Result<B256> {
    let token = TokenData::from_abi(&preimage.token)?;
    let hash = derive_commitment_hash(
        &fr_from_bytes(preimage.npk.as_slice()),
        &token.hash(),
        preimage.value.to::<u128>(),
    );
    Ok(B256::from(fr_to_bytes(&hash)))
}

/// Decode one pool-entry log with the signature its tag names
pub fn format_shield_event(log: &ShieldLog) -> Result<ShieldEventRecord> {
    const EVENT: &str = "Shield";

    let (tree_number, start_position, preimages, ciphertexts, fees) = match log.shape {
        ShieldLogShape::Current => {
            let event: abi::Shield = decode(&log.log, EVENT)?;
            (
                event.treeNumber,
                event.startPosition,
                event.commitments,
                event.shieldCiphertext,
                event.fees,
            )
        }
        ShieldLogShape::LegacyPreMar23 => {
            let event: abi::legacy::Shield = decode(&log.log, EVENT)?;
            debug!(
                "Decoded legacy Shield log at block {} (tx {})",
                log.log.block_number, log.log.txid
            );
            (
                event.treeNumber,
                event.startPosition,
                event.commitments.into_iter().map(Into::into).collect(),
                event.shieldCiphertext.into_iter().map(Into::into).collect(),
                Vec::new(),
            )
        }
    };

    if preimages.len() != ciphertexts.len() {
        return Err(PrivacyError::ArgumentCountMismatch {
            event: EVENT,
            expected: preimages.len(),
            got: ciphertexts.len(),
        });
    }
    // An empty fee array means the log carries no fees.
    if !fees.is_empty() && fees.len() != preimages.len() {
        return Err(PrivacyError::ArgumentCountMismatch {
            event: EVENT,
            expected: preimages.len(),
            got: fees.len(),
        });
    }

    let commitments = preimages
        .into_iter()
        .zip(ciphertexts)
        .enumerate()
        .map(|(i, (preimage, ciphertext))| {
            Ok(ShieldCommitment {
                hash: shield_commitment_hash(&preimage)?,
                preimage,
                encrypted_bundle: ciphertext.encryptedBundle,
                shield_key: ciphertext.shieldKey,
                fee: fees.get(i).copied(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ShieldEventRecord {
        txid: log.log.txid,
        block_number: log.log.block_number,
        tree_number: to_u32(tree_number, EVENT)?,
        start_position: to_u64(start_position, EVENT)?,
        commitments,
    })
}

pub fn format_transact_event(log: &RawLog) -> Result<TransactEventRecord> {
    const EVENT: &str = "Transact";

    let event: abi::Transact = decode(log, EVENT)?;
    if event.hash.len() != event.ciphertext.len() {
        return Err(PrivacyError::ArgumentCountMismatch {
            event: EVENT,
            expected: event.hash.len(),
            got: event.ciphertext.len(),
        });
    }

    let commitments = event
        .hash
        .iter()
        .zip(&event.ciphertext)
        .map(|(hash, ciphertext)| TransactCommitment {
            hash: *hash,
            ciphertext: decode_commitment_ciphertext(ciphertext),
        })
        .collect();

    Ok(TransactEventRecord {
        txid: log.txid,
        block_number: log.block_number,
        tree_number: to_u32(event.treeNumber, EVENT)?,
        start_position: to_u64(event.startPosition, EVENT)?,
        commitments,
    })
}

pub fn format_unshield_event(log: &RawLog) -> Result<UnshieldRecord> {
    const EVENT: &str = "Unshield";

    let event: abi::Unshield = decode(log, EVENT)?;
    Ok(UnshieldRecord {
        txid: log.txid,
        block_number: log.block_number,
        to_address: event.to,
        token: TokenData::from_abi(&event.token)?,
        amount: event.amount,
        fee: event.fee,
        event_log_index: log.log_index,
    })
}

pub fn format_nullifier_events(log: &RawLog) -> Result<Vec<NullifierRecord>> {
    const EVENT: &str = "Nullified";

    let event: abi::Nullified = decode(log, EVENT)?;
    Ok(event
        .nullifier
        .iter()
        .map(|nullifier| NullifierRecord {
            txid: log.txid,
            block_number: log.block_number,
            tree_number: event.treeNumber,
            nullifier: *nullifier,
        })
        .collect())
}

fn process_batch<L, T>(
    event: &'static str,
    logs: &[L],
    format: impl Fn(&L) -> Result<T>,
) -> Result<Vec<T>> {
    let records = logs
        .iter()
        .map(&format)
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| warn!("Rejecting {event} batch of {} logs: {e}", logs.len()))?;
    debug!("Processed {} {event} logs", records.len());
    Ok(records)
}

/// Decode a batch of pool-entry logs, in log order
pub fn process_shield_events(logs: &[ShieldLog]) -> Result<Vec<ShieldEventRecord>> {
    process_batch("Shield", logs, format_shield_event)
}

pub fn process_transact_events(logs: &[RawLog]) -> Result<Vec<TransactEventRecord>> {
    process_batch("Transact", logs, format_transact_event)
}

pub fn process_unshield_events(logs: &[RawLog]) -> Result<Vec<UnshieldRecord>> {
    process_batch("Unshield", logs, format_unshield_event)
}

pub fn process_nullifier_events(logs: &[RawLog]) -> Result<Vec<NullifierRecord>> {
    Ok(process_batch("Nullified", logs, format_nullifier_events)?
        .into_iter()
        .flatten()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, aliases::U120};

    fn preimage(value: u64) -> abi::CommitmentPreimage {
        abi::CommitmentPreimage {
            npk: B256::repeat_byte(0x01),
            token: abi::TokenData {
                tokenType: 0,
                tokenAddress: Address::repeat_byte(0x22),
                tokenSubID: U256::ZERO,
            },
            value: U120::from(value),
        }
    }

    fn raw(data: LogData) -> RawLog {
        RawLog {
            txid: B256::repeat_byte(0xaa),
            block_number: 100,
            log_index: 3,
            data,
        }
    }

    fn shield_log(fees: Vec<U256>) -> RawLog {
        let event = abi::Shield {
            treeNumber: U256::from(0),
            startPosition: U256::from(5),
            commitments: vec![preimage(10), preimage(20)],
            shieldCiphertext: vec![
                abi::ShieldCiphertext {
                    encryptedBundle: [B256::repeat_byte(1); 3],
                    shieldKey: B256::repeat_byte(2),
                };
                2
            ],
            fees,
        };
        raw(event.encode_log_data())
    }

    #[test]
    fn test_shield_event_with_fees() {
        let log = ShieldLog {
            shape: ShieldLogShape::Current,
            log: shield_log(vec![U256::from(1), U256::from(2)]),
        };
        let record = format_shield_event(&log).unwrap();
        assert_eq!(record.start_position, 5);
        assert_eq!(record.commitments.len(), 2);
        assert_eq!(record.commitments[1].fee, Some(U256::from(2)));
    }

    #[test]
    fn test_shield_event_empty_fees_means_none() {
        let log = ShieldLog {
            shape: ShieldLogShape::Current,
            log: shield_log(Vec::new()),
        };
        let record = format_shield_event(&log).unwrap();
        assert!(record.commitments.iter().all(|c| c.fee.is_none()));
    }

    #[test]
    fn test_shield_fee_count_mismatch() {
        let log = ShieldLog {
            shape: ShieldLogShape::Current,
            log: shield_log(vec![U256::from(1)]),
        };
        assert_eq!(
            format_shield_event(&log).unwrap_err(),
            PrivacyError::ArgumentCountMismatch {
                event: "Shield",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_missing_args_rejects_batch() {
        let good = ShieldLog {
            shape: ShieldLogShape::Current,
            log: shield_log(Vec::new()),
        };
        let empty = ShieldLog {
            shape: ShieldLogShape::Current,
            log: raw(LogData::new_unchecked(vec![abi::Shield::SIGNATURE_HASH], Bytes::new())),
        };
        assert_eq!(
            process_shield_events(&[good, empty]).unwrap_err(),
            PrivacyError::MissingEventArgs("Shield")
        );
    }

    #[test]
    fn test_wrong_shape_tag_is_rejected() {
        let log = ShieldLog {
            shape: ShieldLogShape::LegacyPreMar23,
            log: shield_log(Vec::new()),
        };
        assert!(matches!(
            format_shield_event(&log).unwrap_err(),
            PrivacyError::EventDecode { event: "Shield", .. }
        ));
    }

    #[test]
    fn test_shape_from_cutoff() {
        let scan = ScanConfig {
            legacy_shield_cutoff_block: Some(1_000),
        };
        assert_eq!(ShieldLogShape::for_block(999, &scan), ShieldLogShape::LegacyPreMar23);
        assert_eq!(ShieldLogShape::for_block(1_000, &scan), ShieldLogShape::Current);
        assert_eq!(
            ShieldLogShape::for_block(1, &ScanConfig::default()),
            ShieldLogShape::Current
        );
    }

    #[test]
    fn test_transact_count_mismatch() {
        let event = abi::Transact {
            treeNumber: U256::ZERO,
            startPosition: U256::ZERO,
            hash: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
            ciphertext: vec![abi::CommitmentCiphertext {
                ciphertext: [B256::ZERO; 4],
                blindedSenderViewingKey: B256::ZERO,
                blindedReceiverViewingKey: B256::ZERO,
                annotationData: Bytes::new(),
                memo: Bytes::new(),
            }],
        };
        let err = format_transact_event(&raw(event.encode_log_data())).unwrap_err();
        assert_eq!(
            err,
            PrivacyError::ArgumentCountMismatch {
                event: "Transact",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_unshield_carries_log_index() {
        let event = abi::Unshield {
            to: Address::repeat_byte(0x33),
            token: preimage(1).token,
            amount: U256::from(90),
            fee: U256::from(1),
        };
        let record = format_unshield_event(&raw(event.encode_log_data())).unwrap();
        assert_eq!(record.event_log_index, 3);
        assert_eq!(record.amount, U256::from(90));
    }

    #[test]
    fn test_nullifier_records_per_nullifier() {
        let event = abi::Nullified {
            treeNumber: 2,
            nullifier: vec![B256::repeat_byte(7), B256::repeat_byte(8)],
        };
        let records = process_nullifier_events(&[raw(event.encode_log_data())]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].nullifier, B256::repeat_byte(8));
        assert_eq!(records[0].tree_number, 2);
    }
}
