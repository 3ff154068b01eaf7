use alloy_primitives::{Address, B256, U256, aliases::U72};
use shadepool_privacy::{
    AdaptId, Chain, ErrorKind, ExitData, MemoryMerkleTree, MerkleWitness, OutputType,
    PrivacyError, Proof, Prover, ShieldNote, SpendableNote, TokenData, TokenType, TransactNote,
    Transaction, TransactionRequest, Txo, UnshieldFlag, UnshieldNote, WalletKeyContext, WalletKeys,
    derive_nullifier,
};

struct FakeProver;

impl Prover for FakeProver {
    async fn prove(
        &self,
        request: &TransactionRequest,
        on_progress: &mut dyn FnMut(f64),
    ) -> anyhow::Result<Proof> {
        on_progress(0.5);
        on_progress(1.0);
        Ok(Proof {
            pi_a: [U256::from(request.public_inputs.nullifiers.len()), U256::from(1)],
            ..Proof::zero()
        })
    }
}

struct BrokenProver;

impl Prover for BrokenProver {
    async fn prove(
        &self,
        _request: &TransactionRequest,
        _on_progress: &mut dyn FnMut(f64),
    ) -> anyhow::Result<Proof> {
        anyhow::bail!("proving key missing")
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn token() -> TokenData {
    TokenData::erc20(Address::repeat_byte(0x22))
}

fn chain() -> Chain {
    Chain { kind: 0, id: 1 }
}

fn wallet(seed: u8) -> WalletKeys {
    WalletKeys::from_bytes([seed; 32], [seed.wrapping_add(100); 32])
}

fn spendable(tree: &mut MemoryMerkleTree, owner: &WalletKeys, value: u128, seed: u8) -> Txo {
    let note = ShieldNote::new(
        owner.address_keys().master_public_key,
        &[seed; 16],
        value,
        token(),
    )
    .unwrap();
    let position = tree.insert(0, note.hash()).unwrap();
    Txo {
        tree: 0,
        position,
        txid: B256::repeat_byte(seed),
        timestamp: None,
        spend_txid: None,
        note: SpendableNote::Shield(note),
    }
}

fn transfer(to: &WalletKeys, from: &WalletKeys, value: u128) -> TransactNote {
    TransactNote::create_transfer(
        to.address_keys(),
        &from.address_keys(),
        value,
        token(),
        false,
        OutputType::Transfer,
        Some("thanks".to_string()),
    )
}

#[tokio::test]
async fn change_output_balances_the_transaction() {
    init_logging();
    let sender = wallet(1);
    let receiver = wallet(2);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 1000, 7);
    let spent_hash = utxo.note.hash();

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&receiver, &sender, 400)],
        AdaptId::default(),
    )
    .unwrap();

    let unproved = tx.build_request(&tree, &sender).await.unwrap();
    let public = unproved.public_inputs();
    let private = unproved.private_inputs();

    assert_eq!(public.nullifiers.len(), 1);
    assert_eq!(public.commitments_out.len(), 2);
    assert_eq!(private.value_out, vec![400, 600]);
    assert_eq!(private.value_in, vec![1000]);
    assert_eq!(unproved.bound_params().commitment_ciphertext.len(), 2);
    assert_eq!(unproved.bound_params().unshield, UnshieldFlag::None);
    assert_eq!(
        public.bound_params_hash,
        unproved.bound_params().hash().unwrap()
    );

    let witness = MerkleWitness {
        elements: private.path_elements[0].clone(),
        indices: private.leaves_indices[0],
    };
    assert!(witness.verify(&spent_hash, &public.merkle_root));

    // Receiver opens the transfer; sender opens its own change.
    let ciphertexts = &unproved.bound_params().commitment_ciphertext;
    let received = TransactNote::decrypt(
        &ciphertexts[0],
        &receiver,
        &[],
        Some(&public.commitments_out[0]),
    )
    .unwrap();
    assert_eq!(received.value, 400);
    assert_eq!(received.memo_text.as_deref(), Some("thanks"));

    let change = TransactNote::decrypt(
        &ciphertexts[1],
        &sender,
        &[],
        Some(&public.commitments_out[1]),
    )
    .unwrap();
    assert_eq!(change.value, 600);
    assert_eq!(change.output_type, Some(OutputType::Change));
}

#[tokio::test]
async fn prove_produces_ledger_transaction() {
    let sender = wallet(1);
    let receiver = wallet(2);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 1000, 7);

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&receiver, &sender, 400)],
        AdaptId::default(),
    )
    .unwrap();
    let unproved = tx
        .with_min_gas_price(5)
        .build_request(&tree, &sender)
        .await
        .unwrap();
    let nullifiers = unproved.public_inputs().nullifiers.clone();

    let mut progress = Vec::new();
    let proved = unproved
        .prove(&FakeProver, |p| progress.push(p))
        .await
        .unwrap();

    assert_eq!(progress, vec![0.5, 1.0]);
    assert_eq!(proved.transaction.nullifiers.len(), nullifiers.len());
    assert_eq!(proved.transaction.commitments.len(), 2);
    assert_eq!(proved.transaction.proof.a.x, U256::from(1));
    assert_eq!(proved.transaction.boundParams.treeNumber, 0);
    assert_eq!(proved.transaction.boundParams.minGasPrice, U72::from(5));
    assert_eq!(
        proved.transaction.unshieldPreimage,
        UnshieldNote::empty().preimage().unwrap()
    );
}

#[tokio::test]
async fn dummy_proof_is_zero() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 50, 3);

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&wallet(2), &sender, 50)],
        AdaptId::default(),
    )
    .unwrap();
    let proved = tx
        .build_request(&tree, &sender)
        .await
        .unwrap()
        .prove_dummy(&FakeProver);

    assert_eq!(proved.proof, Proof::zero());
    assert_eq!(proved.transaction.commitments.len(), 1);
}

#[tokio::test]
async fn prover_failure_is_external() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 50, 3);

    let tx = Transaction::new(chain(), token(), 0, vec![utxo], vec![], AdaptId::default()).unwrap();
    let err = tx
        .build_request(&tree, &sender)
        .await
        .unwrap()
        .prove(&BrokenProver, |_| {})
        .await
        .unwrap_err();

    assert_eq!(err, PrivacyError::Prover("proving key missing".to_string()));
    assert_eq!(err.kind(), ErrorKind::External);
}

#[tokio::test]
async fn exact_spend_has_no_change() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 1000, 7);

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&wallet(2), &sender, 1000)],
        AdaptId::default(),
    )
    .unwrap();
    let unproved = tx.build_request(&tree, &sender).await.unwrap();

    assert_eq!(unproved.private_inputs().value_out, vec![1000]);
    assert_eq!(unproved.public_inputs().commitments_out.len(), 1);
}

#[tokio::test]
async fn insufficient_funds() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 100, 7);

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&wallet(2), &sender, 400)],
        AdaptId::default(),
    )
    .unwrap();
    let err = tx.build_request(&tree, &sender).await.unwrap_err();

    assert_eq!(
        err,
        PrivacyError::InsufficientFunds {
            total_in: 100,
            total_out: 400
        }
    );
    assert_eq!(err.kind(), ErrorKind::Arithmetic);
}

#[test]
fn too_many_outputs() {
    let sender = wallet(1);
    let outputs = (0..5).map(|_| transfer(&wallet(2), &sender, 1)).collect();

    let err = Transaction::new(chain(), token(), 0, vec![], outputs, AdaptId::default()).unwrap_err();
    assert_eq!(err, PrivacyError::TooManyOutputs { max: 4, got: 5 });
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn exit_attaches_once() {
    let mut tx = Transaction::new(chain(), token(), 0, vec![], vec![], AdaptId::default()).unwrap();
    let exit = ExitData {
        to_address: Address::repeat_byte(0x33),
        value: 10,
        token: token(),
        allow_override: false,
    };

    tx.attach_exit(exit.clone()).unwrap();
    assert_eq!(tx.attach_exit(exit).unwrap_err(), PrivacyError::ExitAlreadyAttached);
}

#[test]
fn exit_token_must_match() {
    let mut tx = Transaction::new(chain(), token(), 0, vec![], vec![], AdaptId::default()).unwrap();
    let other = TokenData::new(TokenType::Erc721, Address::repeat_byte(0x22), U256::from(1)).unwrap();
    let err = tx
        .attach_exit(ExitData {
            to_address: Address::repeat_byte(0x33),
            value: 1,
            token: other,
            allow_override: false,
        })
        .unwrap_err();
    assert_eq!(err, PrivacyError::TokenMismatch);
}

#[tokio::test]
async fn exit_is_last_output() {
    init_logging();
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 1000, 7);
    let destination = Address::repeat_byte(0x33);

    let mut tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&wallet(2), &sender, 300)],
        AdaptId::default(),
    )
    .unwrap();
    tx.attach_exit(ExitData {
        to_address: destination,
        value: 200,
        token: token(),
        allow_override: true,
    })
    .unwrap();

    let unproved = tx.build_request(&tree, &sender).await.unwrap();
    assert_eq!(unproved.private_inputs().value_out, vec![300, 500, 200]);
    assert_eq!(unproved.bound_params().commitment_ciphertext.len(), 2);
    assert_eq!(unproved.bound_params().unshield, UnshieldFlag::Override);

    let exit = UnshieldNote::new(destination, 200, token(), true);
    assert_eq!(unproved.public_inputs().commitments_out[2], exit.hash());

    let proved = unproved.prove_dummy(&FakeProver);
    assert_eq!(proved.transaction.unshieldPreimage, exit.preimage().unwrap());
}

#[tokio::test]
async fn null_inputs_and_outputs_rejected() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 0, 7);

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![utxo],
        vec![transfer(&wallet(2), &sender, 0)],
        AdaptId::default(),
    )
    .unwrap();
    let err = tx.build_request(&tree, &sender).await.unwrap_err();
    assert_eq!(err, PrivacyError::NullInputsOutputs);
}

#[tokio::test]
async fn zero_input_with_valued_output() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let empty = spendable(&mut tree, &sender, 0, 7);
    let funded = spendable(&mut tree, &sender, 30, 8);

    let lone = Transaction::new(
        chain(),
        token(),
        0,
        vec![empty.clone()],
        vec![transfer(&wallet(2), &sender, 10)],
        AdaptId::default(),
    )
    .unwrap();
    assert!(matches!(
        lone.build_request(&tree, &sender).await.unwrap_err(),
        PrivacyError::InsufficientFunds { .. }
    ));

    let backed = Transaction::new(
        chain(),
        token(),
        0,
        vec![empty, funded],
        vec![transfer(&wallet(2), &sender, 10)],
        AdaptId::default(),
    )
    .unwrap();
    let unproved = backed.build_request(&tree, &sender).await.unwrap();
    assert_eq!(unproved.private_inputs().value_out, vec![10, 20]);
}

#[tokio::test]
async fn input_arrays_follow_utxo_order() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxos: Vec<Txo> = (0..3)
        .map(|i| spendable(&mut tree, &sender, 10 * (i as u128 + 1), i + 10))
        .collect();
    let reordered = vec![utxos[2].clone(), utxos[0].clone(), utxos[1].clone()];

    let tx = Transaction::new(chain(), token(), 0, reordered.clone(), vec![], AdaptId::default())
        .unwrap();
    let unproved = tx.build_request(&tree, &sender).await.unwrap();

    let nk = sender.nullifying_key();
    let expected: Vec<_> = reordered.iter().map(|u| derive_nullifier(&nk, u.position)).collect();
    assert_eq!(unproved.public_inputs().nullifiers, expected);
    assert_eq!(unproved.private_inputs().leaves_indices, vec![2, 0, 1]);
    assert_eq!(unproved.private_inputs().value_in, vec![30, 10, 20]);

    for (i, utxo) in reordered.iter().enumerate() {
        let witness = MerkleWitness {
            elements: unproved.private_inputs().path_elements[i].clone(),
            indices: unproved.private_inputs().leaves_indices[i],
        };
        assert!(witness.verify(&utxo.note.hash(), &unproved.public_inputs().merkle_root));
    }
}

#[tokio::test]
async fn missing_witness_is_external() {
    let sender = wallet(1);
    let tree = MemoryMerkleTree::new();
    let mut other = MemoryMerkleTree::new();
    let utxo = spendable(&mut other, &sender, 10, 1);

    let tx = Transaction::new(chain(), token(), 0, vec![utxo], vec![], AdaptId::default()).unwrap();
    let err = tx.build_request(&tree, &sender).await.unwrap_err();
    assert!(matches!(err, PrivacyError::WitnessFetch { tree: 0, position: 0, .. }));
    assert_eq!(err.kind(), ErrorKind::External);
}

#[tokio::test]
async fn config_sets_chain_and_memo_limit() {
    let sender = wallet(1);
    let receiver = wallet(2);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 10, 4);

    let mut config = shadepool_config::ShadepoolConfig::default();
    config.chain.id = 137;
    config.builder.memo_max_bytes = 3;
    config.builder.min_gas_price = 2_000_000_000;
    config.builder.show_sender_address_to_recipient = true;
    config.contracts.relay_adapt = Address::repeat_byte(0x55).to_string();

    let output = TransactNote::create_configured_transfer(
        receiver.address_keys(),
        &sender.address_keys(),
        10,
        token(),
        OutputType::Transfer,
        Some("thanks".to_string()),
        &config.builder,
    );
    let adapt_id = AdaptId::relay_adapt(&config.contracts, B256::repeat_byte(0x66)).unwrap();
    let tx = Transaction::from_config(&config, token(), 0, vec![utxo], vec![output], adapt_id)
        .unwrap();
    let unproved = tx.build_request(&tree, &sender).await.unwrap();
    assert_eq!(unproved.bound_params().chain_id, 137);
    assert_eq!(unproved.bound_params().min_gas_price, 2_000_000_000);
    assert_eq!(unproved.bound_params().adapt_contract, Address::repeat_byte(0x55));
    assert_eq!(unproved.bound_params().adapt_params, B256::repeat_byte(0x66));

    let received = TransactNote::decrypt(
        &unproved.bound_params().commitment_ciphertext[0],
        &receiver,
        &[],
        None,
    )
    .unwrap();
    assert_eq!(received.memo_text.as_deref(), Some("tha"));
    assert_eq!(
        received.sender_master_public_key,
        Some(sender.address_keys().master_public_key)
    );
}

#[tokio::test]
async fn utxo_from_other_tree_rejected() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let kept = spendable(&mut tree, &sender, 10, 5);
    let mut stray = spendable(&mut tree, &sender, 20, 6);
    stray.tree = 1;

    let tx = Transaction::new(
        chain(),
        token(),
        0,
        vec![kept.clone(), stray],
        vec![],
        AdaptId::default(),
    )
    .unwrap();
    let err = tx.build_request(&tree, &sender).await.unwrap_err();
    assert_eq!(err, PrivacyError::TreeMismatch { expected: 0, got: 1 });
    assert_eq!(err.kind(), ErrorKind::Validation);

    let tx = Transaction::new(chain(), token(), 1, vec![kept], vec![], AdaptId::default()).unwrap();
    let err = tx.build_request(&tree, &sender).await.unwrap_err();
    assert_eq!(err, PrivacyError::TreeMismatch { expected: 1, got: 0 });
}

#[tokio::test]
async fn oversized_chain_id_rejected() {
    let sender = wallet(1);
    let mut tree = MemoryMerkleTree::new();
    let utxo = spendable(&mut tree, &sender, 10, 5);

    let wide = Chain {
        kind: 0,
        id: 1u64 << 56,
    };
    let tx = Transaction::new(wide, token(), 0, vec![utxo], vec![], AdaptId::default()).unwrap();
    assert_eq!(
        tx.build_request(&tree, &sender).await.unwrap_err(),
        PrivacyError::ValueOverflow
    );
}
