//! End-to-end tests: canned chain data goes through the indexers into the
//! in-memory ledger, the processor derives wallet state from it, and the
//! resulting rows are checked against the expected lifecycle.

// Built-in deps
// External deps
use ethabi::Token;
use parity_crypto::publickey::{Generator, KeyPair, Random};
use serde_json::json;
use web3::types::{
    Action, ActionType, Block, Bytes, Call, CallResult, CallType as Web3CallType, Create,
    CreateResult, Log, Res, Trace, Transaction, TransactionReceipt,
};
// Workspace deps
use safe_history_config::ProcessorConfig;
use safe_history_contracts::{
    proxy_factory_contract, safe_contract_v1_1_1,
};
use safe_history_eth_client::MockEthereumClient;
use safe_history_types::signature::sign_hash;
use safe_history_types::{
    Address, DecodedCall, InternalTx, Nonce, Operation, SafeContractVersion, SafeStatus, SafeTx,
    H256, U256,
};
// Local deps
use crate::indexers::{
    BlockRangeIndexer, Erc20EventsIndexer, InternalTxIndexer, ProxyFactoryIndexer,
};
use crate::inmemory_storage_interactor::InMemoryStorageInteractor;
use crate::processor::SafeTxProcessor;
use crate::storage_interactor::{
    CursorStream, DecodedInvocation, MultisigTransactionData, StorageInteractor,
};

fn addr(value: u64) -> Address {
    Address::from_low_u64_be(value)
}

/// An address left-padded into a 32-byte word, the way indexed log topics
/// and `abi.encode` carry addresses.
fn address_word(address: Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    H256::from(word)
}

fn hash(value: u64) -> H256 {
    H256::from_low_u64_be(value)
}

fn processor_config() -> ProcessorConfig {
    ProcessorConfig {
        mark_unknown_as_processed: true,
        batch_size: 500,
        poll_interval: 1_000,
    }
}

/// Web3 structures are built from their canonical RPC JSON so the tests do
/// not depend on which fields happen to be optional in the current crate
/// version.
fn block(number: u64) -> Block<H256> {
    serde_json::from_value(json!({
        "hash": hash(number),
        "parentHash": hash(number.saturating_sub(1)),
        "sha3Uncles": H256::zero(),
        "miner": Address::zero(),
        "stateRoot": H256::zero(),
        "transactionsRoot": H256::zero(),
        "receiptsRoot": H256::zero(),
        "number": format!("{:#x}", number),
        "gasUsed": "0x5208",
        "gasLimit": "0xbebc20",
        "extraData": "0x",
        "timestamp": format!("{:#x}", 1_600_000_000u64 + number),
        "difficulty": "0x0",
        "uncles": [],
        "transactions": [],
    }))
    .expect("canned block json")
}

fn transaction(tx_hash: H256, block_number: u64, from: Address, to: Address) -> Transaction {
    serde_json::from_value(json!({
        "hash": tx_hash,
        "nonce": "0x0",
        "blockHash": hash(block_number),
        "blockNumber": format!("{:#x}", block_number),
        "transactionIndex": "0x0",
        "from": from,
        "to": to,
        "value": "0x0",
        "gasPrice": "0x1",
        "gas": "0x7a120",
        "input": "0x",
    }))
    .expect("canned transaction json")
}

fn receipt(tx_hash: H256, block_number: u64, logs: Vec<Log>) -> TransactionReceipt {
    serde_json::from_value(json!({
        "transactionHash": tx_hash,
        "transactionIndex": "0x0",
        "blockHash": hash(block_number),
        "blockNumber": format!("{:#x}", block_number),
        "from": Address::zero(),
        "to": null,
        "cumulativeGasUsed": "0x5208",
        "gasUsed": "0x5208",
        "contractAddress": null,
        "logs": logs,
        "status": "0x1",
        "logsBloom": format!("0x{}", "00".repeat(256)),
    }))
    .expect("canned receipt json")
}

fn log(address: Address, topics: Vec<H256>, data: Vec<u8>, block_number: u64, tx_hash: H256, log_index: u64) -> Log {
    Log {
        address,
        topics,
        data: Bytes(data),
        block_hash: None,
        block_number: Some(block_number.into()),
        transaction_hash: Some(tx_hash),
        transaction_index: Some(0.into()),
        log_index: Some(log_index.into()),
        transaction_log_index: None,
        log_type: None,
        removed: None,
    }
}

fn call_trace(
    tx_hash: H256,
    block_number: u64,
    trace_address: Vec<usize>,
    from: Address,
    to: Address,
    input: Vec<u8>,
    call_type: Web3CallType,
) -> Trace {
    Trace {
        action: Action::Call(Call {
            from,
            to,
            value: U256::zero(),
            gas: U256::from(100_000u64),
            input: Bytes(input),
            call_type,
        }),
        result: Some(Res::Call(CallResult {
            gas_used: U256::zero(),
            output: Bytes(Vec::new()),
        })),
        error: None,
        trace_address,
        subtraces: 0,
        transaction_position: Some(0),
        transaction_hash: Some(tx_hash),
        block_number,
        block_hash: hash(block_number),
        action_type: ActionType::Call,
    }
}

fn create_trace(
    tx_hash: H256,
    block_number: u64,
    trace_address: Vec<usize>,
    from: Address,
    deployed: Address,
) -> Trace {
    Trace {
        action: Action::Create(Create {
            from,
            value: U256::zero(),
            gas: U256::from(1_000_000u64),
            init: Bytes(vec![0x60, 0x80]),
        }),
        result: Some(Res::Create(CreateResult {
            gas_used: U256::zero(),
            code: Bytes(Vec::new()),
            address: deployed,
        })),
        error: None,
        trace_address,
        subtraces: 1,
        transaction_position: Some(0),
        transaction_hash: Some(tx_hash),
        block_number,
        block_hash: hash(block_number),
        action_type: ActionType::Create,
    }
}

fn setup_call_data(owners: &[Address], threshold: u64) -> Vec<u8> {
    safe_contract_v1_1_1()
        .function("setup")
        .unwrap()
        .encode_input(&[
            Token::Array(owners.iter().map(|owner| Token::Address(*owner)).collect()),
            Token::Uint(threshold.into()),
            Token::Address(Address::zero()),
            Token::Bytes(Vec::new()),
            Token::Address(Address::zero()),
            Token::Address(Address::zero()),
            Token::Uint(0u64.into()),
            Token::Address(Address::zero()),
        ])
        .unwrap()
}

fn exec_call_data(safe_tx: &SafeTx, signatures: Vec<u8>) -> Vec<u8> {
    safe_contract_v1_1_1()
        .function("execTransaction")
        .unwrap()
        .encode_input(&[
            Token::Address(safe_tx.to),
            Token::Uint(safe_tx.value),
            Token::Bytes(safe_tx.data.clone()),
            Token::Uint(U256::from(safe_tx.operation as u8)),
            Token::Uint(safe_tx.safe_tx_gas),
            Token::Uint(safe_tx.base_gas),
            Token::Uint(safe_tx.gas_price),
            Token::Address(safe_tx.gas_token),
            Token::Address(safe_tx.refund_receiver),
            Token::Bytes(signatures),
        ])
        .unwrap()
}

fn approve_hash_call_data(hash_to_approve: H256) -> Vec<u8> {
    safe_contract_v1_1_1()
        .function("approveHash")
        .unwrap()
        .encode_input(&[Token::FixedBytes(hash_to_approve.as_bytes().to_vec())])
        .unwrap()
}

fn pre_validated_chunk(owner: Address) -> Vec<u8> {
    let mut chunk = vec![0u8; 65];
    chunk[12..32].copy_from_slice(owner.as_bytes());
    chunk[64] = 1;
    chunk
}

fn owner_address(keypair: &KeyPair) -> Address {
    Address::from_slice(keypair.address().as_bytes())
}

struct Fixture {
    client: MockEthereumClient,
    interactor: InMemoryStorageInteractor,
    factory: Address,
    master_copy: Address,
    safe: Address,
    sender: Address,
}

impl Fixture {
    fn new() -> Self {
        Self {
            client: MockEthereumClient::new(),
            interactor: InMemoryStorageInteractor::new(),
            factory: addr(0xfac),
            master_copy: addr(0xc0de),
            safe: addr(0x5afe),
            sender: addr(0xea0),
        }
    }

    fn processor(&self) -> SafeTxProcessor<MockEthereumClient> {
        SafeTxProcessor::new(self.client.clone(), processor_config())
    }

    fn internal_tx_indexer(&self) -> InternalTxIndexer {
        InternalTxIndexer::new(10_000, 500)
    }

    /// Seeds a proxy-creation transaction and the matching `ProxyCreation`
    /// event at the given block: factory call, proxy deployment and the
    /// delegated `setup` invocation.
    async fn seed_wallet_creation(&self, block_number: u64, owners: &[Address], threshold: u64) {
        let tx_hash = hash(0x71);
        let traces = vec![
            create_trace(tx_hash, block_number, vec![0], self.factory, self.safe),
            call_trace(
                tx_hash,
                block_number,
                vec![0, 0],
                self.safe,
                self.master_copy,
                setup_call_data(owners, threshold),
                Web3CallType::DelegateCall,
            ),
        ];

        self.client.set_block_number(block_number).await;
        self.client.insert_block(block_number, block(block_number)).await;
        self.client
            .insert_transaction(tx_hash, transaction(tx_hash, block_number, self.sender, self.factory))
            .await;
        self.client
            .insert_receipt(tx_hash, receipt(tx_hash, block_number, Vec::new()))
            .await;
        self.client.insert_traces(tx_hash, traces).await;

        let mut event_data = Vec::with_capacity(64);
        event_data.extend_from_slice(address_word(self.safe).as_bytes());
        event_data.extend_from_slice(address_word(self.master_copy).as_bytes());
        let creation_topic = proxy_factory_contract()
            .event("ProxyCreation")
            .unwrap()
            .signature();
        self.client
            .push_log(log(
                self.factory,
                vec![creation_topic],
                event_data,
                block_number,
                tx_hash,
                0,
            ))
            .await;
    }

    /// Seeds an `execTransaction` call at the given block and returns its
    /// transaction hash.
    async fn seed_exec_transaction(
        &self,
        block_number: u64,
        tx_hash: H256,
        exec_data: Vec<u8>,
        receipt_logs: Vec<Log>,
    ) {
        let traces = vec![
            call_trace(
                tx_hash,
                block_number,
                vec![],
                self.sender,
                self.safe,
                exec_data.clone(),
                Web3CallType::Call,
            ),
            call_trace(
                tx_hash,
                block_number,
                vec![0],
                self.safe,
                self.master_copy,
                exec_data,
                Web3CallType::DelegateCall,
            ),
        ];

        self.client.set_block_number(block_number).await;
        self.client.insert_block(block_number, block(block_number)).await;
        self.client
            .insert_transaction(tx_hash, transaction(tx_hash, block_number, self.sender, self.safe))
            .await;
        self.client
            .insert_receipt(tx_hash, receipt(tx_hash, block_number, receipt_logs))
            .await;
        self.client.insert_traces(tx_hash, traces).await;
    }

    async fn index_wallets(&mut self) {
        let mut indexer = ProxyFactoryIndexer::new(50_000);
        self.interactor
            .register_proxy_factory(self.factory, 50)
            .await
            .unwrap();
        indexer
            .index_step(&self.client, &mut self.interactor, 0)
            .await
            .unwrap();
    }

    async fn index_internal_txs(&mut self) {
        let mut indexer = self.internal_tx_indexer();
        indexer
            .index_step(&self.client, &mut self.interactor, 0)
            .await
            .unwrap();
    }

    async fn process_all(&mut self) -> usize {
        self.processor()
            .process_pending(&mut self.interactor)
            .await
            .unwrap()
    }

    fn default_safe_tx(&self, nonce: u64) -> SafeTx {
        SafeTx {
            safe: self.safe,
            to: addr(0x7a47),
            value: U256::from(10u64),
            data: Vec::new(),
            operation: Operation::Call,
            safe_tx_gas: U256::from(50_000u64),
            base_gas: U256::from(20_000u64),
            gas_price: U256::from(1u64),
            gas_token: Address::zero(),
            refund_receiver: Address::zero(),
            nonce: U256::from(nonce),
            version: SafeContractVersion::V1_0_0,
        }
    }
}

#[tokio::test]
async fn fresh_setup_creates_wallet_state() {
    let owners = vec![addr(0xa), addr(0xb), addr(0xc)];
    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 2).await;

    fixture.index_wallets().await;
    assert!(fixture.interactor.safe_is_registered(fixture.safe));

    fixture.index_internal_txs().await;
    // The proxy deployment and the delegated setup call.
    assert_eq!(fixture.interactor.internal_tx_count(), 2);
    assert_eq!(fixture.interactor.decoded_count(), 1);

    fixture.process_all().await;
    let history = fixture.interactor.status_history(fixture.safe);
    assert_eq!(
        history,
        vec![SafeStatus {
            address: fixture.safe,
            owners,
            threshold: 2,
            nonce: Nonce(0),
            master_copy: fixture.master_copy,
        }]
    );
    assert_eq!(fixture.interactor.unprocessed_count(), 0);
}

#[tokio::test]
async fn exec_transaction_happy_path() {
    let first = Random.generate();
    let second = Random.generate();
    let owners = vec![owner_address(&first), owner_address(&second)];

    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 2).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe_tx = fixture.default_safe_tx(0);
    let safe_tx_hash = safe_tx.safe_tx_hash();
    let mut signatures = sign_hash(first.secret(), safe_tx_hash).unwrap();
    signatures.extend(sign_hash(second.secret(), safe_tx_hash).unwrap());

    fixture
        .seed_exec_transaction(101, hash(0x72), exec_call_data(&safe_tx, signatures), Vec::new())
        .await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let stored = fixture
        .interactor
        .multisig_transaction(safe_tx_hash)
        .expect("multisig transaction is stored");
    assert_eq!(stored.safe, fixture.safe);
    assert_eq!(stored.ethereum_tx_hash, Some(hash(0x72)));
    assert_eq!(stored.failed, Some(false));
    assert_eq!(stored.nonce, Nonce(0));

    let confirmations = fixture.interactor.confirmations_for(safe_tx_hash);
    assert_eq!(confirmations.len(), 2);
    for confirmation in &confirmations {
        assert!(owners.contains(&confirmation.data.owner));
        assert!(confirmation.data.signature.is_some());
    }

    let history = fixture.interactor.status_history(fixture.safe);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].nonce, Nonce(0));
    assert_eq!(history[1].nonce, Nonce(1));
}

#[tokio::test]
async fn approve_hash_lands_before_the_transaction() {
    let first = Random.generate();
    let second = Random.generate();
    let owner_a = owner_address(&first);
    let owners = vec![owner_a, owner_address(&second)];

    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 2).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe_tx = fixture.default_safe_tx(0);
    let safe_tx_hash = safe_tx.safe_tx_hash();

    // Owner A approves the hash on-chain before anything else exists.
    let approve_tx = hash(0x73);
    let approve_data = approve_hash_call_data(safe_tx_hash);
    let traces = vec![
        call_trace(approve_tx, 101, vec![], owner_a, fixture.safe, approve_data.clone(), Web3CallType::Call),
        call_trace(approve_tx, 101, vec![0], fixture.safe, fixture.master_copy, approve_data, Web3CallType::DelegateCall),
    ];
    fixture.client.set_block_number(101).await;
    fixture.client.insert_block(101, block(101)).await;
    fixture
        .client
        .insert_transaction(approve_tx, transaction(approve_tx, 101, owner_a, fixture.safe))
        .await;
    fixture
        .client
        .insert_receipt(approve_tx, receipt(approve_tx, 101, Vec::new()))
        .await;
    fixture.client.insert_traces(approve_tx, traces).await;

    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let confirmations = fixture.interactor.confirmations_for(safe_tx_hash);
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].data.owner, owner_a);
    assert_eq!(confirmations[0].data.ethereum_tx_hash, Some(approve_tx));
    assert!(
        !confirmations[0].linked,
        "the confirmed transaction does not exist yet"
    );

    // The execution lands later: A is pre-validated, B signs off-chain.
    let mut signatures = pre_validated_chunk(owner_a);
    signatures.extend(sign_hash(second.secret(), safe_tx_hash).unwrap());
    fixture
        .seed_exec_transaction(102, hash(0x74), exec_call_data(&safe_tx, signatures), Vec::new())
        .await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    assert!(fixture
        .interactor
        .multisig_transaction(safe_tx_hash)
        .is_some());
    let confirmations = fixture.interactor.confirmations_for(safe_tx_hash);
    assert_eq!(confirmations.len(), 2);
    let row_a = confirmations
        .iter()
        .find(|row| row.data.owner == owner_a)
        .expect("confirmation of owner A");
    assert!(row_a.linked, "the pre-existing row is bound to the transaction");
    assert_eq!(row_a.data.ethereum_tx_hash, Some(approve_tx));
    assert!(row_a.data.signature.is_some());
}

#[tokio::test]
async fn wrong_nonce_preindexing_is_repaired() {
    let first = Random.generate();
    let owners = vec![owner_address(&first)];

    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 1).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe_tx = fixture.default_safe_tx(0);
    let safe_tx_hash = safe_tx.safe_tx_hash();
    let exec_tx_hash = hash(0x75);

    // A row indexed earlier against an outdated master copy: same
    // execution tx and nonce, different hash.
    let stale_hash = hash(0xbad);
    fixture
        .interactor
        .seed_multisig_transaction(MultisigTransactionData {
            safe_tx_hash: stale_hash,
            safe: fixture.safe,
            ethereum_tx_hash: Some(exec_tx_hash),
            to: Some(addr(0x7a47)),
            value: U256::from(10u64),
            data: None,
            operation: 0,
            safe_tx_gas: U256::zero(),
            base_gas: U256::zero(),
            gas_price: U256::zero(),
            gas_token: None,
            refund_receiver: None,
            nonce: Nonce(0),
            signatures: None,
            failed: Some(false),
            origin: None,
        });

    let signatures = sign_hash(first.secret(), safe_tx_hash).unwrap();
    fixture
        .seed_exec_transaction(101, exec_tx_hash, exec_call_data(&safe_tx, signatures), Vec::new())
        .await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    assert_eq!(fixture.interactor.multisig_transaction_count(), 1);
    assert!(fixture.interactor.multisig_transaction(stale_hash).is_none());
    assert!(fixture
        .interactor
        .multisig_transaction(safe_tx_hash)
        .is_some());
}

#[tokio::test]
async fn failed_execution_is_recorded_and_nonce_advances() {
    let first = Random.generate();
    let owners = vec![owner_address(&first)];

    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 1).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe_tx = fixture.default_safe_tx(0);
    let safe_tx_hash = safe_tx.safe_tx_hash();
    let exec_tx_hash = hash(0x76);

    // `ExecutionFailure(txHash, payment)` from the wallet.
    let failure_topic = safe_contract_v1_1_1()
        .event("ExecutionFailure")
        .unwrap()
        .signature();
    let mut failure_data = safe_tx_hash.as_bytes().to_vec();
    failure_data.extend_from_slice(&[0u8; 32]);
    let failure_log = log(
        fixture.safe,
        vec![failure_topic],
        failure_data,
        101,
        exec_tx_hash,
        0,
    );

    let signatures = sign_hash(first.secret(), safe_tx_hash).unwrap();
    fixture
        .seed_exec_transaction(
            101,
            exec_tx_hash,
            exec_call_data(&safe_tx, signatures),
            vec![failure_log],
        )
        .await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let stored = fixture
        .interactor
        .multisig_transaction(safe_tx_hash)
        .expect("failed transaction is still stored");
    assert_eq!(stored.failed, Some(true));

    let history = fixture.interactor.status_history(fixture.safe);
    assert_eq!(history.last().unwrap().nonce, Nonce(1));
}

#[tokio::test]
async fn replaying_a_window_is_idempotent() {
    let first = Random.generate();
    let second = Random.generate();
    let owners = vec![owner_address(&first), owner_address(&second)];

    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 2).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe_tx = fixture.default_safe_tx(0);
    let safe_tx_hash = safe_tx.safe_tx_hash();
    let mut signatures = sign_hash(first.secret(), safe_tx_hash).unwrap();
    signatures.extend(sign_hash(second.secret(), safe_tx_hash).unwrap());
    fixture
        .seed_exec_transaction(101, hash(0x77), exec_call_data(&safe_tx, signatures), Vec::new())
        .await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let internal_txs = fixture.interactor.internal_tx_count();
    let decoded = fixture.interactor.decoded_count();
    let statuses = fixture.interactor.status_history(fixture.safe);
    let transactions = fixture.interactor.multisig_transaction_count();

    // Replay the already-covered window element by element; every row must
    // be absorbed.
    let mut indexer = fixture.internal_tx_indexer();
    let monitored = fixture
        .interactor
        .monitored_safes(CursorStream::InternalTxs, u64::max_value(), 500)
        .await
        .unwrap();
    let elements = BlockRangeIndexer::<MockEthereumClient, InMemoryStorageInteractor>::find_relevant_elements(
        &mut indexer,
        &fixture.client,
        &monitored,
        100,
        101,
    )
    .await
    .unwrap();
    assert!(!elements.is_empty());
    for element in elements {
        indexer
            .process_element(&fixture.client, &mut fixture.interactor, element)
            .await
            .unwrap();
    }
    fixture.process_all().await;

    assert_eq!(fixture.interactor.internal_tx_count(), internal_txs);
    assert_eq!(fixture.interactor.decoded_count(), decoded);
    assert_eq!(fixture.interactor.status_history(fixture.safe), statuses);
    assert_eq!(fixture.interactor.multisig_transaction_count(), transactions);
}

#[tokio::test]
async fn cursors_advance_with_the_scanned_window() {
    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &[addr(0xa)], 1).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;

    let monitored = fixture
        .interactor
        .monitored_safes(CursorStream::InternalTxs, u64::max_value(), 500)
        .await
        .unwrap();
    assert_eq!(monitored.len(), 1);
    // The window ended at the chain tip (block 100).
    assert_eq!(monitored[0].cursor_block_number, 101);

    // Nothing new on chain: the step is idle and the cursor holds.
    fixture.index_internal_txs().await;
    let monitored = fixture
        .interactor
        .monitored_safes(CursorStream::InternalTxs, u64::max_value(), 500)
        .await
        .unwrap();
    assert_eq!(monitored[0].cursor_block_number, 101);
}

#[tokio::test]
async fn owner_management_transitions() {
    let owners = vec![addr(0xa), addr(0xb)];
    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &owners, 2).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let processor = fixture.processor();
    let mut next_block = 101;
    let mut invocation_id = 1_000;
    let mut run = |fixture: &mut Fixture, function_name: &str, arguments: serde_json::Value| {
        let invocation = DecodedInvocation {
            id: invocation_id,
            internal_tx: InternalTx {
                ethereum_tx_hash: hash(invocation_id as u64),
                block_number: next_block.into(),
                transaction_index: 0.into(),
                trace_address: vec![0],
                trace_type: safe_history_types::TraceType::Call,
                call_type: safe_history_types::CallType::DelegateCall,
                from: fixture.safe,
                to: Some(fixture.master_copy),
                value: U256::zero(),
                data: vec![0x01, 0x02, 0x03, 0x04],
                contract_address: None,
                error: None,
            },
            call: DecodedCall {
                function_name: function_name.to_string(),
                arguments,
            },
        };
        invocation_id += 1;
        next_block += 1;
        invocation
    };

    // addOwnerWithThreshold
    let invocation = run(
        &mut fixture,
        "addOwnerWithThreshold",
        json!({ "owner": format!("{:?}", addr(0xc)), "_threshold": 3 }),
    );
    processor
        .process_invocation(&mut fixture.interactor, invocation)
        .await
        .unwrap();

    // swapOwner
    let invocation = run(
        &mut fixture,
        "swapOwner",
        json!({
            "prevOwner": format!("{:?}", addr(0xa)),
            "oldOwner": format!("{:?}", addr(0xb)),
            "newOwner": format!("{:?}", addr(0xd)),
        }),
    );
    processor
        .process_invocation(&mut fixture.interactor, invocation)
        .await
        .unwrap();

    // removeOwner
    let invocation = run(
        &mut fixture,
        "removeOwner",
        json!({
            "prevOwner": format!("{:?}", addr(0xa)),
            "owner": format!("{:?}", addr(0xc)),
            "_threshold": 2,
        }),
    );
    processor
        .process_invocation(&mut fixture.interactor, invocation)
        .await
        .unwrap();

    // changeThreshold
    let invocation = run(
        &mut fixture,
        "changeThreshold",
        json!({ "_threshold": 1 }),
    );
    processor
        .process_invocation(&mut fixture.interactor, invocation)
        .await
        .unwrap();

    let history = fixture.interactor.status_history(fixture.safe);
    assert_eq!(history.len(), 5);
    assert_eq!(history[1].owners, vec![addr(0xa), addr(0xb), addr(0xc)]);
    assert_eq!(history[1].threshold, 3);
    assert_eq!(history[2].owners, vec![addr(0xa), addr(0xd), addr(0xc)]);
    assert_eq!(history[3].owners, vec![addr(0xa), addr(0xd)]);
    assert_eq!(history[3].threshold, 2);
    assert_eq!(history[4].threshold, 1);
    // The nonce never moves outside `execTransaction`.
    assert!(history.iter().all(|status| status.nonce == Nonce(0)));
}

#[tokio::test]
async fn unknown_functions_follow_the_configured_semantics() {
    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &[addr(0xa)], 1).await;
    fixture.index_wallets().await;
    fixture.index_internal_txs().await;
    fixture.process_all().await;

    let safe = fixture.safe;
    let master_copy = fixture.master_copy;
    let make_invocation = |id: i64| DecodedInvocation {
        id,
        internal_tx: InternalTx {
            ethereum_tx_hash: hash(id as u64),
            block_number: 101.into(),
            transaction_index: 0.into(),
            trace_address: vec![0],
            trace_type: safe_history_types::TraceType::Call,
            call_type: safe_history_types::CallType::DelegateCall,
            from: safe,
            to: Some(master_copy),
            value: U256::zero(),
            data: vec![0x01, 0x02, 0x03, 0x04],
            contract_address: None,
            error: None,
        },
        call: DecodedCall {
            function_name: "enableModule".to_string(),
            arguments: json!({ "module": format!("{:?}", addr(0xe)) }),
        },
    };

    // Default semantics: mark processed without any effect.
    let successful = fixture
        .processor()
        .process_invocation(&mut fixture.interactor, make_invocation(2_000))
        .await
        .unwrap();
    assert!(!successful);
    assert_eq!(fixture.interactor.status_history(fixture.safe).len(), 1);

    // The stricter variant leaves the invocation pending.
    let strict = SafeTxProcessor::new(
        fixture.client.clone(),
        ProcessorConfig {
            mark_unknown_as_processed: false,
            batch_size: 500,
            poll_interval: 1_000,
        },
    );
    let before = fixture.interactor.unprocessed_count();
    strict
        .process_invocation(&mut fixture.interactor, make_invocation(2_001))
        .await
        .unwrap();
    assert_eq!(fixture.interactor.unprocessed_count(), before);
}

#[tokio::test]
async fn event_indexer_stores_transfers_of_monitored_wallets() {
    let mut fixture = Fixture::new();
    fixture.seed_wallet_creation(100, &[addr(0xa)], 1).await;
    fixture.index_wallets().await;

    let token = addr(0x70ce);
    let other_wallet = addr(0xeee);
    let transfer_topic = *safe_history_types::TRANSFER_TOPIC;

    // An ERC-721 transfer to the monitored wallet and an unrelated one.
    fixture
        .client
        .push_log(log(
            token,
            vec![
                transfer_topic,
                address_word(addr(0x1)),
                address_word(fixture.safe),
                hash(77),
            ],
            Vec::new(),
            100,
            hash(0x80),
            1,
        ))
        .await;
    fixture
        .client
        .push_log(log(
            token,
            vec![
                transfer_topic,
                address_word(addr(0x1)),
                address_word(other_wallet),
                hash(78),
            ],
            Vec::new(),
            100,
            hash(0x80),
            2,
        ))
        .await;

    let mut indexer = Erc20EventsIndexer::new(50_000, 500);
    indexer
        .index_step(&fixture.client, &mut fixture.interactor, 0)
        .await
        .unwrap();

    assert_eq!(fixture.interactor.event_count(), 1);
    let tokens = fixture
        .interactor
        .erc721_tokens_transferred_to(fixture.safe)
        .await
        .unwrap();
    assert_eq!(tokens, vec![(token, U256::from(77u64))]);
}

#[tokio::test]
async fn collectibles_report_currently_owned_tokens() {
    use crate::collectibles::CollectiblesService;
    use safe_history_contracts::erc721_contract;

    let mut fixture = Fixture::new();
    let token = addr(0x70ce);
    let owner = fixture.safe;

    // Two tokens were transferred in; one has since left the wallet.
    let transfer_topic = *safe_history_types::TRANSFER_TOPIC;
    for (token_id, log_index) in &[(77u64, 1u64), (78u64, 2u64)] {
        fixture
            .client
            .push_log(log(
                token,
                vec![
                    transfer_topic,
                    address_word(addr(0x1)),
                    address_word(owner),
                    hash(*token_id),
                ],
                Vec::new(),
                100,
                hash(0x81),
                *log_index,
            ))
            .await;
    }
    fixture.interactor.register_safe(owner, None, 100).await.unwrap();
    fixture.client.set_block_number(100).await;
    let mut indexer = Erc20EventsIndexer::new(50_000, 500);
    indexer
        .index_step(&fixture.client, &mut fixture.interactor, 0)
        .await
        .unwrap();

    let erc721 = erc721_contract();
    let owner_of = erc721.function("ownerOf").unwrap();
    let token_uri = erc721.function("tokenURI").unwrap();
    let name = erc721.function("name").unwrap();
    let symbol = erc721.function("symbol").unwrap();

    let owner_word = |address: Address| address_word(address).as_bytes().to_vec();
    // Token 77 still belongs to the wallet, token 78 moved on.
    fixture
        .client
        .set_call_result(
            token,
            owner_of.encode_input(&[Token::Uint(77u64.into())]).unwrap(),
            owner_word(owner),
        )
        .await;
    fixture
        .client
        .set_call_result(
            token,
            owner_of.encode_input(&[Token::Uint(78u64.into())]).unwrap(),
            owner_word(addr(0x2)),
        )
        .await;
    fixture
        .client
        .set_call_result(
            token,
            token_uri.encode_input(&[Token::Uint(77u64.into())]).unwrap(),
            ethabi::encode(&[Token::String("https://example.org/77".into())]),
        )
        .await;
    fixture
        .client
        .set_call_result(
            token,
            name.encode_input(&[]).unwrap(),
            ethabi::encode(&[Token::String("Test Collection".into())]),
        )
        .await;
    fixture
        .client
        .set_call_result(
            token,
            symbol.encode_input(&[]).unwrap(),
            ethabi::encode(&[Token::String("TST".into())]),
        )
        .await;

    let mut service = CollectiblesService::new(fixture.client.clone());
    let collectibles = service
        .get_collectibles(&mut fixture.interactor, owner)
        .await
        .unwrap();

    assert_eq!(collectibles.len(), 1);
    assert_eq!(collectibles[0].token_id, U256::from(77u64));
    assert_eq!(collectibles[0].token_name, "Test Collection");
    assert_eq!(collectibles[0].token_symbol, "TST");
    assert_eq!(
        collectibles[0].uri.as_deref(),
        Some("https://example.org/77")
    );
}
