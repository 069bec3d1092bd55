//! Tests for the storage crate run against an actual empty Postgres
//! database and are therefore disabled by default; the `db_test` feature
//! flag enables them. Each test runs inside a database transaction that is
//! never committed, so no cleanup between runs is required.

// External imports
use bigdecimal::BigDecimal;
// Local imports
use crate::ethereum::records::{NewBlock, NewEthereumTx};
use crate::multisig::records::NewMultisigTransaction;
use crate::StorageProcessor;

async fn test_storage<'a>() -> StorageProcessor<'a> {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    StorageProcessor::establish_connection(&database_url)
        .await
        .expect("database connection")
}

fn sample_block(number: i64) -> NewBlock {
    NewBlock {
        number,
        hash: vec![number as u8; 32],
        parent_hash: vec![(number - 1) as u8; 32],
        timestamp: 1_600_000_000 + number,
        gas_limit: 12_500_000,
        gas_used: 3_000_000,
    }
}

fn sample_tx(hash: &[u8], block_number: i64) -> NewEthereumTx {
    NewEthereumTx {
        tx_hash: hash.to_vec(),
        block_number,
        transaction_index: 0,
        from_address: vec![0x11; 20],
        to_address: Some(vec![0x22; 20]),
        nonce: 0,
        value: BigDecimal::from(0),
        gas: 100_000,
        gas_price: BigDecimal::from(1),
        data: None,
        status: Some(1),
        gas_used: Some(60_000),
    }
}

#[tokio::test]
async fn block_and_transaction_round_trip() {
    let mut storage = test_storage().await;
    let mut transaction = storage.start_transaction().await.unwrap();

    transaction
        .ethereum_schema()
        .save_block(sample_block(100))
        .await
        .unwrap();
    // Replay must be absorbed.
    transaction
        .ethereum_schema()
        .save_block(sample_block(100))
        .await
        .unwrap();

    let stored = transaction
        .ethereum_schema()
        .get_block(100)
        .await
        .unwrap()
        .expect("block is stored");
    assert_eq!(stored.hash, vec![100u8; 32]);

    transaction
        .ethereum_schema()
        .save_transaction(sample_tx(&[0xaa; 32], 100))
        .await
        .unwrap();
    let tx = transaction
        .ethereum_schema()
        .get_transaction(&[0xaa; 32])
        .await
        .unwrap();
    assert!(tx.is_some());
}

#[tokio::test]
async fn per_safe_listing_orders_by_nonce() {
    let mut storage = test_storage().await;
    let mut transaction = storage.start_transaction().await.unwrap();

    let safe_address = vec![0x5f; 20];
    let multisig_tx = |safe_tx_hash: Vec<u8>, nonce: i64| NewMultisigTransaction {
        safe_tx_hash,
        safe_address: safe_address.clone(),
        ethereum_tx_hash: None,
        to_address: Some(vec![0x22; 20]),
        value: BigDecimal::from(0),
        data: None,
        operation: 0,
        safe_tx_gas: BigDecimal::from(100_000),
        base_gas: BigDecimal::from(20_000),
        gas_price: BigDecimal::from(1),
        gas_token: None,
        refund_receiver: None,
        nonce,
        signatures: None,
        failed: None,
        origin: None,
    };

    // Submitted out of nonce order, duplicates absorbed.
    transaction
        .multisig_schema()
        .insert_offchain_transaction(multisig_tx(vec![0xa2; 32], 2))
        .await
        .unwrap();
    transaction
        .multisig_schema()
        .insert_offchain_transaction(multisig_tx(vec![0xa1; 32], 1))
        .await
        .unwrap();
    transaction
        .multisig_schema()
        .insert_offchain_transaction(multisig_tx(vec![0xa1; 32], 1))
        .await
        .unwrap();

    let listed = transaction
        .multisig_schema()
        .transactions_for_safe(&safe_address)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].nonce, 1);
    assert_eq!(listed[1].nonce, 2);

    // A different wallet sees nothing.
    let other = transaction
        .multisig_schema()
        .transactions_for_safe(&[0x99; 20])
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn confirmation_is_bound_to_a_later_transaction() {
    let mut storage = test_storage().await;
    let mut transaction = storage.start_transaction().await.unwrap();

    let safe_tx_hash = vec![0x5a; 32];
    let owner = vec![0x0a; 20];

    // The confirmation arrives before the transaction it confirms.
    transaction
        .multisig_schema()
        .upsert_confirmation(&safe_tx_hash, &owner, Some(vec![0xbb; 32]), None)
        .await
        .unwrap();
    let dangling = transaction
        .multisig_schema()
        .confirmations_for(&safe_tx_hash)
        .await
        .unwrap();
    assert_eq!(dangling.len(), 1);
    assert!(dangling[0].multisig_transaction_id.is_none());

    transaction
        .multisig_schema()
        .upsert_from_chain(NewMultisigTransaction {
            safe_tx_hash: safe_tx_hash.clone(),
            safe_address: vec![0x5f; 20],
            ethereum_tx_hash: Some(vec![0xbb; 32]),
            to_address: Some(vec![0x22; 20]),
            value: BigDecimal::from(0),
            data: None,
            operation: 0,
            safe_tx_gas: BigDecimal::from(100_000),
            base_gas: BigDecimal::from(20_000),
            gas_price: BigDecimal::from(1),
            gas_token: None,
            refund_receiver: None,
            nonce: 0,
            signatures: None,
            failed: Some(false),
            origin: None,
        })
        .await
        .unwrap();

    let linked = transaction
        .multisig_schema()
        .confirmations_for(&safe_tx_hash)
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(
        linked[0].multisig_transaction_id.as_deref(),
        Some(&safe_tx_hash[..])
    );
}
