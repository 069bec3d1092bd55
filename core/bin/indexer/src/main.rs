// Built-in deps
use std::cell::RefCell;
use std::str::FromStr;
use std::time::Duration;
// External deps
use futures::{channel::mpsc, SinkExt, StreamExt};
use tokio::task::JoinHandle;
// Workspace deps
use safe_history_config::{ProcessorConfig, SafeHistoryConfig};
use safe_history_eth_client::EthereumClient;
use safe_history_storage::ConnectionPool;
use safe_history_types::Address;
// Local deps
use safe_history_core::database_storage_interactor::DatabaseStorageInteractor;
use safe_history_core::indexers::{
    Backoff, BlockRangeIndexer, Erc20EventsIndexer, InternalTxIndexer, ProxyFactoryIndexer,
};
use safe_history_core::processor::SafeTxProcessor;
use safe_history_core::storage_interactor::StorageInteractor;
use safe_history_core::wait_for_tasks;

/// The deployed proxy factories wallets are created through, with their
/// deployment blocks. Nothing relevant exists before those.
const PROXY_FACTORIES: [(&str, u64); 3] = [
    // v1.0.0
    ("12302fE9c02ff50939BaAaaf415fc226C078613C", 7_450_116),
    // v1.1.0
    ("50e55Af101C777bA7A1d560a774A82eF002ced9F", 8_915_731),
    // v1.1.1
    ("76E2cFc1F5Fa8F6a5b3fC4c8F4788F0116861F9B", 9_084_503),
];

async fn seed_proxy_factories(pool: &ConnectionPool) -> anyhow::Result<()> {
    let mut interactor = DatabaseStorageInteractor::new(pool.clone());
    for (address, deployed_at) in &PROXY_FACTORIES {
        let address = Address::from_str(address).expect("well-known factory address");
        interactor.register_proxy_factory(address, *deployed_at).await?;
    }
    Ok(())
}

/// Spawns one indexing stream as a periodic task. Each tick catches the
/// stream up to the safe chain tip; transient failures abandon the current
/// window and back off.
fn start_indexer<X>(
    mut indexer: X,
    client: EthereumClient,
    pool: ConnectionPool,
    poll_interval: Duration,
    confirmations: u64,
) -> JoinHandle<()>
where
    X: BlockRangeIndexer<EthereumClient, DatabaseStorageInteractor> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interactor = DatabaseStorageInteractor::new(pool);
        let mut backoff = Backoff::new();
        let mut timer = tokio::time::interval(poll_interval);
        loop {
            timer.tick().await;
            loop {
                match indexer
                    .index_step(&client, &mut interactor, confirmations)
                    .await
                {
                    Ok(outcome) => {
                        backoff.reset();
                        if outcome.scanned_until.is_none() {
                            break;
                        }
                    }
                    Err(err) => {
                        vlog::warn!("indexing step failed: {}", err);
                        tokio::time::sleep(backoff.next_delay()).await;
                        break;
                    }
                }
            }
        }
    })
}

fn start_processor(
    client: EthereumClient,
    pool: ConnectionPool,
    config: ProcessorConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poll_interval = config.poll_interval();
        let processor = SafeTxProcessor::new(client, config);
        let mut interactor = DatabaseStorageInteractor::new(pool);
        let mut backoff = Backoff::new();
        let mut timer = tokio::time::interval(poll_interval);
        loop {
            timer.tick().await;
            match processor.process_pending(&mut interactor).await {
                Ok(processed) => {
                    backoff.reset();
                    if processed > 0 {
                        vlog::info!("processed {} decoded invocations", processed);
                    }
                }
                Err(err) => {
                    vlog::warn!("processing round failed: {}", err);
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vlog::init();
    let config = SafeHistoryConfig::from_env();

    vlog::info!("Starting the safe history indexer");
    let pool = ConnectionPool::new(config.db.url.clone(), config.db.pool_size);
    let client = EthereumClient::from_config(&config.eth_client)?;

    seed_proxy_factories(&pool).await?;

    // Handle ctrl+c
    let (stop_signal_sender, mut stop_signal_receiver) = mpsc::channel(256);
    {
        let stop_signal_sender = RefCell::new(stop_signal_sender);
        ctrlc::set_handler(move || {
            let mut sender = stop_signal_sender.borrow_mut();
            futures::executor::block_on(sender.send(true)).expect("crtlc signal send");
        })
        .expect("Error setting Ctrl-C handler");
    }

    let poll_interval = config.eth_watch.poll_interval();
    let confirmations = config.eth_watch.reorg_blocks;

    let mut task_futures = Vec::new();
    if config.eth_watch.l2_network {
        // No tracing support: wallets are discovered through events only.
        vlog::info!("L2 network, the internal-tx stream is disabled");
    } else {
        task_futures.push(start_indexer(
            InternalTxIndexer::new(
                config.indexer.internal_txs_block_process_limit,
                config.indexer.address_batch_size,
            ),
            client.clone(),
            pool.clone(),
            poll_interval,
            confirmations,
        ));
    }
    task_futures.push(start_indexer(
        Erc20EventsIndexer::new(
            config.indexer.events_block_process_limit,
            config.indexer.address_batch_size,
        ),
        client.clone(),
        pool.clone(),
        poll_interval,
        confirmations,
    ));
    task_futures.push(start_indexer(
        ProxyFactoryIndexer::new(config.indexer.proxy_factory_block_process_limit),
        client.clone(),
        pool.clone(),
        poll_interval,
        confirmations,
    ));
    task_futures.push(start_processor(client, pool, config.processor.clone()));

    tokio::select! {
        _ = wait_for_tasks(task_futures) => {
            // We don't need to do anything here, since tasks panic on exit.
        },
        _ = stop_signal_receiver.next() => {
            vlog::warn!("Stop signal received, shutting down");
        }
    };

    Ok(())
}
