//! Minera um intervalo de blocos e confirma os candidatos em um node de arquivo.
//!
//! ```bash
//! cargo run -p ethernity-tod --example run_pipeline -- <CONFIG_JSON>
//! ```
//!
//! Ctrl+C interrompe a execução; os vereditos já gravados são mantidos e a
//! próxima execução com os mesmos parâmetros continua de onde parou.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use ethernity_core::{CandidateStore, VerdictFilter, VerdictStatus};
use ethernity_rpc::EthernityRpcClient;
use ethernity_store::{MemoryStore, RedbStore};
use ethernity_tod::{PipelineConfig, PipelineCoordinator};
use futures::StreamExt;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Uso: {} <CONFIG_JSON>", args[0]);
        std::process::exit(1);
    }

    let config = PipelineConfig::from_json_file(&args[1]).context("configuração inválida")?;
    let run = config.mining_run()?;

    let client = EthernityRpcClient::connect(config.rpc.clone()).await?;
    info!(
        endpoint = %config.rpc.endpoint,
        traces = config.rpc.trace_endpoint.as_deref().unwrap_or("mesmo endpoint"),
        dialect = client.dialect_name(),
        "conectado ao node"
    );
    let node = Arc::new(client);

    let store: Arc<dyn CandidateStore> = match &config.store_path {
        Some(path) => Arc::new(RedbStore::open(path)?),
        None => {
            warn!("store_path ausente, vereditos ficam só em memória");
            Arc::new(MemoryStore::new())
        }
    };

    let coordinator = PipelineCoordinator::new(node, store.clone(), &config);
    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrompendo execução");
            cancel.cancel();
        }
    });

    let report = coordinator.run(&run).await?;
    println!("{}", report);
    for failed in &report.failed_blocks {
        println!("Bloco {} ignorado após {} tentativa(s): {}", failed.block_number, failed.attempts, failed.reason);
    }

    let mut confirmed = store.list_by_status(VerdictStatus::Confirmed, VerdictFilter::for_run(report.run_id.clone()));
    while let Some(entry) = confirmed.next().await {
        let (pair_id, record) = entry?;
        println!("TOD bloco {}: {}", record.block_number, pair_id);
    }

    Ok(())
}
