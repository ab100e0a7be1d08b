//! Reexamina pares específicos de uma execução sem minerar de novo.
//!
//! ```bash
//! cargo run -p ethernity-tod --example retrace_pairs -- <CONFIG_JSON> <RUN_ID> <PAR>... [--force]
//! ```
//!
//! Cada par é informado como `0x<hash>_0x<hash>`.

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ethernity_core::{PairId, RunId};
use ethernity_rpc::EthernityRpcClient;
use ethernity_store::RedbStore;
use ethernity_tod::{PipelineConfig, PipelineCoordinator};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = env::args().collect();
    let force = args.iter().any(|a| a == "--force");
    args.retain(|a| a != "--force");
    if args.len() < 4 {
        eprintln!("Uso: {} <CONFIG_JSON> <RUN_ID> <PAR>... [--force]", args[0]);
        std::process::exit(1);
    }

    let config = PipelineConfig::from_json_file(&args[1]).context("configuração inválida")?;
    let Some(store_path) = &config.store_path else {
        bail!("re-trace exige store_path na configuração");
    };
    let run_id = RunId(args[2].clone());
    let pair_ids = args[3..]
        .iter()
        .map(|s| s.parse::<PairId>())
        .collect::<Result<Vec<_>, _>>()?;

    let node = Arc::new(EthernityRpcClient::connect(config.rpc.clone()).await?);
    let coordinator = PipelineCoordinator::new(node, RedbStore::open(store_path)?, &config);

    let report = coordinator.retrace(&run_id, &pair_ids, force).await?;
    println!("{}", report);
    for rejected in &report.rejected {
        println!("Par rejeitado {}: {}", rejected.pair_id, rejected.reason);
    }

    Ok(())
}
