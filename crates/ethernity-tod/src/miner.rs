use crate::dedup::DuplicateCap;
use crate::overlap::OverlapStrategy;
use crate::retry::RetryPolicy;
use ethernity_core::{
    AccessFootprint, CandidatePair, FailedBlock, MiningRun, NodeClient, NodeError, NodeResult,
    TransactionRef,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Resultado da varredura de um intervalo de blocos
#[derive(Debug, Clone, Default)]
pub struct MiningOutcome {
    /// Pares em ordem de varredura: bloco, primeiro índice, segundo índice
    pub candidates: Vec<CandidatePair>,
    pub dropped_by_cap: usize,
    pub failed_blocks: Vec<FailedBlock>,
    pub blocks_scanned: u64,
    /// A varredura parou antes do fim do intervalo
    pub cancelled: bool,
}

/// Varre blocos e propõe pares de transações com sobreposição de estado
pub struct WindowMiner<N> {
    node: N,
    strategy: Box<dyn OverlapStrategy>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl<N: NodeClient> WindowMiner<N> {
    pub fn new(node: N, strategy: Box<dyn OverlapStrategy>, retry: RetryPolicy) -> Self {
        Self {
            node,
            strategy,
            retry,
            concurrency: 1,
        }
    }

    /// Blocos buscados simultaneamente
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Minera o intervalo completo.
    ///
    /// Blocos podem ser buscados em paralelo, mas os resultados são
    /// consumidos em ordem crescente, e o limite de duplicados é aplicado
    /// nessa ordem.
    pub async fn mine(&self, run: &MiningRun, cancel: &CancellationToken) -> MiningOutcome {
        let mut outcome = MiningOutcome::default();
        let mut cap = DuplicateCap::new(run.duplicate_cap);

        let mut blocks = stream::iter(run.block_range.blocks())
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|block_number| async move {
                let (result, attempts) = self
                    .retry
                    .run("mine_block", || self.mine_block(block_number, run))
                    .await;
                (block_number, result, attempts)
            })
            .buffered(self.concurrency);

        while let Some((block_number, result, attempts)) = blocks.next().await {
            outcome.blocks_scanned += 1;
            match result {
                Ok(pairs) => {
                    let found = pairs.len();
                    outcome.candidates.extend(pairs.into_iter().filter(|p| cap.admit(p)));
                    debug!(block = block_number, found, "bloco minerado");
                }
                Err(e) => {
                    warn!(block = block_number, attempts, error = %e, "bloco ignorado");
                    outcome.failed_blocks.push(FailedBlock {
                        block_number,
                        reason: e.to_string(),
                        attempts,
                    });
                }
            }
        }

        outcome.dropped_by_cap = cap.dropped();
        outcome.cancelled = outcome.blocks_scanned < run.block_range.len();
        info!(
            range = %run.block_range,
            candidates = outcome.candidates.len(),
            dropped = outcome.dropped_by_cap,
            failed = outcome.failed_blocks.len(),
            cancelled = outcome.cancelled,
            "mineração concluída"
        );
        outcome
    }

    /// Pares de um bloco, antes do limite de duplicados.
    ///
    /// As pegadas do bloco também são buscadas em paralelo; o limite real de
    /// requisições ao node fica no cliente RPC.
    pub async fn mine_block(
        &self,
        block_number: u64,
        run: &MiningRun,
    ) -> NodeResult<Vec<CandidatePair>> {
        let mut txs = self.node.fetch_block_transactions(block_number).await?;
        if txs.len() < 2 {
            return Ok(Vec::new());
        }
        txs.sort_by_key(|t| t.index);

        let parent = self.node.parent_state(block_number).await?;
        let footprints: Vec<AccessFootprint> = stream::iter(txs.iter())
            .map(|tx| self.node.access_footprint(tx, &parent))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut pairs = Vec::new();
        for i in 0..txs.len() {
            for j in (i + 1)..txs.len() {
                if txs[j].index - txs[i].index > run.window_size {
                    break;
                }
                let (first, second) = (&txs[i], &txs[j]);
                if let Some(pair) =
                    self.propose(first, second, &footprints[i], &footprints[j], run)?
                {
                    pairs.push(pair);
                }
            }
        }
        Ok(pairs)
    }

    fn propose(
        &self,
        first: &TransactionRef,
        second: &TransactionRef,
        first_fp: &AccessFootprint,
        second_fp: &AccessFootprint,
        run: &MiningRun,
    ) -> NodeResult<Option<CandidatePair>> {
        if run.skip_same_sender && first.from == second.from {
            return Ok(None);
        }
        let evidence = self.strategy.evidence(first_fp, second_fp);
        if evidence.is_empty() {
            return Ok(None);
        }
        CandidatePair::new(first.clone(), second.clone(), run.window_size, evidence)
            .map(Some)
            .map_err(|e| NodeError::permanent(format!("bloco inconsistente: {}", e)))
    }
}
