use crate::config::PipelineConfig;
use crate::engine::ReorderTraceEngine;
use crate::miner::WindowMiner;
use crate::report::{RejectedPair, RunReport};
use crate::retry::RetryPolicy;
use chrono::Utc;
use ethernity_core::{
    CandidatePair, CandidateStore, Error, MiningRun, MiningRunRecord, NodeClient, OverlapEvidence,
    PairId, Result, RunId, Verdict, VerdictRecord,
};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Destino de um par no lote de confirmação
enum PairOutcome {
    Traced(Verdict),
    /// Já havia veredito definitivo para a execução
    Skipped,
    NotStarted,
}

/// Conduz mineração, confirmação e persistência de uma execução
pub struct PipelineCoordinator<N, S> {
    node: N,
    store: S,
    miner: WindowMiner<N>,
    engine: ReorderTraceEngine<N>,
    retry: RetryPolicy,
    concurrency: usize,
    window_size: usize,
    cancel: CancellationToken,
}

impl<N: NodeClient + Clone, S: CandidateStore> PipelineCoordinator<N, S> {
    /// Monta o pipeline; `node` é a conexão compartilhada por todos os workers
    pub fn new(node: N, store: S, config: &PipelineConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let miner = WindowMiner::new(node.clone(), config.overlap.build(), retry.clone())
            .with_concurrency(config.concurrency);
        let engine = ReorderTraceEngine::new(node.clone(), retry.clone())
            .with_upgrade_deep_divergence(config.upgrade_deep_divergence);
        Self {
            node,
            store,
            miner,
            engine,
            retry,
            concurrency: config.concurrency.max(1),
            window_size: config.window_size,
            cancel: CancellationToken::new(),
        }
    }

    /// Token que interrompe as execuções em andamento e as futuras
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run_id(&self, run: &MiningRun) -> RunId {
        run.run_id(self.miner.strategy_name())
    }

    /// Minera (ou retoma) a execução e confirma os candidatos sem veredito definitivo
    pub async fn run(&self, run: &MiningRun) -> Result<RunReport> {
        let started = Instant::now();
        let cancel = self.cancel.child_token();
        let run_id = self.run_id(run);
        let mut report = RunReport::new(run_id.clone());

        let stored_run = self.store.get_run(&run_id).await?;
        let candidates = match stored_run {
            Some(record) if record.is_complete() && record.run == *run => {
                info!(run = %run_id, candidates = record.candidate_count, "reaproveitando candidatos minerados");
                report.reused_candidates = true;
                report.dropped_by_cap = record.dropped_by_cap;
                self.store.get_candidates(&run_id).await?
            }
            _ => {
                let outcome = self.miner.mine(run, &cancel).await;
                report.dropped_by_cap = outcome.dropped_by_cap;
                report.failed_blocks = outcome.failed_blocks.clone();
                if outcome.cancelled {
                    warn!(run = %run_id, scanned = outcome.blocks_scanned, "mineração cancelada; nada foi gravado");
                    report.cancelled = true;
                    report.mining_ms = elapsed_ms(started);
                    report.elapsed_ms = elapsed_ms(started);
                    return Ok(report);
                }

                let record = MiningRunRecord {
                    run_id: run_id.clone(),
                    run: *run,
                    candidate_count: outcome.candidates.len(),
                    dropped_by_cap: outcome.dropped_by_cap,
                    failed_blocks: outcome.failed_blocks,
                    mined_at: Utc::now(),
                };
                self.store
                    .put_candidates(&run_id, &outcome.candidates)
                    .await
                    .map_err(|e| abort(&cancel, &run_id, e))?;
                self.store.put_run(&record).await.map_err(|e| abort(&cancel, &run_id, e))?;
                outcome.candidates
            }
        };

        report.candidates = candidates.len();
        report.mining_ms = elapsed_ms(started);

        let confirming = Instant::now();
        self.confirm_all(&run_id, candidates, false, &cancel, &mut report).await?;
        report.confirm_ms = elapsed_ms(confirming);
        report.cancelled = cancel.is_cancelled();
        report.elapsed_ms = elapsed_ms(started);
        info!(run = %run_id, "{}", report);
        Ok(report)
    }

    /// Reexamina pares específicos sem minerar.
    ///
    /// Pares ausentes do store são montados a partir do node; pares
    /// inválidos (blocos diferentes, fora da janela) são rejeitados.
    pub async fn retrace(&self, run_id: &RunId, pair_ids: &[PairId], force: bool) -> Result<RunReport> {
        let started = Instant::now();
        let cancel = self.cancel.child_token();
        let mut report = RunReport::new(run_id.clone());

        let (pairs, rejected) = self.resolve_pairs(run_id, pair_ids).await?;
        report.candidates = pairs.len();
        report.rejected = rejected;
        report.mining_ms = elapsed_ms(started);

        let confirming = Instant::now();
        self.confirm_all(run_id, pairs, force, &cancel, &mut report).await?;
        report.confirm_ms = elapsed_ms(confirming);
        report.cancelled = cancel.is_cancelled();
        report.elapsed_ms = elapsed_ms(started);
        info!(run = %run_id, force, "{}", report);
        Ok(report)
    }

    async fn resolve_pairs(
        &self,
        run_id: &RunId,
        pair_ids: &[PairId],
    ) -> Result<(Vec<CandidatePair>, Vec<RejectedPair>)> {
        let stored: HashMap<PairId, CandidatePair> = self
            .store
            .get_candidates(run_id)
            .await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();
        let window = match self.store.get_run(run_id).await? {
            Some(record) => record.run.window_size,
            None => self.window_size,
        };

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        let mut rejected = Vec::new();
        for pair_id in pair_ids {
            if !seen.insert(*pair_id) {
                continue;
            }
            if let Some(pair) = stored.get(pair_id) {
                pairs.push(pair.clone());
                continue;
            }
            match self.fetch_pair(pair_id, window).await {
                Ok(pair) => pairs.push(pair),
                Err(reason) => {
                    warn!(pair = %pair_id, %reason, "par rejeitado");
                    rejected.push(RejectedPair { pair_id: *pair_id, reason });
                }
            }
        }
        Ok((pairs, rejected))
    }

    async fn fetch_pair(&self, pair_id: &PairId, window: usize) -> std::result::Result<CandidatePair, String> {
        let (low, _) = self
            .retry
            .run("fetch_transaction", || self.node.fetch_transaction(pair_id.low))
            .await;
        let low = low.map_err(|e| e.to_string())?;
        let (high, _) = self
            .retry
            .run("fetch_transaction", || self.node.fetch_transaction(pair_id.high))
            .await;
        let high = high.map_err(|e| e.to_string())?;
        CandidatePair::new(low, high, window, OverlapEvidence::default()).map_err(|e| e.to_string())
    }

    /// Confirma os pares com concorrência limitada, gravando cada veredito ao sair
    async fn confirm_all(
        &self,
        run_id: &RunId,
        pairs: Vec<CandidatePair>,
        force: bool,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<()> {
        let mut outcomes = stream::iter(pairs)
            .map(|pair| async move { self.confirm_one(run_id, &pair, force, cancel).await })
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome.map_err(|e| abort(cancel, run_id, e))? {
                PairOutcome::Traced(verdict) => report.record(&verdict),
                PairOutcome::Skipped => report.skipped_final += 1,
                PairOutcome::NotStarted => report.not_started += 1,
            }
        }
        Ok(())
    }

    async fn confirm_one(
        &self,
        run_id: &RunId,
        pair: &CandidatePair,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<PairOutcome> {
        if cancel.is_cancelled() {
            return Ok(PairOutcome::NotStarted);
        }
        let pair_id = pair.id();
        if !force {
            if let Some(existing) = self.store.get_verdict(run_id, &pair_id).await? {
                if existing.verdict.is_final() {
                    return Ok(PairOutcome::Skipped);
                }
            }
        }
        if cancel.is_cancelled() {
            return Ok(PairOutcome::NotStarted);
        }

        let started = Instant::now();
        let verdict = self.engine.confirm(pair).await;
        let record = VerdictRecord {
            run_id: run_id.clone(),
            pair_id,
            block_number: pair.block_number(),
            verdict: verdict.clone(),
            recorded_at: Utc::now(),
            elapsed_ms: elapsed_ms(started),
        };
        self.store.put_verdict(&record).await?;
        Ok(PairOutcome::Traced(verdict))
    }
}

/// Falha do store interrompe a execução inteira
fn abort(cancel: &CancellationToken, run_id: &RunId, e: Error) -> Error {
    cancel.cancel();
    error!(run = %run_id, error = %e, "execução abortada");
    e
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
