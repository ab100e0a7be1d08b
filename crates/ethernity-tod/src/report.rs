use ethernity_core::{FailedBlock, PairId, RunId, Verdict};
use serde::Serialize;
use std::fmt;

/// Par do modo de re-trace que não pôde ser montado
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPair {
    pub pair_id: PairId,
    pub reason: String,
}

/// Resumo de uma execução do pipeline
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub candidates: usize,
    /// Candidatos lidos do store em vez de minerados de novo
    pub reused_candidates: bool,
    pub dropped_by_cap: usize,
    pub confirmed: usize,
    pub not_confirmed: usize,
    pub inconclusive: usize,
    pub errored: usize,
    /// Pares com veredito definitivo de uma execução anterior
    pub skipped_final: usize,
    /// Pares não iniciados por cancelamento
    pub not_started: usize,
    pub rejected: Vec<RejectedPair>,
    pub failed_blocks: Vec<FailedBlock>,
    /// Tempo para obter os candidatos (mineração ou leitura do store)
    pub mining_ms: u64,
    /// Tempo da fase de confirmação
    pub confirm_ms: u64,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            candidates: 0,
            reused_candidates: false,
            dropped_by_cap: 0,
            confirmed: 0,
            not_confirmed: 0,
            inconclusive: 0,
            errored: 0,
            skipped_final: 0,
            not_started: 0,
            rejected: Vec::new(),
            failed_blocks: Vec::new(),
            mining_ms: 0,
            confirm_ms: 0,
            elapsed_ms: 0,
            cancelled: false,
        }
    }

    pub fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Confirmed => self.confirmed += 1,
            Verdict::NotConfirmed => self.not_confirmed += 1,
            Verdict::Inconclusive(_) => self.inconclusive += 1,
            Verdict::Error(_) => self.errored += 1,
        }
    }

    /// Pares que receberam veredito nesta execução
    pub fn traced(&self) -> usize {
        self.confirmed + self.not_confirmed + self.inconclusive + self.errored
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} candidatos, {} TOD, {} não TOD, {} inconclusivos, {} com erro, {} já definidos, {} blocos ignorados",
            self.run_id,
            self.candidates,
            self.confirmed,
            self.not_confirmed,
            self.inconclusive,
            self.errored,
            self.skipped_final,
            self.failed_blocks.len()
        )?;
        write!(
            f,
            " em {}ms (mineração {}ms, confirmação {}ms)",
            self.elapsed_ms, self.mining_ms, self.confirm_ms
        )?;
        if !self.rejected.is_empty() {
            write!(f, ", {} pares rejeitados", self.rejected.len())?;
        }
        if self.cancelled {
            write!(f, " (cancelado, {} pares não iniciados)", self.not_started)?;
        }
        Ok(())
    }
}
