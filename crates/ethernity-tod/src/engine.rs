use crate::diff::{compare, DiffOutcome};
use crate::retry::RetryPolicy;
use ethernity_core::utils::format_h256;
use ethernity_core::{
    CandidatePair, NodeClient, ParentState, TraceResult, TransactionRef, Verdict,
};
use tracing::{debug, warn};

/// Confirma pares candidatos reexecutando as duas ordens
pub struct ReorderTraceEngine<N> {
    node: N,
    retry: RetryPolicy,
    upgrade_deep_divergence: bool,
}

impl<N: NodeClient> ReorderTraceEngine<N> {
    pub fn new(node: N, retry: RetryPolicy) -> Self {
        Self { node, retry, upgrade_deep_divergence: false }
    }

    /// Divergência só na árvore de chamadas passa a confirmar
    pub fn with_upgrade_deep_divergence(mut self, upgrade: bool) -> Self {
        self.upgrade_deep_divergence = upgrade;
        self
    }

    /// Produz o veredito do par; falhas viram `Verdict::Error`
    pub async fn confirm(&self, pair: &CandidatePair) -> Verdict {
        let block = pair.block_number();
        if block == 0 {
            return Verdict::Error("bloco gênese não tem estado pai".into());
        }

        let (parent, _) = self
            .retry
            .run("parent_state", || self.node.parent_state(block))
            .await;
        let parent = match parent {
            Ok(parent) => parent,
            Err(e) => return Verdict::Error(format!("estado pai do bloco {}: {}", block, e)),
        };

        // as duas ordens leem o mesmo estado pai fixado acima
        let (original, swapped) = tokio::join!(
            self.replay_second(pair, &parent, true),
            self.replay_second(pair, &parent, false)
        );
        let (original, swapped) = match (original, swapped) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                warn!(pair = %pair.id(), error = %e, "replay falhou");
                return Verdict::Error(e);
            }
        };

        let outcome = compare(&original, &swapped);
        if let DiffOutcome::Surface(layer) = &outcome {
            debug!(pair = %pair.id(), %layer, "ordens divergem");
        }
        outcome.into_verdict(self.upgrade_deep_divergence)
    }

    /// Trace de `second`, com ou sem `first` executada antes
    async fn replay_second(
        &self,
        pair: &CandidatePair,
        parent: &ParentState,
        after_first: bool,
    ) -> Result<TraceResult, String> {
        let preceding: &[TransactionRef] = if after_first {
            std::slice::from_ref(&pair.first)
        } else {
            &[]
        };
        let (result, attempts) = self
            .retry
            .run("replay", || self.node.replay(&pair.second, parent, preceding))
            .await;
        result.map_err(|e| {
            let order = if after_first { "original" } else { "trocada" };
            format!(
                "replay de {} na ordem {} após {} tentativa(s): {}",
                format_h256(&pair.second.hash),
                order,
                attempts,
                e
            )
        })
    }
}
