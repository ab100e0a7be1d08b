/*!
 * Ethernity Traits
 *
 * Contratos com os colaboradores externos do pipeline TOD
 */

use crate::error::{NodeResult, Result};
use crate::types::{
    AccessFootprint, CandidatePair, MiningRunRecord, PairId, ParentState, RunId, TraceResult,
    TransactionHash, TransactionRef, VerdictFilter, VerdictRecord, VerdictStatus,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Cliente de node de arquivo com suporte a trace de baixo nível
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Transações do bloco na ordem de execução
    async fn fetch_block_transactions(&self, block_number: u64) -> NodeResult<Vec<TransactionRef>>;

    /// Localiza uma transação minerada pelo hash
    async fn fetch_transaction(&self, tx_hash: TransactionHash) -> NodeResult<TransactionRef>;

    /// Estado imediatamente anterior à primeira transação do bloco
    async fn parent_state(&self, block_number: u64) -> NodeResult<ParentState>;

    /// Chaves de estado lidas e escritas pela transação executada sobre `parent`
    async fn access_footprint(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
    ) -> NodeResult<AccessFootprint>;

    /// Reexecuta `tx` sobre `parent` após aplicar `preceding` em ordem
    async fn replay(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
        preceding: &[TransactionRef],
    ) -> NodeResult<TraceResult>;
}

#[async_trait]
impl<N: NodeClient + ?Sized> NodeClient for Arc<N> {
    async fn fetch_block_transactions(&self, block_number: u64) -> NodeResult<Vec<TransactionRef>> {
        (**self).fetch_block_transactions(block_number).await
    }

    async fn fetch_transaction(&self, tx_hash: TransactionHash) -> NodeResult<TransactionRef> {
        (**self).fetch_transaction(tx_hash).await
    }

    async fn parent_state(&self, block_number: u64) -> NodeResult<ParentState> {
        (**self).parent_state(block_number).await
    }

    async fn access_footprint(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
    ) -> NodeResult<AccessFootprint> {
        (**self).access_footprint(tx, parent).await
    }

    async fn replay(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
        preceding: &[TransactionRef],
    ) -> NodeResult<TraceResult> {
        (**self).replay(tx, parent, preceding).await
    }
}

/// Armazenamento durável de candidatos e vereditos.
///
/// Todas as escritas são chaveadas por (execução, par), o que torna
/// escritas concorrentes comutativas.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn put_candidates(&self, run_id: &RunId, pairs: &[CandidatePair]) -> Result<()>;

    /// Candidatos da execução ordenados por (bloco, primeiro índice, segundo índice)
    async fn get_candidates(&self, run_id: &RunId) -> Result<Vec<CandidatePair>>;

    async fn put_run(&self, record: &MiningRunRecord) -> Result<()>;

    async fn get_run(&self, run_id: &RunId) -> Result<Option<MiningRunRecord>>;

    async fn get_verdict(&self, run_id: &RunId, pair_id: &PairId) -> Result<Option<VerdictRecord>>;

    /// Grava o veredito, sobrescrevendo o anterior do mesmo par
    async fn put_verdict(&self, record: &VerdictRecord) -> Result<()>;

    /// Produz os vereditos com o status pedido sob demanda
    fn list_by_status<'a>(
        &'a self,
        status: VerdictStatus,
        filter: VerdictFilter,
    ) -> BoxStream<'a, Result<(PairId, VerdictRecord)>>;
}

#[async_trait]
impl<S: CandidateStore + ?Sized> CandidateStore for Arc<S> {
    async fn put_candidates(&self, run_id: &RunId, pairs: &[CandidatePair]) -> Result<()> {
        (**self).put_candidates(run_id, pairs).await
    }

    async fn get_candidates(&self, run_id: &RunId) -> Result<Vec<CandidatePair>> {
        (**self).get_candidates(run_id).await
    }

    async fn put_run(&self, record: &MiningRunRecord) -> Result<()> {
        (**self).put_run(record).await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<MiningRunRecord>> {
        (**self).get_run(run_id).await
    }

    async fn get_verdict(&self, run_id: &RunId, pair_id: &PairId) -> Result<Option<VerdictRecord>> {
        (**self).get_verdict(run_id, pair_id).await
    }

    async fn put_verdict(&self, record: &VerdictRecord) -> Result<()> {
        (**self).put_verdict(record).await
    }

    fn list_by_status<'a>(
        &'a self,
        status: VerdictStatus,
        filter: VerdictFilter,
    ) -> BoxStream<'a, Result<(PairId, VerdictRecord)>> {
        (**self).list_by_status(status, filter)
    }
}
