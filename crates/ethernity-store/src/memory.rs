use crate::keys::verdict_key;
use async_trait::async_trait;
use dashmap::DashMap;
use ethernity_core::{
    CandidatePair, CandidateStore, MiningRunRecord, PairId, Result, RunId, VerdictFilter,
    VerdictRecord, VerdictStatus,
};
use futures::stream::{self, BoxStream, StreamExt};

/// Store volátil baseado em `DashMap`
#[derive(Default)]
pub struct MemoryStore {
    candidates: DashMap<RunId, Vec<CandidatePair>>,
    runs: DashMap<RunId, MiningRunRecord>,
    verdicts: DashMap<String, VerdictRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verdict_count(&self) -> usize {
        self.verdicts.len()
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn put_candidates(&self, run_id: &RunId, pairs: &[CandidatePair]) -> Result<()> {
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|p| (p.block_number(), p.first.index, p.second.index));
        self.candidates.insert(run_id.clone(), sorted);
        Ok(())
    }

    async fn get_candidates(&self, run_id: &RunId) -> Result<Vec<CandidatePair>> {
        Ok(self
            .candidates
            .get(run_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn put_run(&self, record: &MiningRunRecord) -> Result<()> {
        self.runs.insert(record.run_id.clone(), record.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<MiningRunRecord>> {
        Ok(self.runs.get(run_id).map(|entry| entry.value().clone()))
    }

    async fn get_verdict(&self, run_id: &RunId, pair_id: &PairId) -> Result<Option<VerdictRecord>> {
        Ok(self
            .verdicts
            .get(&verdict_key(run_id, pair_id))
            .map(|entry| entry.value().clone()))
    }

    async fn put_verdict(&self, record: &VerdictRecord) -> Result<()> {
        self.verdicts
            .insert(verdict_key(&record.run_id, &record.pair_id), record.clone());
        Ok(())
    }

    fn list_by_status<'a>(
        &'a self,
        status: VerdictStatus,
        filter: VerdictFilter,
    ) -> BoxStream<'a, Result<(PairId, VerdictRecord)>> {
        let mut matching: Vec<(String, VerdictRecord)> = self
            .verdicts
            .iter()
            .filter(|entry| entry.verdict.status() == status && filter.matches(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        stream::iter(matching.into_iter().map(|(_, record)| Ok((record.pair_id, record)))).boxed()
    }
}
