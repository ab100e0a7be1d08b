use ethernity_core::{CandidatePair, PairId, RunId};

/// Prefixo comum às chaves de uma execução
pub(crate) fn run_prefix(run_id: &RunId) -> String {
    format!("{}/", run_id.0)
}

/// Limite superior exclusivo do prefixo (`'/' + 1 == '0'`)
pub(crate) fn run_prefix_end(run_id: &RunId) -> String {
    format!("{}0", run_id.0)
}

/// Chave ordenável por (bloco, primeiro índice, segundo índice)
pub(crate) fn candidate_key(run_id: &RunId, pair: &CandidatePair) -> String {
    format!(
        "{}/{:020}/{:010}/{:010}",
        run_id.0,
        pair.block_number(),
        pair.first.index,
        pair.second.index
    )
}

pub(crate) fn verdict_key(run_id: &RunId, pair_id: &PairId) -> String {
    format!("{}/{}", run_id.0, pair_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_bounds_cover_only_the_run() {
        let run = RunId("run-1-2-abcdef".into());
        let other = RunId("run-1-2-abcdef0".into());
        let start = run_prefix(&run);
        let end = run_prefix_end(&run);
        let inside = verdict_key(&run, &PairId::new(Default::default(), Default::default()));
        assert!(start.as_str() <= inside.as_str() && inside.as_str() < end.as_str());
        let outside = run_prefix(&other);
        assert!(!(start.as_str() <= outside.as_str() && outside.as_str() < end.as_str()));
    }
}
