use crate::keys::{candidate_key, run_prefix, run_prefix_end, verdict_key};
use async_trait::async_trait;
use ethernity_core::{
    CandidatePair, CandidateStore, Error, MiningRunRecord, PairId, Result, RunId, VerdictFilter,
    VerdictRecord, VerdictStatus,
};
use futures::stream::{self, BoxStream, StreamExt};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Tabelas chaveadas por texto com valores JSON
type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const CANDIDATES: JsonTable = TableDefinition::new("candidates");
const VERDICTS: JsonTable = TableDefinition::new("verdicts");
const RUNS: JsonTable = TableDefinition::new("runs");

/// Vereditos lidos por transação de leitura em `list_by_status`
const PAGE_SIZE: usize = 256;

fn store_err(e: impl Display) -> Error {
    Error::StoreError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(store_err)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::StoreError(format!("registro corrompido em {}: {}", key, e)))
}

/// Posição da paginação de vereditos
enum Cursor {
    Start,
    After(String),
    Done,
}

/// Lê um valor e o decodifica
fn get_value<T: DeserializeOwned>(db: &Database, table: JsonTable, key: &str) -> Result<Option<T>> {
    let tx = db.begin_read().map_err(store_err)?;
    let table = tx.open_table(table).map_err(store_err)?;
    let value = match table.get(key).map_err(store_err)? {
        Some(guard) => decode(key, guard.value()).map(Some),
        None => Ok(None),
    };
    value
}

fn put_value(db: &Database, table: JsonTable, key: &str, bytes: &[u8]) -> Result<()> {
    let tx = db.begin_write().map_err(store_err)?;
    {
        let mut table = tx.open_table(table).map_err(store_err)?;
        table.insert(key, bytes).map_err(store_err)?;
    }
    tx.commit().map_err(store_err)
}

/// Substitui o conjunto de candidatos da execução numa única transação
fn replace_candidates(db: &Database, run_id: &RunId, encoded: &[(String, Vec<u8>)]) -> Result<()> {
    let tx = db.begin_write().map_err(store_err)?;
    {
        let mut table = tx.open_table(CANDIDATES).map_err(store_err)?;
        let (start, end) = (run_prefix(run_id), run_prefix_end(run_id));
        let stale = table
            .range(start.as_str()..end.as_str())
            .map_err(store_err)?
            .map(|entry| entry.map(|(k, _)| k.value().to_string()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_err)?;
        for key in &stale {
            table.remove(key.as_str()).map_err(store_err)?;
        }
        for (key, bytes) in encoded {
            table.insert(key.as_str(), bytes.as_slice()).map_err(store_err)?;
        }
    }
    tx.commit().map_err(store_err)
}

fn read_candidates(db: &Database, run_id: &RunId) -> Result<Vec<CandidatePair>> {
    let tx = db.begin_read().map_err(store_err)?;
    let table = tx.open_table(CANDIDATES).map_err(store_err)?;
    let (start, end) = (run_prefix(run_id), run_prefix_end(run_id));

    let mut pairs = Vec::new();
    for entry in table.range(start.as_str()..end.as_str()).map_err(store_err)? {
        let (key, value) = entry.map_err(store_err)?;
        pairs.push(decode(key.value(), value.value())?);
    }
    Ok(pairs)
}

/// Lê até `PAGE_SIZE` vereditos após `after`, restritos ao prefixo da execução
fn verdict_page(
    db: &Database,
    run_id: Option<&RunId>,
    after: Option<&str>,
) -> Result<(Vec<VerdictRecord>, Option<String>)> {
    let tx = db.begin_read().map_err(store_err)?;
    let table = tx.open_table(VERDICTS).map_err(store_err)?;

    let prefix = run_id.map(|r| (run_prefix(r), run_prefix_end(r)));
    let lower = match (after, &prefix) {
        (Some(key), _) => Bound::Excluded(key),
        (None, Some((start, _))) => Bound::Included(start.as_str()),
        (None, None) => Bound::Unbounded,
    };
    let upper = match &prefix {
        Some((_, end)) => Bound::Excluded(end.as_str()),
        None => Bound::Unbounded,
    };

    let mut records = Vec::new();
    let mut last_key = None;
    for entry in table.range::<&str>((lower, upper)).map_err(store_err)? {
        let (key, value) = entry.map_err(store_err)?;
        let key = key.value().to_string();
        records.push(decode::<VerdictRecord>(&key, value.value())?);
        last_key = Some(key);
        if records.len() == PAGE_SIZE {
            return Ok((records, last_key));
        }
    }
    Ok((records, None))
}

/// Store persistente em arquivo `redb`.
///
/// Cada chamada de escrita é uma transação própria, então um processo
/// interrompido nunca deixa um registro pela metade. As transações rodam em
/// `spawn_blocking` para não travar os workers do runtime.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Abre (ou cria) o banco e garante que as tabelas existam
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(store_err)?;
        let tx = db.begin_write().map_err(store_err)?;
        {
            tx.open_table(CANDIDATES).map_err(store_err)?;
            tx.open_table(VERDICTS).map_err(store_err)?;
            tx.open_table(RUNS).map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        debug!(path = %path.as_ref().display(), "store redb aberto");
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(store_err)?
    }
}

#[async_trait]
impl CandidateStore for RedbStore {
    async fn put_candidates(&self, run_id: &RunId, pairs: &[CandidatePair]) -> Result<()> {
        let encoded = pairs
            .iter()
            .map(|p| Ok((candidate_key(run_id, p), encode(p)?)))
            .collect::<Result<Vec<_>>>()?;

        let run = run_id.clone();
        self.blocking(move |db| replace_candidates(db, &run, &encoded)).await?;
        debug!(run = %run_id, pairs = pairs.len(), "candidatos gravados");
        Ok(())
    }

    async fn get_candidates(&self, run_id: &RunId) -> Result<Vec<CandidatePair>> {
        let run_id = run_id.clone();
        self.blocking(move |db| read_candidates(db, &run_id)).await
    }

    async fn put_run(&self, record: &MiningRunRecord) -> Result<()> {
        let bytes = encode(record)?;
        let key = record.run_id.0.clone();
        self.blocking(move |db| put_value(db, RUNS, &key, &bytes)).await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<MiningRunRecord>> {
        let key = run_id.0.clone();
        self.blocking(move |db| get_value(db, RUNS, &key)).await
    }

    async fn get_verdict(&self, run_id: &RunId, pair_id: &PairId) -> Result<Option<VerdictRecord>> {
        let key = verdict_key(run_id, pair_id);
        self.blocking(move |db| get_value(db, VERDICTS, &key)).await
    }

    async fn put_verdict(&self, record: &VerdictRecord) -> Result<()> {
        let bytes = encode(record)?;
        let key = verdict_key(&record.run_id, &record.pair_id);
        self.blocking(move |db| put_value(db, VERDICTS, &key, &bytes)).await
    }

    fn list_by_status<'a>(
        &'a self,
        status: VerdictStatus,
        filter: VerdictFilter,
    ) -> BoxStream<'a, Result<(PairId, VerdictRecord)>> {
        stream::unfold(Cursor::Start, move |cursor| {
            let filter = filter.clone();
            async move {
                let after = match cursor {
                    Cursor::Done => return None,
                    Cursor::Start => None,
                    Cursor::After(key) => Some(key),
                };
                let run_id = filter.run_id.clone();
                let page = self
                    .blocking(move |db| verdict_page(db, run_id.as_ref(), after.as_deref()))
                    .await;
                let (items, next) = match page {
                    Ok((records, next)) => {
                        let items: Vec<Result<(PairId, VerdictRecord)>> = records
                            .into_iter()
                            .filter(|r| r.verdict.status() == status && filter.matches(r))
                            .map(|r| Ok((r.pair_id, r)))
                            .collect();
                        (items, next.map(Cursor::After).unwrap_or(Cursor::Done))
                    }
                    Err(e) => (vec![Err(e)], Cursor::Done),
                };
                Some((stream::iter(items), next))
            }
        })
        .flatten()
        .boxed()
    }
}
