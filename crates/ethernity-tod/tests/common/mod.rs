#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use ethernity_core::{
    AccessFootprint, CallFrame, CallType, CandidatePair, CandidateStore, Error, MiningRunRecord,
    NodeClient, NodeError, NodeResult, PairId, ParentState, Result, RunId, StateKey, TraceLog,
    TraceResult, TransactionHash, TransactionRef, VerdictFilter, VerdictRecord, VerdictStatus,
};
use ethernity_store::MemoryStore;
use ethers::types::Bytes;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Operação de brinquedo executada por uma transação simulada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Troca no pool: lê e escreve a reserva, devolve o valor recebido
    Swap(u8),
    /// Só lê a reserva do pool
    Quote(u8),
    /// O primeiro a chamar vence, os demais revertem
    Claim(u8),
    /// Escrita cega de um valor constante
    Bump(u8),
    /// Contador cujo custo de gás depende do valor anterior
    Touch(u8),
    /// Faz uma chamada interna extra quando o contador já foi tocado
    Probe(u8),
}

impl Op {
    pub fn contract(&self) -> Address {
        let id = match self {
            Op::Swap(c) | Op::Quote(c) | Op::Claim(c) | Op::Bump(c) | Op::Touch(c) | Op::Probe(c) => *c,
        };
        Address::repeat_byte(id)
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            Op::Swap(_) => [0x02, 0x2c, 0x0d, 0x9f],
            Op::Quote(_) => [0x09, 0x02, 0xf1, 0xac],
            Op::Claim(_) => [0x4e, 0x71, 0xd9, 0x2d],
            Op::Bump(_) => [0xa9, 0x05, 0x9c, 0xbb],
            Op::Touch(_) => [0xd0, 0x9d, 0xe0, 0x8a],
            Op::Probe(_) => [0x3c, 0xcf, 0xd6, 0x0b],
        }
    }

    fn slot(&self) -> StateKey {
        let slot = match self {
            Op::Swap(_) | Op::Quote(_) => 0,
            Op::Claim(_) => 1,
            Op::Bump(_) => 3,
            Op::Touch(_) | Op::Probe(_) => 2,
        };
        StateKey::Storage(self.contract(), H256::from_low_u64_be(slot))
    }

    pub fn footprint(&self) -> AccessFootprint {
        let slot = self.slot();
        let mut footprint = AccessFootprint::default();
        match self {
            Op::Quote(_) => {
                footprint.reads.insert(slot);
            }
            Op::Bump(_) => {
                footprint.writes.insert(slot);
            }
            Op::Probe(_) => {
                footprint.reads.insert(slot);
            }
            Op::Swap(_) | Op::Claim(_) | Op::Touch(_) => {
                footprint.reads.insert(slot);
                footprint.writes.insert(slot);
            }
        }
        footprint
    }
}

pub type SimTx = (TransactionRef, Op);

pub fn tx_hash(block: u64, index: usize) -> TransactionHash {
    H256::from_low_u64_be(block * 1_000 + index as u64 + 1)
}

pub fn sender(id: u8) -> Address {
    Address::from_low_u64_be(0x1000 + id as u64)
}

/// Node de arquivo simulado com estado de brinquedo e falhas programáveis
pub struct SimNode {
    blocks: BTreeMap<u64, Vec<SimTx>>,
    broken_blocks: Vec<u64>,
    transient: Mutex<HashMap<String, u32>>,
    cancel_after_replays: Mutex<Option<(usize, CancellationToken)>>,
    pub replays: AtomicUsize,
    pub footprints: AtomicUsize,
    pub block_fetches: AtomicUsize,
}

impl SimNode {
    pub fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            broken_blocks: Vec::new(),
            transient: Mutex::new(HashMap::new()),
            cancel_after_replays: Mutex::new(None),
            replays: AtomicUsize::new(0),
            footprints: AtomicUsize::new(0),
            block_fetches: AtomicUsize::new(0),
        }
    }

    /// Adiciona um bloco; cada entrada é (remetente, operação)
    pub fn with_block(mut self, number: u64, txs: &[(u8, Op)]) -> Self {
        let txs = txs
            .iter()
            .enumerate()
            .map(|(index, (from, op))| {
                let tx = TransactionRef {
                    block_number: number,
                    hash: tx_hash(number, index),
                    index,
                    from: sender(*from),
                    to: Some(op.contract()),
                    selector: Some(op.selector()),
                };
                (tx, *op)
            })
            .collect();
        self.blocks.insert(number, txs);
        self
    }

    /// Bloco que falha de forma permanente
    pub fn with_broken_block(mut self, number: u64) -> Self {
        self.broken_blocks.push(number);
        self
    }

    /// As próximas `times` chamadas de `method` falham com erro transitório
    pub fn fail_transient(&self, method: &str, times: u32) {
        self.transient.lock().unwrap().insert(method.to_string(), times);
    }

    pub fn cancel_after_replays(&self, replays: usize, token: CancellationToken) {
        *self.cancel_after_replays.lock().unwrap() = Some((replays, token));
    }

    pub fn tx(&self, block: u64, index: usize) -> TransactionRef {
        self.blocks[&block][index].0.clone()
    }

    pub fn pair_id(&self, block: u64, i: usize, j: usize) -> PairId {
        PairId::new(tx_hash(block, i), tx_hash(block, j))
    }

    pub fn replay_count(&self) -> usize {
        self.replays.load(Ordering::SeqCst)
    }

    fn take_failure(&self, method: &str) -> NodeResult<()> {
        let mut transient = self.transient.lock().unwrap();
        if let Some(remaining) = transient.get_mut(method) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NodeError::transient(format!("{}: 429 too many requests", method)));
            }
        }
        Ok(())
    }

    fn find(&self, hash: TransactionHash) -> Option<&SimTx> {
        self.blocks.values().flatten().find(|(tx, _)| tx.hash == hash)
    }
}

/// Executa `op` sobre `state` e devolve o trace
fn execute(state: &mut HashMap<StateKey, u64>, tx: &TransactionRef, op: Op) -> TraceResult {
    let slot = op.slot();
    let current = state.get(&slot).copied();
    let mut success = true;
    let mut error = None;
    let mut gas_used = 21_000u64;
    let mut return_value = 0u64;
    let mut logs = Vec::new();
    let mut children = Vec::new();

    match op {
        Op::Swap(_) => {
            let reserve = current.unwrap_or(1_000);
            let out = reserve / 10;
            state.insert(slot, reserve - out);
            return_value = out;
            gas_used += 30_000;
            logs.push(TraceLog {
                address: op.contract(),
                topics: vec![H256::repeat_byte(0xd7)],
                data: Bytes::from(U256::from(out).encode_be()),
            });
        }
        Op::Quote(_) => {
            return_value = current.unwrap_or(1_000);
            gas_used += 2_100;
        }
        Op::Claim(_) => {
            if current.is_some() {
                success = false;
                error = Some("execution reverted".to_string());
            } else {
                state.insert(slot, 1);
                return_value = 1;
                gas_used += 22_100;
            }
        }
        Op::Bump(_) => {
            state.insert(slot, 1);
            return_value = 1;
            gas_used += 5_000;
        }
        Op::Touch(_) => {
            let counter = current.unwrap_or(0);
            gas_used += if counter == 0 { 20_000 } else { 5_000 };
            state.insert(slot, counter + 1);
        }
        Op::Probe(_) => {
            if current.is_some() {
                children.push(CallFrame {
                    call_type: CallType::StaticCall,
                    from: op.contract(),
                    to: Some(Address::repeat_byte(0xee)),
                    value: None,
                    gas_used: U256::zero(),
                    input: Bytes::from(vec![0x70, 0xa0, 0x82, 0x31]),
                    output: Bytes::default(),
                    error: None,
                    children: Vec::new(),
                });
            }
        }
    }

    let return_data = if success { Bytes::from(U256::from(return_value).encode_be()) } else { Bytes::default() };
    TraceResult {
        success,
        error: error.clone(),
        revert_reason: None,
        gas_used: U256::from(gas_used),
        logs,
        return_data: return_data.clone(),
        call_tree: CallFrame {
            call_type: CallType::Call,
            from: tx.from,
            to: tx.to,
            value: None,
            gas_used: U256::from(gas_used),
            input: Bytes::from(op.selector().to_vec()),
            output: return_data,
            error,
            children,
        },
    }
}

trait EncodeBe {
    fn encode_be(self) -> Vec<u8>;
}

impl EncodeBe for U256 {
    fn encode_be(self) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        self.to_big_endian(&mut out);
        out
    }
}

#[async_trait]
impl NodeClient for SimNode {
    async fn fetch_block_transactions(&self, block_number: u64) -> NodeResult<Vec<TransactionRef>> {
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        self.take_failure("fetch_block_transactions")?;
        if self.broken_blocks.contains(&block_number) {
            return Err(NodeError::permanent(format!("missing trie node for block {}", block_number)));
        }
        // ordem de chegada embaralhada
        let mut txs: Vec<TransactionRef> = self
            .blocks
            .get(&block_number)
            .map(|txs| txs.iter().map(|(tx, _)| tx.clone()).collect())
            .unwrap_or_default();
        txs.reverse();
        Ok(txs)
    }

    async fn fetch_transaction(&self, tx_hash: TransactionHash) -> NodeResult<TransactionRef> {
        self.take_failure("fetch_transaction")?;
        self.find(tx_hash)
            .map(|(tx, _)| tx.clone())
            .ok_or_else(|| NodeError::permanent(format!("transaction 0x{:x} does not exist", tx_hash)))
    }

    async fn parent_state(&self, block_number: u64) -> NodeResult<ParentState> {
        self.take_failure("parent_state")?;
        if block_number == 0 {
            return Err(NodeError::permanent("genesis block has no parent"));
        }
        Ok(ParentState {
            number: block_number - 1,
            hash: H256::from_low_u64_be(0xb000 + block_number - 1),
        })
    }

    async fn access_footprint(
        &self,
        tx: &TransactionRef,
        _parent: &ParentState,
    ) -> NodeResult<AccessFootprint> {
        self.footprints.fetch_add(1, Ordering::SeqCst);
        self.take_failure("access_footprint")?;
        self.find(tx.hash)
            .map(|(_, op)| op.footprint())
            .ok_or_else(|| NodeError::permanent("unknown transaction"))
    }

    async fn replay(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
        preceding: &[TransactionRef],
    ) -> NodeResult<TraceResult> {
        let count = self.replays.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = self.cancel_after_replays.lock().unwrap().as_ref() {
            if count >= *limit {
                token.cancel();
            }
        }
        self.take_failure("replay")?;
        if parent.number + 1 != tx.block_number {
            return Err(NodeError::permanent("parent state does not precede the block"));
        }

        let mut state = HashMap::new();
        for prior in preceding {
            let (prior, op) = self.find(prior.hash).ok_or_else(|| NodeError::permanent("unknown transaction"))?;
            execute(&mut state, prior, *op);
        }
        let (tx, op) = self.find(tx.hash).ok_or_else(|| NodeError::permanent("unknown transaction"))?;
        Ok(execute(&mut state, tx, *op))
    }
}

/// Store que passa a falhar após um número de gravações de veredito
pub struct FailingStore {
    inner: MemoryStore,
    remaining_writes: AtomicUsize,
}

impl FailingStore {
    pub fn new(verdict_writes: usize) -> Self {
        Self { inner: MemoryStore::new(), remaining_writes: AtomicUsize::new(verdict_writes) }
    }
}

#[async_trait]
impl CandidateStore for FailingStore {
    async fn put_candidates(&self, run_id: &RunId, pairs: &[CandidatePair]) -> Result<()> {
        self.inner.put_candidates(run_id, pairs).await
    }

    async fn get_candidates(&self, run_id: &RunId) -> Result<Vec<CandidatePair>> {
        self.inner.get_candidates(run_id).await
    }

    async fn put_run(&self, record: &MiningRunRecord) -> Result<()> {
        self.inner.put_run(record).await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<MiningRunRecord>> {
        self.inner.get_run(run_id).await
    }

    async fn get_verdict(&self, run_id: &RunId, pair_id: &PairId) -> Result<Option<VerdictRecord>> {
        self.inner.get_verdict(run_id, pair_id).await
    }

    async fn put_verdict(&self, record: &VerdictRecord) -> Result<()> {
        let left = self.remaining_writes.load(Ordering::SeqCst);
        if left == 0 {
            return Err(Error::StoreError("disco cheio".into()));
        }
        self.remaining_writes.store(left - 1, Ordering::SeqCst);
        self.inner.put_verdict(record).await
    }

    fn list_by_status<'a>(
        &'a self,
        status: VerdictStatus,
        filter: VerdictFilter,
    ) -> BoxStream<'a, Result<(PairId, VerdictRecord)>> {
        self.inner.list_by_status(status, filter)
    }
}
