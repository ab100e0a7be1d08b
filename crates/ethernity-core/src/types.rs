/*!
 * Ethernity Types
 *
 * Modelo de dados compartilhado da mineração e confirmação de TOD
 */

use crate::error::{Error, Result};
use crate::utils::{hex_to_h256, keccak256, parse_block_number};
use chrono::{DateTime, Utc};
use ethereum_types::{Address, H256, U256};
use ethers::types::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Alias para hash de transação
pub type TransactionHash = H256;

/// Seletor de função (primeiros 4 bytes do calldata)
pub type Selector = [u8; 4];

/// Referência imutável a uma transação dentro de um bloco.
///
/// A identidade é o hash; os campos de chamada só alimentam a mineração.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionRef {
    pub block_number: u64,
    pub hash: TransactionHash,
    pub index: usize,
    pub from: Address,
    pub to: Option<Address>,
    pub selector: Option<Selector>,
}

/// Estado do bloco pai, fixado por número e hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentState {
    pub number: u64,
    pub hash: H256,
}

/// Intervalo inclusivo de blocos, serializado como `inicio-fim`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(Error::ValidationError(format!(
                "intervalo de blocos inválido: início {} maior que fim {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, block_number: u64) -> bool {
        block_number >= self.start && block_number <= self.end
    }

    /// Quantidade de blocos; satura em `u64::MAX` para o intervalo completo
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    pub fn blocks(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Aceita `inicio-fim` com números decimais ou `0x` hexadecimais; o fim é incluído.
impl FromStr for BlockRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s.split_once('-').ok_or_else(|| {
            Error::ValidationError(format!(
                "formato de intervalo inválido: \"{}\" (esperado inicio-fim)",
                s
            ))
        })?;
        let start = parse_block_number(start.trim())?;
        let end = parse_block_number(end.trim())?;
        BlockRange::new(start, end)
    }
}

impl TryFrom<String> for BlockRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<BlockRange> for String {
    fn from(range: BlockRange) -> Self {
        range.to_string()
    }
}

/// Chave de estado acessada por uma transação
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateKey {
    /// Saldo, nonce ou código da conta
    Account(Address),
    /// Slot de storage de um contrato
    Storage(Address, H256),
}

impl StateKey {
    pub fn address(&self) -> Address {
        match self {
            StateKey::Account(a) | StateKey::Storage(a, _) => *a,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Account(a) => write!(f, "0x{:x}", a),
            StateKey::Storage(a, slot) => write!(f, "0x{:x}[0x{:x}]", a, slot),
        }
    }
}

/// Conjunto de chaves lidas e escritas por uma transação
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFootprint {
    pub reads: BTreeSet<StateKey>,
    pub writes: BTreeSet<StateKey>,
}

impl AccessFootprint {
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    pub fn reads_key(&self, key: &StateKey) -> bool {
        self.reads.contains(key)
    }

    pub fn writes_key(&self, key: &StateKey) -> bool {
        self.writes.contains(key)
    }

    /// Endereços tocados por leitura ou escrita
    pub fn touched_addresses(&self) -> BTreeSet<Address> {
        self.reads.iter().chain(self.writes.iter()).map(StateKey::address).collect()
    }

    /// Endereços com ao menos uma escrita
    pub fn written_addresses(&self) -> BTreeSet<Address> {
        self.writes.iter().map(StateKey::address).collect()
    }

    /// Remove todas as chaves de um endereço
    pub fn without_address(mut self, address: Address) -> Self {
        self.reads.retain(|k| k.address() != address);
        self.writes.retain(|k| k.address() != address);
        self
    }
}

/// Tipo de conflito entre o primeiro e o segundo acesso
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A primeira escreve, a segunda lê
    WriteRead,
    /// A primeira lê, a segunda escreve
    ReadWrite,
    /// Ambas escrevem
    WriteWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateConflict {
    pub key: StateKey,
    pub kind: ConflictKind,
}

/// Sobreposição observada que justificou propor o par
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapEvidence {
    pub conflicts: Vec<StateConflict>,
}

impl OverlapEvidence {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Endereços envolvidos nos conflitos
    pub fn contracts(&self) -> BTreeSet<Address> {
        self.conflicts.iter().map(|c| c.key.address()).collect()
    }
}

/// Identidade canônica de um par: o hash menor vem primeiro
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairId {
    pub low: TransactionHash,
    pub high: TransactionHash,
}

impl PairId {
    pub fn new(a: TransactionHash, b: TransactionHash) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}_0x{:x}", self.low, self.high)
    }
}

impl FromStr for PairId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (a, b) = s
            .split_once('_')
            .ok_or_else(|| Error::ValidationError(format!("identificador de par inválido: {}", s)))?;
        let a = hex_to_h256(a).ok_or_else(|| Error::DecodeError(format!("hash inválido: {}", a)))?;
        let b = hex_to_h256(b).ok_or_else(|| Error::DecodeError(format!("hash inválido: {}", b)))?;
        if a == b {
            return Err(Error::ValidationError(format!("par com hashes iguais: {}", s)));
        }
        Ok(PairId::new(a, b))
    }
}

/// Par candidato a TOD dentro de um mesmo bloco
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub first: TransactionRef,
    pub second: TransactionRef,
    pub window_distance: usize,
    pub evidence: OverlapEvidence,
}

impl CandidatePair {
    /// Cria um par validado; a ordem dos argumentos é indiferente.
    pub fn new(
        a: TransactionRef,
        b: TransactionRef,
        window_size: usize,
        evidence: OverlapEvidence,
    ) -> Result<Self> {
        if a.block_number != b.block_number {
            return Err(Error::ValidationError(format!(
                "transações em blocos diferentes: {} e {}",
                a.block_number, b.block_number
            )));
        }
        if a.index == b.index || a.hash == b.hash {
            return Err(Error::ValidationError(format!(
                "par degenerado no índice {} do bloco {}",
                a.index, a.block_number
            )));
        }
        let (first, second) = if a.index < b.index { (a, b) } else { (b, a) };
        let window_distance = second.index - first.index;
        if window_distance > window_size {
            return Err(Error::ValidationError(format!(
                "distância {} excede a janela {}",
                window_distance, window_size
            )));
        }
        Ok(Self { first, second, window_distance, evidence })
    }

    pub fn id(&self) -> PairId {
        PairId::new(self.first.hash, self.second.hash)
    }

    pub fn block_number(&self) -> u64 {
        self.first.block_number
    }
}

/// Tipo de chamada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallType {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
    Unknown,
}

impl From<&str> for CallType {
    fn from(s: &str) -> Self {
        match s {
            "CALL" => CallType::Call,
            "STATICCALL" => CallType::StaticCall,
            "DELEGATECALL" => CallType::DelegateCall,
            "CALLCODE" => CallType::CallCode,
            "CREATE" => CallType::Create,
            "CREATE2" => CallType::Create2,
            "SELFDESTRUCT" => CallType::SelfDestruct,
            _ => CallType::Unknown,
        }
    }
}

/// Log emitido durante a execução
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Nó da árvore de chamadas capturada
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    pub call_type: CallType,
    pub from: Address,
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub gas_used: U256,
    pub input: Bytes,
    pub output: Bytes,
    pub error: Option<String>,
    pub children: Vec<CallFrame>,
}

impl CallFrame {
    /// Conta o número total de nós a partir deste
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CallFrame::node_count).sum::<usize>()
    }
}

/// Registro de uma execução de uma transação sob um contexto de ordem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    pub success: bool,
    pub error: Option<String>,
    pub revert_reason: Option<String>,
    pub gas_used: U256,
    pub logs: Vec<TraceLog>,
    pub return_data: Bytes,
    pub call_tree: CallFrame,
}

/// Resultado da comparação das duas ordens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Confirmed,
    NotConfirmed,
    Inconclusive(String),
    Error(String),
}

impl Verdict {
    pub fn status(&self) -> VerdictStatus {
        match self {
            Verdict::Confirmed => VerdictStatus::Confirmed,
            Verdict::NotConfirmed => VerdictStatus::NotConfirmed,
            Verdict::Inconclusive(_) => VerdictStatus::Inconclusive,
            Verdict::Error(_) => VerdictStatus::Error,
        }
    }

    /// Veredito definitivo; `Error` é considerado obsoleto e volta a ser traçado.
    pub fn is_final(&self) -> bool {
        !matches!(self, Verdict::Error(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Confirmed => write!(f, "TOD"),
            Verdict::NotConfirmed => write!(f, "not TOD"),
            Verdict::Inconclusive(reason) => write!(f, "inconclusive: {}", reason),
            Verdict::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Discriminante do veredito, usado em consultas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Confirmed,
    NotConfirmed,
    Inconclusive,
    Error,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Confirmed => write!(f, "confirmed"),
            VerdictStatus::NotConfirmed => write!(f, "not_confirmed"),
            VerdictStatus::Inconclusive => write!(f, "inconclusive"),
            VerdictStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for VerdictStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "confirmed" => Ok(VerdictStatus::Confirmed),
            "not_confirmed" => Ok(VerdictStatus::NotConfirmed),
            "inconclusive" => Ok(VerdictStatus::Inconclusive),
            "error" => Ok(VerdictStatus::Error),
            other => Err(Error::ValidationError(format!("status desconhecido: {}", other))),
        }
    }
}

/// Identificador determinístico de uma execução de mineração
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parâmetros de uma invocação de mineração
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MiningRun {
    pub block_range: BlockRange,
    pub window_size: usize,
    pub duplicate_cap: Option<usize>,
    /// Descarta pares do mesmo remetente; muda o conjunto de candidatos
    #[serde(default = "skip_same_sender_default")]
    pub skip_same_sender: bool,
}

fn skip_same_sender_default() -> bool {
    true
}

impl MiningRun {
    /// Deriva o identificador da execução; parâmetros iguais geram o mesmo id.
    pub fn run_id(&self, strategy: &str) -> RunId {
        let cap = self
            .duplicate_cap
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());
        let material = format!(
            "{}:{}:{}:{}:{}:{}",
            self.block_range.start,
            self.block_range.end,
            self.window_size,
            cap,
            strategy,
            if self.skip_same_sender { "skip-sender" } else { "all-senders" }
        );
        let digest = keccak256(material.as_bytes());
        RunId(format!(
            "run-{}-{}-{}",
            self.block_range.start,
            self.block_range.end,
            hex::encode(&digest[..6])
        ))
    }
}

/// Bloco que falhou na mineração após todas as tentativas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBlock {
    pub block_number: u64,
    pub reason: String,
    pub attempts: u32,
}

/// Metadados persistidos de uma execução de mineração
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningRunRecord {
    pub run_id: RunId,
    pub run: MiningRun,
    pub candidate_count: usize,
    pub dropped_by_cap: usize,
    pub failed_blocks: Vec<FailedBlock>,
    pub mined_at: DateTime<Utc>,
}

impl MiningRunRecord {
    /// Mineração completa, sem blocos pulados
    pub fn is_complete(&self) -> bool {
        self.failed_blocks.is_empty()
    }
}

/// Veredito persistido com metadados de execução
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub run_id: RunId,
    pub pair_id: PairId,
    pub block_number: u64,
    pub verdict: Verdict,
    pub recorded_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Filtro de consulta de vereditos
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictFilter {
    pub run_id: Option<RunId>,
    pub block_range: Option<BlockRange>,
}

impl VerdictFilter {
    pub fn for_run(run_id: RunId) -> Self {
        Self { run_id: Some(run_id), block_range: None }
    }

    pub fn matches(&self, record: &VerdictRecord) -> bool {
        if let Some(run) = &self.run_id {
            if &record.run_id != run {
                return false;
            }
        }
        match &self.block_range {
            Some(range) => range.contains(record.block_number),
            None => true,
        }
    }
}
