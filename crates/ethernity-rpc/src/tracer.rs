/*!
 * Formatos de resposta dos tracers nativos (`callTracer`, `prestateTracer`)
 * e conversão para os tipos do ethernity-core
 */

use ethernity_core::utils::{decode_revert_reason, function_selector};
use ethernity_core::{
    AccessFootprint, CallFrame, CallType, StateKey, TraceLog, TraceResult, TransactionRef,
};
use ethers::types::{Address, Bytes, H256, U256, U64};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transação como retornada por `eth_getBlockByNumber(n, true)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: H256,
    pub block_number: Option<U64>,
    pub transaction_index: Option<U64>,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    pub gas: U256,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub input: Bytes,
}

impl RpcTransaction {
    /// Converte para referência; `None` para transações pendentes
    pub fn to_ref(&self) -> Option<TransactionRef> {
        Some(TransactionRef {
            block_number: self.block_number?.as_u64(),
            hash: self.hash,
            index: self.transaction_index?.as_usize(),
            from: self.from,
            to: self.to,
            selector: function_selector(&self.input),
        })
    }
}

/// Bloco com transações completas
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: U64,
    pub hash: H256,
    pub parent_hash: H256,
    pub miner: Address,
    pub timestamp: U64,
    pub base_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

impl RpcBlock {
    pub fn transaction(&self, hash: &H256) -> Option<&RpcTransaction> {
        self.transactions.iter().find(|t| &t.hash == hash)
    }
}

/// Objeto de chamada aceito por `debug_traceCall` e `debug_traceCallMany`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub gas: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    pub value: U256,
    pub data: Bytes,
}

impl From<&RpcTransaction> for CallRequest {
    fn from(tx: &RpcTransaction) -> Self {
        // gasPrice e campos EIP-1559 são mutuamente exclusivos
        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = match tx.max_fee_per_gas {
            Some(max_fee) => (None, Some(max_fee), tx.max_priority_fee_per_gas),
            None => (tx.gas_price, None, None),
        };
        Self {
            from: tx.from,
            to: tx.to,
            gas: tx.gas,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            value: tx.value,
            data: tx.input.clone(),
        }
    }
}

/// Log anexado a um frame do `callTracer` com `withLog`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallTracerLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<H256>,
    #[serde(default)]
    pub data: Bytes,
    /// Quantidade de subchamadas do frame feitas antes do log
    #[serde(default)]
    pub position: Option<U64>,
}

/// Frame do `callTracer`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTracerFrame {
    #[serde(rename = "type")]
    pub call_type: String,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub output: Option<Bytes>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallTracerFrame>,
    #[serde(default)]
    pub logs: Vec<CallTracerLog>,
}

impl CallTracerFrame {
    pub fn into_trace_result(self) -> TraceResult {
        let mut logs = Vec::new();
        collect_logs(&self, &mut logs);

        let return_data = self.output.clone().unwrap_or_default();
        let revert_reason = match (&self.error, &self.revert_reason) {
            (None, _) => None,
            (Some(_), Some(reason)) => Some(reason.clone()),
            (Some(_), None) => decode_revert_reason(&return_data),
        };

        TraceResult {
            success: self.error.is_none(),
            error: self.error.clone(),
            revert_reason,
            gas_used: self.gas_used.unwrap_or_default(),
            logs,
            return_data,
            call_tree: self.into_call_frame(),
        }
    }

    fn into_call_frame(self) -> CallFrame {
        CallFrame {
            call_type: CallType::from(self.call_type.as_str()),
            from: self.from,
            to: self.to,
            value: self.value,
            gas_used: self.gas_used.unwrap_or_default(),
            input: self.input,
            output: self.output.unwrap_or_default(),
            error: self.error,
            children: self.calls.into_iter().map(CallTracerFrame::into_call_frame).collect(),
        }
    }
}

/// Achata os logs em ordem de emissão, intercalando com as subchamadas.
/// Frames revertidos não emitem logs, nem os seus descendentes.
fn collect_logs(frame: &CallTracerFrame, out: &mut Vec<TraceLog>) {
    if frame.error.is_some() {
        return;
    }
    let last = frame.calls.len();
    let position = |log: &CallTracerLog| {
        log.position.map(|p| p.as_usize().min(last)).unwrap_or(last)
    };

    for k in 0..=last {
        for log in frame.logs.iter().filter(|l| position(l) == k) {
            out.push(TraceLog {
                address: log.address,
                topics: log.topics.clone(),
                data: log.data.clone(),
            });
        }
        if let Some(child) = frame.calls.get(k) {
            collect_logs(child, out);
        }
    }
}

/// Conta no formato do `prestateTracer`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrestateAccount {
    #[serde(default)]
    pub balance: Option<U256>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub code: Option<Bytes>,
    #[serde(default)]
    pub storage: Option<BTreeMap<H256, H256>>,
}

impl PrestateAccount {
    fn touches_account_fields(&self) -> bool {
        self.balance.is_some() || self.nonce.is_some() || self.code.is_some()
    }

    fn slots(&self) -> impl Iterator<Item = &H256> {
        self.storage.iter().flat_map(|s| s.keys())
    }
}

pub type PrestateMap = BTreeMap<Address, PrestateAccount>;

/// Saída do `prestateTracer` com `diffMode: true`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrestateDiff {
    #[serde(default)]
    pub pre: PrestateMap,
    #[serde(default)]
    pub post: PrestateMap,
}

/// Monta a pegada de acesso: leituras do prestate, escritas do diff
pub fn footprint_from_prestate(prestate: &PrestateMap, diff: &PrestateDiff) -> AccessFootprint {
    let mut footprint = AccessFootprint::default();

    for (address, account) in prestate {
        footprint.reads.insert(StateKey::Account(*address));
        for slot in account.slots() {
            footprint.reads.insert(StateKey::Storage(*address, *slot));
        }
    }

    for (address, account) in diff.pre.iter().chain(diff.post.iter()) {
        if account.touches_account_fields() {
            footprint.writes.insert(StateKey::Account(*address));
        }
        for slot in account.slots() {
            footprint.writes.insert(StateKey::Storage(*address, *slot));
        }
    }

    footprint
}

/// Override de conta no formato do `debug_traceCall` do Geth
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub state_diff: BTreeMap<H256, H256>,
}

pub type StateOverrides = BTreeMap<Address, AccountOverride>;

/// Aplica o diff de uma transação sobre os overrides acumulados
pub fn apply_state_diff(overrides: &mut StateOverrides, diff: &PrestateDiff) {
    for (address, pre) in &diff.pre {
        let entry = overrides.entry(*address).or_default();
        match diff.post.get(address) {
            // conta destruída
            None => {
                entry.balance = Some(U256::zero());
                entry.nonce = Some(U64::zero());
                entry.code = Some(Bytes::default());
                for slot in pre.slots() {
                    entry.state_diff.insert(*slot, H256::zero());
                }
            }
            Some(post) => {
                let post_slots = post.storage.as_ref();
                for slot in pre.slots() {
                    if !post_slots.map_or(false, |s| s.contains_key(slot)) {
                        entry.state_diff.insert(*slot, H256::zero());
                    }
                }
            }
        }
    }

    for (address, post) in &diff.post {
        let entry = overrides.entry(*address).or_default();
        if let Some(balance) = post.balance {
            entry.balance = Some(balance);
        }
        if let Some(nonce) = post.nonce {
            entry.nonce = Some(U64::from(nonce));
        }
        if let Some(code) = &post.code {
            entry.code = Some(code.clone());
        }
        if let Some(storage) = &post.storage {
            for (slot, value) in storage {
                entry.state_diff.insert(*slot, *value);
            }
        }
    }
}
