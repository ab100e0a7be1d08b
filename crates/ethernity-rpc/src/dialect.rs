/*!
 * Dialetos de replay com transações precedentes.
 *
 * Cada implementação de node expõe a reordenação de um jeito diferente;
 * o restante do pipeline só enxerga [`ReplayDialect`].
 */

use crate::client::JsonRpc;
use crate::config::TracerDialect;
use crate::tracer::{
    apply_state_diff, CallRequest, CallTracerFrame, PrestateDiff, RpcBlock, RpcTransaction,
    StateOverrides,
};
use async_trait::async_trait;
use ethernity_core::utils::{format_block_number, format_h256};
use ethernity_core::{NodeError, NodeResult, ParentState};
use serde_json::{json, Value};
use tracing::debug;

/// Capacidade de reexecutar uma transação após uma lista de precedentes
#[async_trait]
pub trait ReplayDialect: Send + Sync {
    fn name(&self) -> &'static str;

    async fn trace_after(
        &self,
        rpc: &JsonRpc,
        block: &RpcBlock,
        parent: &ParentState,
        tx: &RpcTransaction,
        preceding: &[RpcTransaction],
    ) -> NodeResult<CallTracerFrame>;
}

impl TracerDialect {
    /// Instancia a implementação do dialeto configurado
    pub fn build(self) -> Box<dyn ReplayDialect> {
        match self {
            TracerDialect::CallMany => Box::new(CallManyDialect),
            TracerDialect::StateOverrides => Box::new(StateOverrideDialect),
        }
    }
}

fn call_tracer_config() -> Value {
    json!({ "tracer": "callTracer", "tracerConfig": { "withLog": true } })
}

/// `debug_traceCallMany` (Erigon, Reth): um único bundle com os precedentes
/// seguidos da transação sondada, sobre o estado anterior ao índice 0 do bloco.
pub struct CallManyDialect;

#[async_trait]
impl ReplayDialect for CallManyDialect {
    fn name(&self) -> &'static str {
        "call_many"
    }

    async fn trace_after(
        &self,
        rpc: &JsonRpc,
        block: &RpcBlock,
        parent: &ParentState,
        tx: &RpcTransaction,
        preceding: &[RpcTransaction],
    ) -> NodeResult<CallTracerFrame> {
        if block.parent_hash != parent.hash {
            return Err(NodeError::permanent(format!(
                "bloco {} não descende do estado pai {}",
                block.number,
                format_h256(&parent.hash)
            )));
        }

        let mut transactions: Vec<CallRequest> = preceding.iter().map(CallRequest::from).collect();
        transactions.push(CallRequest::from(tx));
        let expected = transactions.len();

        let params = json!([
            [{ "transactions": transactions }],
            { "blockNumber": format_block_number(block.number.as_u64()), "transactionIndex": 0 },
            call_tracer_config(),
        ]);
        let bundles: Vec<Vec<Value>> = rpc.request("debug_traceCallMany", params).await?;

        let traces = bundles
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::permanent("debug_traceCallMany sem bundles"))?;
        if traces.len() != expected {
            return Err(NodeError::permanent(format!(
                "debug_traceCallMany retornou {} traces, esperado {}",
                traces.len(),
                expected
            )));
        }
        let last = traces
            .into_iter()
            .last()
            .ok_or_else(|| NodeError::permanent("bundle vazio"))?;
        serde_json::from_value(last)
            .map_err(|e| NodeError::permanent(format!("trace malformado: {}", e)))
    }
}

/// `debug_traceCall` (Geth): cada precedente é executado com o
/// `prestateTracer` em modo diff e o pós-estado vira `stateOverrides`
/// da próxima chamada.
pub struct StateOverrideDialect;

impl StateOverrideDialect {
    fn block_overrides(block: &RpcBlock) -> Value {
        let mut overrides = json!({
            "number": format_block_number(block.number.as_u64()),
            "time": format_block_number(block.timestamp.as_u64()),
        });
        if let Some(base_fee) = block.base_fee_per_gas {
            overrides["baseFee"] = json!(base_fee);
        }
        overrides
    }
}

#[async_trait]
impl ReplayDialect for StateOverrideDialect {
    fn name(&self) -> &'static str {
        "state_overrides"
    }

    async fn trace_after(
        &self,
        rpc: &JsonRpc,
        block: &RpcBlock,
        parent: &ParentState,
        tx: &RpcTransaction,
        preceding: &[RpcTransaction],
    ) -> NodeResult<CallTracerFrame> {
        let parent_hash = format_h256(&parent.hash);
        let block_overrides = Self::block_overrides(block);
        let mut overrides = StateOverrides::new();

        for prior in preceding {
            let params = json!([
                CallRequest::from(prior),
                parent_hash,
                {
                    "tracer": "prestateTracer",
                    "tracerConfig": { "diffMode": true },
                    "stateOverrides": overrides,
                    "blockOverrides": block_overrides,
                },
            ]);
            let diff: PrestateDiff = rpc.request("debug_traceCall", params).await?;
            apply_state_diff(&mut overrides, &diff);
            debug!(tx = %format_h256(&prior.hash), accounts = overrides.len(), "diff precedente aplicado");
        }

        let mut config = call_tracer_config();
        config["stateOverrides"] = json!(overrides);
        config["blockOverrides"] = block_overrides;
        let params = json!([CallRequest::from(tx), parent_hash, config]);
        rpc.request("debug_traceCall", params).await
    }
}
