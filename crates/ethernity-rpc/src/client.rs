use crate::config::RpcConfig;
use crate::dialect::ReplayDialect;
use crate::throttle::RequestLimiter;
use crate::tracer::{
    footprint_from_prestate, CallRequest, PrestateDiff, PrestateMap, RpcBlock, RpcTransaction,
};
use async_trait::async_trait;
use ethernity_core::utils::{format_block_number, format_h256};
use ethernity_core::{
    AccessFootprint, Error, NodeClient, NodeError, NodeResult, ParentState, Result, TraceResult,
    TransactionHash, TransactionRef,
};
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Mensagens de erro que indicam falta de estado ou de suporte no node
const PERMANENT_MESSAGES: &[&str] = &[
    "missing trie node",
    "not supported",
    "does not exist",
    "unknown block",
    "tracer not found",
];

/// Classifica um erro do provider em transitório ou permanente
pub(crate) fn classify(method: &str, err: ProviderError) -> NodeError {
    if let Some(resp) = err.as_error_response() {
        let message = format!("{}: {} (código {})", method, resp.message, resp.code);
        let lowered = resp.message.to_lowercase();
        let permanent = matches!(resp.code, -32600 | -32601 | -32602)
            || PERMANENT_MESSAGES.iter().any(|m| lowered.contains(m));
        return if permanent {
            NodeError::permanent(message)
        } else {
            NodeError::transient(message)
        };
    }
    // corpo não-JSON vem de gateway ou proxy, não do node
    NodeError::transient(format!("{}: {}", method, err))
}

/// Transporte JSON-RPC com timeout por requisição.
///
/// Toda requisição ao endpoint passa pelo mesmo limitador, então
/// `max_in_flight` e o intervalo mínimo valem por chamada HTTP, não por
/// operação do node.
pub struct JsonRpc {
    provider: Provider<Http>,
    timeout: Duration,
    limiter: RequestLimiter,
}

impl JsonRpc {
    pub fn new(endpoint: &str, timeout: Duration, limiter: RequestLimiter) -> Result<Self> {
        let provider = Provider::<Http>::try_from(endpoint)
            .map_err(|e| Error::ValidationError(format!("endpoint inválido {}: {}", endpoint, e)))?;
        Ok(Self { provider, timeout, limiter })
    }

    /// Transporte com os limites do `RpcConfig`
    pub fn from_config(endpoint: &str, config: &RpcConfig) -> Result<Self> {
        let limiter = RequestLimiter::new(config.max_in_flight, config.min_request_interval());
        Self::new(endpoint, config.timeout(), limiter)
    }

    /// Executa a chamada e decodifica o resultado
    pub async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> NodeResult<R> {
        // a vaga fica ocupada até a resposta (ou o timeout)
        let _permit = self.limiter.admit().await;
        let call = self.provider.request::<Value, Value>(method, params);
        let value = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(classify(method, e)),
            Err(_) => {
                return Err(NodeError::transient(format!(
                    "{}: timeout após {:?}",
                    method, self.timeout
                )))
            }
        };
        serde_json::from_value(value)
            .map_err(|e| NodeError::permanent(format!("{}: resposta malformada: {}", method, e)))
    }
}

/// Cliente de node de arquivo para mineração e replay
pub struct EthernityRpcClient {
    rpc: JsonRpc,
    /// Endpoint dedicado aos `debug_trace*`, quando configurado
    traces: Option<JsonRpc>,
    dialect: Box<dyn ReplayDialect>,
    blocks: Mutex<LruCache<u64, Arc<RpcBlock>>>,
}

impl EthernityRpcClient {
    /// Cria o cliente sem tocar a rede
    pub fn new(config: RpcConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.block_cache_size.max(1))
            .ok_or_else(|| Error::ValidationError("cache de blocos vazio".into()))?;
        let traces = match &config.trace_endpoint {
            Some(endpoint) => Some(JsonRpc::from_config(endpoint, &config)?),
            None => None,
        };
        Ok(Self {
            rpc: JsonRpc::from_config(&config.endpoint, &config)?,
            traces,
            dialect: config.dialect.build(),
            blocks: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Cria o cliente e verifica a conexão com o node
    pub async fn connect(config: RpcConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let head: ethers::types::U64 = client.rpc.request("eth_blockNumber", json!([])).await?;
        debug!(head = head.as_u64(), dialect = client.dialect.name(), "conectado ao node");
        Ok(client)
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    fn trace_rpc(&self) -> &JsonRpc {
        self.traces.as_ref().unwrap_or(&self.rpc)
    }

    /// Obtém um bloco com transações, usando o cache LRU
    pub async fn block(&self, block_number: u64) -> NodeResult<Arc<RpcBlock>> {
        if let Some(block) = self.blocks.lock().get(&block_number).cloned() {
            return Ok(block);
        }

        let block: Option<RpcBlock> = self
            .rpc
            .request(
                "eth_getBlockByNumber",
                json!([format_block_number(block_number), true]),
            )
            .await?;
        let block = Arc::new(block.ok_or_else(|| {
            NodeError::permanent(format!("bloco {} não encontrado", block_number))
        })?);

        self.blocks.lock().put(block_number, block.clone());
        Ok(block)
    }

    async fn raw_transaction(
        &self,
        tx: &TransactionRef,
    ) -> NodeResult<(Arc<RpcBlock>, RpcTransaction)> {
        let block = self.block(tx.block_number).await?;
        let raw = block.transaction(&tx.hash).cloned().ok_or_else(|| {
            NodeError::permanent(format!(
                "transação {} ausente do bloco {}",
                format_h256(&tx.hash),
                tx.block_number
            ))
        })?;
        Ok((block, raw))
    }

    async fn prestate(&self, call: &CallRequest, parent: &ParentState) -> NodeResult<PrestateMap> {
        self.trace_rpc()
            .request(
                "debug_traceCall",
                json!([call, format_h256(&parent.hash), { "tracer": "prestateTracer" }]),
            )
            .await
    }

    async fn prestate_diff(
        &self,
        call: &CallRequest,
        parent: &ParentState,
    ) -> NodeResult<PrestateDiff> {
        self.trace_rpc()
            .request(
                "debug_traceCall",
                json!([
                    call,
                    format_h256(&parent.hash),
                    { "tracer": "prestateTracer", "tracerConfig": { "diffMode": true } }
                ]),
            )
            .await
    }
}

#[async_trait]
impl NodeClient for EthernityRpcClient {
    async fn fetch_block_transactions(&self, block_number: u64) -> NodeResult<Vec<TransactionRef>> {
        let block = self.block(block_number).await?;
        let mut refs = block
            .transactions
            .iter()
            .map(|t| {
                t.to_ref().ok_or_else(|| {
                    NodeError::permanent(format!(
                        "transação {} sem posição no bloco {}",
                        format_h256(&t.hash),
                        block_number
                    ))
                })
            })
            .collect::<NodeResult<Vec<_>>>()?;
        refs.sort_by_key(|t| t.index);
        Ok(refs)
    }

    async fn fetch_transaction(&self, tx_hash: TransactionHash) -> NodeResult<TransactionRef> {
        let raw: Option<RpcTransaction> = self
            .rpc
            .request("eth_getTransactionByHash", json!([format_h256(&tx_hash)]))
            .await?;
        let raw = raw.ok_or_else(|| {
            NodeError::permanent(format!("transação {} não encontrada", format_h256(&tx_hash)))
        })?;
        raw.to_ref().ok_or_else(|| {
            NodeError::permanent(format!("transação {} pendente", format_h256(&tx_hash)))
        })
    }

    async fn parent_state(&self, block_number: u64) -> NodeResult<ParentState> {
        if block_number == 0 {
            return Err(NodeError::permanent("bloco gênese não tem estado pai"));
        }
        let block = self.block(block_number).await?;
        Ok(ParentState { number: block_number - 1, hash: block.parent_hash })
    }

    async fn access_footprint(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
    ) -> NodeResult<AccessFootprint> {
        let (block, raw) = self.raw_transaction(tx).await?;
        let call = CallRequest::from(&raw);

        let (prestate, diff) =
            futures::try_join!(self.prestate(&call, parent), self.prestate_diff(&call, parent))?;

        // toda transação paga taxa ao fee recipient
        Ok(footprint_from_prestate(&prestate, &diff).without_address(block.miner))
    }

    async fn replay(
        &self,
        tx: &TransactionRef,
        parent: &ParentState,
        preceding: &[TransactionRef],
    ) -> NodeResult<TraceResult> {
        if parent.number + 1 != tx.block_number {
            return Err(NodeError::permanent(format!(
                "estado pai {} não precede o bloco {}",
                parent.number, tx.block_number
            )));
        }

        let (block, raw) = self.raw_transaction(tx).await?;
        let mut prior = Vec::with_capacity(preceding.len());
        for p in preceding {
            let (_, raw_prior) = self.raw_transaction(p).await?;
            prior.push(raw_prior);
        }

        let frame = self
            .dialect
            .trace_after(self.trace_rpc(), &block, parent, &raw, &prior)
            .await
            .map_err(|e| {
                warn!(tx = %format_h256(&tx.hash), dialect = self.dialect.name(), error = %e, "replay falhou");
                e
            })?;
        Ok(frame.into_trace_result())
    }
}
