use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dialeto de trace exposto pelo node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracerDialect {
    /// `debug_traceCallMany` com bundles (Erigon, Reth)
    CallMany,
    /// `debug_traceCall` com `stateOverrides` acumulados (Geth)
    StateOverrides,
}

impl Default for TracerDialect {
    fn default() -> Self {
        TracerDialect::CallMany
    }
}

/// Configuração do cliente RPC
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub endpoint: String,
    /// Endpoint separado para as chamadas `debug_trace*`; sem ele, usa `endpoint`
    pub trace_endpoint: Option<String>,
    /// Timeout por requisição em milissegundos
    pub timeout_ms: u64,
    pub dialect: TracerDialect,
    /// Quantidade de blocos mantidos no cache LRU
    pub block_cache_size: usize,
    /// Máximo de requisições simultâneas por endpoint
    pub max_in_flight: usize,
    /// Intervalo mínimo entre requisições, em milissegundos
    pub min_request_interval_ms: Option<u64>,
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_request_interval(&self) -> Option<Duration> {
        self.min_request_interval_ms.map(Duration::from_millis)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            trace_endpoint: None,
            timeout_ms: 60_000,
            dialect: TracerDialect::default(),
            block_cache_size: 256,
            max_in_flight: 8,
            min_request_interval_ms: None,
        }
    }
}
