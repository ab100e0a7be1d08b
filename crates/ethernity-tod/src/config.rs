use ethernity_core::{BlockRange, Error, MiningRun, Result};
use ethernity_rpc::RpcConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Heurística de sobreposição usada na mineração
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapKind {
    /// Conflito por chave de estado (conta ou slot)
    #[default]
    Slot,
    /// Conflito por endereço: mais recall, menos precisão
    Address,
}

/// Política de novas tentativas para erros transitórios do node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Configuração do pipeline de mineração e confirmação
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Intervalo `inicio-fim`, fim incluído; dispensável no modo de re-trace
    pub block_range: Option<BlockRange>,
    /// Distância máxima de índice entre as transações de um par
    pub window_size: usize,
    /// Limite de pares por (contratos, seletores); `None` desliga o limite
    pub duplicate_cap: Option<usize>,
    /// Pares (ou blocos) processados simultaneamente
    pub concurrency: usize,
    pub overlap: OverlapKind,
    /// Ignora pares enviados pela mesma conta
    pub skip_same_sender: bool,
    /// Divergência só na árvore de chamadas conta como TOD
    pub upgrade_deep_divergence: bool,
    pub retry: RetryConfig,
    pub rpc: RpcConfig,
    /// Arquivo `redb`; sem ele o store é volátil
    pub store_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_range: None,
            window_size: 5,
            duplicate_cap: None,
            concurrency: 8,
            overlap: OverlapKind::default(),
            skip_same_sender: true,
            upgrade_deep_divergence: false,
            retry: RetryConfig::default(),
            rpc: RpcConfig::default(),
            store_path: None,
        }
    }
}

impl PipelineConfig {
    /// Carrega a configuração de um arquivo JSON e valida
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("falha ao ler {}: {}", path.display(), e)))?;
        let config: PipelineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::ValidationError("concorrência deve ser maior que zero".into()));
        }
        if self.window_size == 0 {
            return Err(Error::ValidationError("janela deve ser maior que zero".into()));
        }
        if self.duplicate_cap == Some(0) {
            return Err(Error::ValidationError(
                "limite de duplicados zero descartaria todos os pares".into(),
            ));
        }
        if self.rpc.max_in_flight == 0 {
            return Err(Error::ValidationError("max_in_flight deve ser maior que zero".into()));
        }
        Ok(())
    }

    /// Parâmetros de mineração; exige um intervalo de blocos
    pub fn mining_run(&self) -> Result<MiningRun> {
        let block_range = self
            .block_range
            .ok_or_else(|| Error::ValidationError("intervalo de blocos não informado".into()))?;
        Ok(MiningRun {
            block_range,
            window_size: self.window_size,
            duplicate_cap: self.duplicate_cap,
            skip_same_sender: self.skip_same_sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "block_range": "0x10-20",
                "window_size": 3,
                "duplicate_cap": 2,
                "overlap": "address",
                "rpc": {{ "endpoint": "http://archive:8545", "dialect": "state_overrides" }}
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.block_range, Some(BlockRange::new(16, 20).unwrap()));
        assert_eq!(config.overlap, OverlapKind::Address);
        assert_eq!(config.concurrency, 8);
        assert!(config.skip_same_sender);
        assert_eq!(config.rpc.endpoint, "http://archive:8545");
        assert_eq!(config.rpc.timeout_ms, 60_000);

        let run = config.mining_run().unwrap();
        assert_eq!(run.window_size, 3);
        assert_eq!(run.duplicate_cap, Some(2));
    }

    #[test]
    fn rejects_inverted_range_and_zero_concurrency() {
        let inverted = serde_json::from_str::<PipelineConfig>(r#"{ "block_range": "20-10" }"#);
        assert!(inverted.is_err());

        let config = PipelineConfig { concurrency: 0, ..PipelineConfig::default() };
        assert!(matches!(config.validate(), Err(Error::ValidationError(_))));
    }

    #[test]
    fn mining_requires_block_range() {
        assert!(PipelineConfig::default().mining_run().is_err());
    }
}
