use crate::config::RetryConfig;
use ethernity_core::NodeResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff exponencial limitado; só erros transitórios são repetidos
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_retries, base_delay, max_delay }
    }

    /// Sem novas tentativas
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Espera antes da tentativa `attempt` (a primeira repetição é 1)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Executa `op` e devolve o resultado final com o número de tentativas feitas
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> (NodeResult<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NodeResult<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op().await {
                Err(e) if e.is_transient() && attempts <= self.max_retries => {
                    let delay = self.delay_for(attempts);
                    warn!(operation = what, attempt = attempts, ?delay, error = %e, "erro transitório, nova tentativa");
                    tokio::time::sleep(delay).await;
                }
                outcome => return (outcome, attempts),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay(), config.max_delay())
    }
}
