use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Limita requisições simultâneas e a taxa de requisições a um endpoint.
///
/// Cada chamada JSON-RPC passa por `admit`, inclusive as disparadas em
/// paralelo dentro de uma mesma operação do node.
pub struct RequestLimiter {
    permits: Semaphore,
    min_interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl RequestLimiter {
    pub fn new(max_in_flight: usize, min_interval: Option<Duration>) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Aguarda vaga e intervalo; a vaga dura enquanto o permit existir
    pub async fn admit(&self) -> Option<SemaphorePermit<'_>> {
        // o semáforo nunca é fechado
        let permit = self.permits.acquire().await.ok();

        if let Some(interval) = self.min_interval {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            if *slot > now {
                tokio::time::sleep_until(*slot).await;
            }
            *slot = (*slot).max(now) + interval;
        }
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn limits_in_flight_requests() {
        let limiter = Arc::new(RequestLimiter::new(2, None));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let calls = (0..8).map(|_| {
            let (limiter, active, peak) = (limiter.clone(), active.clone(), peak.clone());
            tokio::spawn(async move {
                let _permit = limiter.admit().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        });
        for call in futures::future::join_all(calls).await {
            call.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_requests_by_min_interval() {
        let limiter = RequestLimiter::new(4, Some(Duration::from_millis(100)));
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = limiter.admit().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
