/*!
 * Ethernity TOD
 *
 * Mineração de pares candidatos a dependência de ordem (TOD) por janela de
 * índices e confirmação por reexecução das duas ordens sobre o estado pai.
 */

pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod diff;
pub mod engine;
pub mod miner;
pub mod overlap;
pub mod report;
pub mod retry;

// Re-exportações públicas
pub use config::{OverlapKind, PipelineConfig, RetryConfig};
pub use coordinator::PipelineCoordinator;
pub use dedup::DuplicateCap;
pub use diff::{compare, DiffLayer, DiffOutcome};
pub use engine::ReorderTraceEngine;
pub use miner::{MiningOutcome, WindowMiner};
pub use overlap::{AddressOverlap, OverlapStrategy, SlotOverlap};
pub use report::{RejectedPair, RunReport};
pub use retry::RetryPolicy;
