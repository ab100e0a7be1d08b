/*!
 * Ethernity RPC
 *
 * Cliente de node de arquivo: blocos, pegadas de acesso via `prestateTracer`
 * e replay de transações reordenadas via `callTracer`.
 */

mod client;
mod config;
mod dialect;
mod throttle;
pub mod tracer;

pub use client::{EthernityRpcClient, JsonRpc};
pub use config::{RpcConfig, TracerDialect};
pub use dialect::{CallManyDialect, ReplayDialect, StateOverrideDialect};
pub use throttle::RequestLimiter;
