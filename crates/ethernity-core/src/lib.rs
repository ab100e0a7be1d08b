/*!
 * Ethernity Core
 *
 * Tipos, erros e contratos compartilhados para a mineração e confirmação
 * de dependência de ordem de transações (TOD)
 */

pub mod types;
pub mod traits;
pub mod utils;
pub mod error;

// Re-exportações públicas
pub use error::{Error, NodeError, NodeErrorKind, NodeResult, Result};
pub use traits::{CandidateStore, NodeClient};
pub use types::*;
