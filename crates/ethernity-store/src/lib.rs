/*!
 * Ethernity Store
 *
 * Implementações de [`CandidateStore`]: em memória para testes e execuções
 * descartáveis, e em arquivo (`redb`) para execuções retomáveis.
 */

mod keys;
mod memory;
mod redb_store;

pub use ethernity_core::CandidateStore;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
