use ethereum_types::Address;
use ethernity_core::{CandidatePair, Selector};
use std::collections::HashMap;

/// (destino do primeiro, destino do segundo, seletor do primeiro, seletor do segundo)
pub type CapKey = (Option<Address>, Option<Address>, Option<Selector>, Option<Selector>);

/// Limita pares repetidos por contratos e assinaturas de chamada.
///
/// Os pares devem ser oferecidos na ordem global de varredura; os `d`
/// primeiros de cada chave passam e o excedente é descartado.
#[derive(Debug, Default)]
pub struct DuplicateCap {
    limit: Option<usize>,
    seen: HashMap<CapKey, usize>,
    dropped: usize,
}

impl DuplicateCap {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, seen: HashMap::new(), dropped: 0 }
    }

    pub fn key(pair: &CandidatePair) -> CapKey {
        (pair.first.to, pair.second.to, pair.first.selector, pair.second.selector)
    }

    /// Registra o par e indica se ele deve ser proposto
    pub fn admit(&mut self, pair: &CandidatePair) -> bool {
        let Some(limit) = self.limit else {
            return true;
        };
        let count = self.seen.entry(Self::key(pair)).or_insert(0);
        if *count >= limit {
            self.dropped += 1;
            return false;
        }
        *count += 1;
        true
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
