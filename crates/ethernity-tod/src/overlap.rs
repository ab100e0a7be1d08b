/*!
 * Estratégias de sobreposição de estado entre duas transações.
 *
 * `first` é a transação de menor índice no bloco; o tipo de conflito é
 * relativo a ela.
 */

use crate::config::OverlapKind;
use ethernity_core::{AccessFootprint, ConflictKind, OverlapEvidence, StateConflict, StateKey};

/// Calcula a evidência de interferência de um par
pub trait OverlapStrategy: Send + Sync {
    /// Nome estável, entra na identidade da execução
    fn name(&self) -> &'static str;

    fn evidence(&self, first: &AccessFootprint, second: &AccessFootprint) -> OverlapEvidence;
}

impl OverlapKind {
    pub fn build(self) -> Box<dyn OverlapStrategy> {
        match self {
            OverlapKind::Slot => Box::new(SlotOverlap),
            OverlapKind::Address => Box::new(AddressOverlap),
        }
    }
}

/// Conflito quando uma mesma chave é escrita por ao menos um dos lados
pub struct SlotOverlap;

impl OverlapStrategy for SlotOverlap {
    fn name(&self) -> &'static str {
        "slot"
    }

    fn evidence(&self, first: &AccessFootprint, second: &AccessFootprint) -> OverlapEvidence {
        let mut conflicts = Vec::new();
        for key in &first.writes {
            if second.writes_key(key) {
                conflicts.push(StateConflict { key: *key, kind: ConflictKind::WriteWrite });
            } else if second.reads_key(key) {
                conflicts.push(StateConflict { key: *key, kind: ConflictKind::WriteRead });
            }
        }
        for key in &second.writes {
            if !first.writes_key(key) && first.reads_key(key) {
                conflicts.push(StateConflict { key: *key, kind: ConflictKind::ReadWrite });
            }
        }
        conflicts.sort_by(|a, b| a.key.cmp(&b.key).then(a.kind.cmp(&b.kind)));
        OverlapEvidence { conflicts }
    }
}

/// Conflito quando um lado escreve em um endereço que o outro toca
pub struct AddressOverlap;

impl OverlapStrategy for AddressOverlap {
    fn name(&self) -> &'static str {
        "address"
    }

    fn evidence(&self, first: &AccessFootprint, second: &AccessFootprint) -> OverlapEvidence {
        let first_writes = first.written_addresses();
        let second_writes = second.written_addresses();
        let first_touches = first.touched_addresses();
        let second_touches = second.touched_addresses();

        let conflicts = first_touches
            .intersection(&second_touches)
            .filter_map(|address| {
                let kind = match (first_writes.contains(address), second_writes.contains(address)) {
                    (true, true) => ConflictKind::WriteWrite,
                    (true, false) => ConflictKind::WriteRead,
                    (false, true) => ConflictKind::ReadWrite,
                    (false, false) => return None,
                };
                Some(StateConflict { key: StateKey::Account(*address), kind })
            })
            .collect();
        OverlapEvidence { conflicts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, H256};

    fn slot(contract: u8, slot: u8) -> StateKey {
        StateKey::Storage(Address::repeat_byte(contract), H256::repeat_byte(slot))
    }

    fn footprint(reads: &[StateKey], writes: &[StateKey]) -> AccessFootprint {
        AccessFootprint {
            reads: reads.iter().copied().collect(),
            writes: writes.iter().copied().collect(),
        }
    }

    #[test]
    fn slot_overlap_classifies_each_key() {
        let first = footprint(&[slot(1, 1), slot(1, 2)], &[slot(1, 1), slot(2, 9)]);
        let second = footprint(&[slot(1, 1), slot(1, 2)], &[slot(1, 2), slot(2, 9)]);

        let evidence = SlotOverlap.evidence(&first, &second);
        let kinds: Vec<_> = evidence.conflicts.iter().map(|c| (c.key, c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (slot(1, 1), ConflictKind::WriteRead),
                (slot(1, 2), ConflictKind::ReadWrite),
                (slot(2, 9), ConflictKind::WriteWrite),
            ]
        );
    }

    #[test]
    fn shared_reads_are_not_a_conflict() {
        let first = footprint(&[slot(1, 1)], &[]);
        let second = footprint(&[slot(1, 1)], &[slot(3, 3)]);
        assert!(SlotOverlap.evidence(&first, &second).is_empty());
        assert!(AddressOverlap.evidence(&first, &second).is_empty());
    }

    #[test]
    fn address_overlap_catches_different_slots_of_one_contract() {
        let first = footprint(&[], &[slot(1, 1)]);
        let second = footprint(&[slot(1, 2)], &[]);
        assert!(SlotOverlap.evidence(&first, &second).is_empty());

        let evidence = AddressOverlap.evidence(&first, &second);
        assert_eq!(evidence.conflicts.len(), 1);
        assert_eq!(evidence.conflicts[0].kind, ConflictKind::WriteRead);
        assert_eq!(evidence.contracts().into_iter().next(), Some(Address::repeat_byte(1)));
    }
}
