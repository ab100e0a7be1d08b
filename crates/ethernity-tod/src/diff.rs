/*!
 * Comparação em camadas de dois traces da mesma transação.
 *
 * Camadas de superfície (status, logs, dados de retorno) são observáveis
 * fora da EVM e confirmam a dependência de ordem. Camadas profundas (gás,
 * árvore de chamadas) sozinhas deixam o veredito ambíguo.
 */

use ethernity_core::{CallFrame, TraceResult, Verdict};
use std::fmt;

/// Camada em que os traces divergiram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffLayer {
    Status,
    Logs,
    ReturnData,
    GasUsed,
    CallTree,
}

impl fmt::Display for DiffLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiffLayer::Status => "status",
            DiffLayer::Logs => "logs",
            DiffLayer::ReturnData => "return_data",
            DiffLayer::GasUsed => "gas_used",
            DiffLayer::CallTree => "call_tree",
        };
        write!(f, "{}", name)
    }
}

/// Resultado da comparação
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Nenhuma camada diverge
    Identical,
    /// Primeira camada de superfície que diverge
    Surface(DiffLayer),
    /// Só camadas profundas divergem
    Ambiguous(Vec<DiffLayer>),
}

impl DiffOutcome {
    /// Converte em veredito; com `upgrade_deep` a divergência na árvore de
    /// chamadas também confirma
    pub fn into_verdict(self, upgrade_deep: bool) -> Verdict {
        match self {
            DiffOutcome::Identical => Verdict::NotConfirmed,
            DiffOutcome::Surface(_) => Verdict::Confirmed,
            DiffOutcome::Ambiguous(layers) => {
                if upgrade_deep && layers.contains(&DiffLayer::CallTree) {
                    return Verdict::Confirmed;
                }
                let names: Vec<String> = layers.iter().map(DiffLayer::to_string).collect();
                Verdict::Inconclusive(format!("divergência apenas em {}", names.join(", ")))
            }
        }
    }
}

/// Compara o trace da ordem original (A) com o da ordem trocada (B)
pub fn compare(a: &TraceResult, b: &TraceResult) -> DiffOutcome {
    if a.success != b.success {
        return DiffOutcome::Surface(DiffLayer::Status);
    }
    if a.logs != b.logs {
        return DiffOutcome::Surface(DiffLayer::Logs);
    }
    if a.return_data != b.return_data {
        return DiffOutcome::Surface(DiffLayer::ReturnData);
    }

    let mut deep = Vec::new();
    if a.gas_used != b.gas_used || !same_gas(&a.call_tree, &b.call_tree) {
        deep.push(DiffLayer::GasUsed);
    }
    if !same_shape(&a.call_tree, &b.call_tree) {
        deep.push(DiffLayer::CallTree);
    }

    if deep.is_empty() {
        DiffOutcome::Identical
    } else {
        DiffOutcome::Ambiguous(deep)
    }
}

/// Mesmas chamadas, entradas, saídas e erros, ignorando gás
fn same_shape(a: &CallFrame, b: &CallFrame) -> bool {
    a.call_type == b.call_type
        && a.from == b.from
        && a.to == b.to
        && a.value == b.value
        && a.input == b.input
        && a.output == b.output
        && a.error == b.error
        && a.children.len() == b.children.len()
        && a.children.iter().zip(&b.children).all(|(x, y)| same_shape(x, y))
}

/// Gás igual em todos os frames pareados
fn same_gas(a: &CallFrame, b: &CallFrame) -> bool {
    a.gas_used == b.gas_used && a.children.iter().zip(&b.children).all(|(x, y)| same_gas(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, H256, U256};
    use ethernity_core::{CallType, TraceLog};

    fn frame(children: Vec<CallFrame>) -> CallFrame {
        CallFrame {
            call_type: CallType::Call,
            from: Address::repeat_byte(1),
            to: Some(Address::repeat_byte(2)),
            value: None,
            gas_used: U256::from(50_000u64),
            input: vec![0xa9, 0x05, 0x9c, 0xbb].into(),
            output: Default::default(),
            error: None,
            children,
        }
    }

    fn trace() -> TraceResult {
        TraceResult {
            success: true,
            error: None,
            revert_reason: None,
            gas_used: U256::from(50_000u64),
            logs: vec![TraceLog {
                address: Address::repeat_byte(2),
                topics: vec![H256::repeat_byte(0xdd)],
                data: vec![0u8; 32].into(),
            }],
            return_data: vec![1u8].into(),
            call_tree: frame(vec![frame(vec![])]),
        }
    }

    #[test]
    fn identical_traces_are_not_tod() {
        assert_eq!(compare(&trace(), &trace()), DiffOutcome::Identical);
        assert_eq!(compare(&trace(), &trace()).into_verdict(true), Verdict::NotConfirmed);
    }

    #[test]
    fn status_wins_over_other_layers() {
        let mut b = trace();
        b.success = false;
        b.logs.clear();
        assert_eq!(compare(&trace(), &b), DiffOutcome::Surface(DiffLayer::Status));
    }

    #[test]
    fn log_order_matters() {
        let mut a = trace();
        let mut extra = a.logs[0].clone();
        extra.topics = vec![H256::repeat_byte(0xee)];
        a.logs.push(extra);
        let mut b = a.clone();
        b.logs.reverse();
        assert_eq!(compare(&a, &b), DiffOutcome::Surface(DiffLayer::Logs));
    }

    #[test]
    fn gas_only_divergence_is_inconclusive() {
        let mut b = trace();
        b.gas_used = U256::from(48_000u64);
        b.call_tree.children[0].gas_used = U256::from(1u64);
        let outcome = compare(&trace(), &b);
        assert_eq!(outcome, DiffOutcome::Ambiguous(vec![DiffLayer::GasUsed]));
        assert!(matches!(outcome.into_verdict(true), Verdict::Inconclusive(_)));
    }

    #[test]
    fn extra_internal_call_upgrades_only_when_configured() {
        let mut b = trace();
        b.call_tree.children.push(frame(vec![]));
        let outcome = compare(&trace(), &b);
        assert_eq!(outcome, DiffOutcome::Ambiguous(vec![DiffLayer::CallTree]));
        assert!(matches!(outcome.clone().into_verdict(false), Verdict::Inconclusive(_)));
        assert_eq!(outcome.into_verdict(true), Verdict::Confirmed);
    }
}
