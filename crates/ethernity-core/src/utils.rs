/*!
 * Ethernity Utils
 *
 * Utilitários comuns usados em toda a workspace Ethernity
 */

use crate::error::{Error, Result};
use crate::types::Selector;
use ethereum_types::{H256, U256};
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

/// Seletor de `Error(string)`
const ERROR_STRING_SELECTOR: Selector = [0x08, 0xc3, 0x79, 0xa0];
/// Seletor de `Panic(uint256)`
const PANIC_SELECTOR: Selector = [0x4e, 0x48, 0x7b, 0x71];

/// Converte uma string hexadecimal para H256
pub fn hex_to_h256(hex: &str) -> Option<H256> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    if hex_str.len() != 64 {
        return None;
    }
    H256::from_str(hex_str).ok()
}

/// Formata um H256 para exibição
pub fn format_h256(hash: &H256) -> String {
    format!("0x{:x}", hash)
}

/// Formata um número de bloco como quantidade JSON-RPC
pub fn format_block_number(number: u64) -> String {
    format!("0x{:x}", number)
}

/// Interpreta um número de bloco decimal ou `0x` hexadecimal
pub fn parse_block_number(input: &str) -> Result<u64> {
    let parsed = match input.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse::<u64>(),
    };
    parsed.map_err(|_| Error::ValidationError(format!("número de bloco inválido: {}", input)))
}

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// Extrai o seletor de função do calldata
pub fn function_selector(input: &[u8]) -> Option<Selector> {
    if input.len() < 4 {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&input[..4]);
    Some(selector)
}

/// Decodifica o motivo de revert de `Error(string)` ou `Panic(uint256)`
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    let selector = function_selector(output)?;
    let body = &output[4..];

    if selector == PANIC_SELECTOR {
        if body.len() < 32 {
            return None;
        }
        let code = U256::from_big_endian(&body[..32]);
        return Some(format!("panic: 0x{:x}", code));
    }

    if selector != ERROR_STRING_SELECTOR || body.len() < 64 {
        return None;
    }
    let offset = U256::from_big_endian(&body[..32]);
    if offset > U256::from(body.len()) {
        return None;
    }
    let offset = offset.as_usize();
    let len_end = offset.checked_add(32)?;
    if len_end > body.len() {
        return None;
    }
    let len = U256::from_big_endian(&body[offset..len_end]);
    if len > U256::from(body.len()) {
        return None;
    }
    let end = len_end.checked_add(len.as_usize())?;
    if end > body.len() {
        return None;
    }
    String::from_utf8(body[len_end..end].to_vec()).ok()
}
