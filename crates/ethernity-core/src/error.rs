use std::fmt;
use thiserror::Error;

/// Natureza de uma falha do node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeErrorKind {
    /// RPC, rede ou timeout: vale a pena tentar de novo
    Transient,
    /// Resposta malformada ou método não suportado
    Permanent,
}

impl fmt::Display for NodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeErrorKind::Transient => write!(f, "transient"),
            NodeErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Erro retornado pelo cliente do node de arquivo
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("erro de node ({kind}): {message}")]
pub struct NodeError {
    pub kind: NodeErrorKind,
    pub message: String,
}

impl NodeError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: NodeErrorKind::Transient, message: message.into() }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { kind: NodeErrorKind::Permanent, message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == NodeErrorKind::Transient
    }
}

/// Erros comuns da biblioteca Ethernity
#[derive(Error, Debug)]
pub enum Error {
    /// Erro de comunicação com o node Ethereum
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Falha de persistência; nunca é descartada silenciosamente
    #[error("Erro de armazenamento: {0}")]
    StoreError(String),

    /// Erro de decodificação de dados
    #[error("Erro de decodificação: {0}")]
    DecodeError(String),

    /// Erro de validação
    #[error("Erro de validação: {0}")]
    ValidationError(String),

    /// Erro genérico
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}

/// Tipo de resultado usado em toda a biblioteca
pub type Result<T> = std::result::Result<T, Error>;

/// Resultado das chamadas ao node
pub type NodeResult<T> = std::result::Result<T, NodeError>;
