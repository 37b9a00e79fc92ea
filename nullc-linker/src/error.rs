/// Errors raised while merging compiled modules into one image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("unresolved import: {0}")]
    UnresolvedImport(String),
    #[error("type mismatch while merging: {0}")]
    TypeMismatch(String),
    #[error("dependency cycle detected at '{0}'")]
    DependencyCycle(String),
    #[error(transparent)]
    Bytecode(#[from] nullc_bytecode::BytecodeError),
}
