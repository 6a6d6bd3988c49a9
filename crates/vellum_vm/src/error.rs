use std::fmt;

/// Covers both the compiler's static errors (UnknownOperator,
/// UndefinedName) and the VM's runtime errors, since both phases share
/// one bytecode pipeline and one crate.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    UnknownOperator(String),
    UndefinedName(String),
    TypeMismatch { left: String, right: String },
    UnsupportedType { op: &'static str, ty: String },
    UnhashableKey(String),
    UnsupportedIndex(String),
    UnsupportedBinaryOperation,
    NonCallable,
    StackOverflow,
    UnknownOpcode(u8),
    UnknownStringOperator,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::UnknownOperator(op) => write!(f, "unknown operator: {}", op),
            VmError::UndefinedName(name) => write!(f, "undefined variable: {}", name),
            VmError::TypeMismatch { left, right } => {
                write!(f, "leftType:{} and rightType:{} not equal", left, right)
            }
            VmError::UnsupportedType { op, ty } => write!(f, "unsupported type for {}: {}", op, ty),
            VmError::UnhashableKey(ty) => write!(f, "unusable as hash key: {}", ty),
            VmError::UnsupportedIndex(ty) => write!(f, "index operator not supported: {}", ty),
            VmError::UnsupportedBinaryOperation => write!(f, "unsupported types for binary operation"),
            VmError::NonCallable => write!(f, "calling non-function"),
            VmError::StackOverflow => write!(f, "stack overflow"),
            VmError::UnknownOpcode(op) => write!(f, "unknown opcode: {}", op),
            VmError::UnknownStringOperator => write!(f, "unknown string operator"),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T = crate::value::Value> = Result<T, VmError>;
