use brokerscan_core::expr::ExprError;
use brokerscan_core::TupleId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Unknown column({column})")]
    UnknownColumn { column: String },

    #[error("Column({column}) has no default value")]
    MissingDefault { column: String },

    #[error("Unknown precision({precision})")]
    UnknownPrecision { precision: String },

    #[error("Unknown slot ref({field}) in column mapping")]
    UnresolvedField { field: String },

    #[error("Unknown slot ref({column}) in source file")]
    MissingValue { column: String },

    #[error("Invalid arguments to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("Unknown function({name})")]
    UnknownFunction { name: String },

    #[error("Unknown tuple({0})")]
    UnknownTuple(TupleId),

    #[error(transparent)]
    Expr(ExprError),
}

impl From<ExprError> for TransformError {
    fn from(e: ExprError) -> Self {
        match e {
            ExprError::UnknownFunction(name) => TransformError::UnknownFunction { name },
            other => TransformError::Expr(other),
        }
    }
}
