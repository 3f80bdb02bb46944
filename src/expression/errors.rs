//! Expression error types
//!
//! Error codes:
//! - AERO_EXPRESSION_UNBOUND (FATAL)
//! - AERO_EXPRESSION_PARAMETER_NOT_SET (REJECT)
//! - index errors raised while answering aggregates from an index pass
//!   through with their own code

use std::fmt;

use crate::index::{IndexError, IndexErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionErrorCode {
    /// Column, wildcard or aggregate evaluated outside the context it was bound for
    AeroExpressionUnbound,
    AeroExpressionParameterNotSet,
    Index(IndexErrorCode),
}

impl ExpressionErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExpressionErrorCode::AeroExpressionUnbound => "AERO_EXPRESSION_UNBOUND",
            ExpressionErrorCode::AeroExpressionParameterNotSet => {
                "AERO_EXPRESSION_PARAMETER_NOT_SET"
            }
            ExpressionErrorCode::Index(code) => code.code(),
        }
    }
}

impl fmt::Display for ExpressionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionError {
    code: ExpressionErrorCode,
    message: String,
    index: Option<IndexError>,
}

impl ExpressionError {
    pub fn unbound(sql: &str) -> Self {
        Self {
            code: ExpressionErrorCode::AeroExpressionUnbound,
            message: format!("Expression {} evaluated without a binding", sql),
            index: None,
        }
    }

    pub fn parameter_not_set(index: usize) -> Self {
        Self {
            code: ExpressionErrorCode::AeroExpressionParameterNotSet,
            message: format!("Parameter ?{} is not set", index + 1),
            index: None,
        }
    }

    pub fn code(&self) -> ExpressionErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn index_error(&self) -> Option<&IndexError> {
        self.index.as_ref()
    }
}

impl From<IndexError> for ExpressionError {
    fn from(err: IndexError) -> Self {
        Self {
            code: ExpressionErrorCode::Index(err.code()),
            message: err.message().to_string(),
            index: Some(err),
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for ExpressionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.index
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type ExpressionResult<T> = Result<T, ExpressionError>;
