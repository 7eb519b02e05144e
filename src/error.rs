use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the investment engine.
///
/// Every variant is local to the scenario being evaluated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Numeric overflow in {context}")]
    NumericOverflow { context: String },

    #[error("IRR solver aborted after {iterations} iterations at rate {last_rate}%")]
    ConvergenceFailure { iterations: u32, last_rate: Decimal },

    #[error("Assumption at index {index} is for year {found}, expected {expected}")]
    MisalignedAssumptions {
        index: usize,
        expected: i32,
        found: i32,
    },

    #[error("Historical price lookup failed for {year}")]
    HistoricalLookup {
        year: i32,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        EngineError::NumericOverflow {
            context: context.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
