use thiserror::Error;

pub type Result<T> = std::result::Result<T, AmortError>;

#[derive(Debug, Error)]
pub enum AmortError {
    #[error("invalid rate {value}: {reason}")]
    InvalidRate { value: f64, reason: String },

    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("extra payment at period {period} is negative ({amount})")]
    NegativeExtraPayment { period: u32, amount: f64 },

    /// The standing installment does not cover the period's interest.
    #[error("installment {installment:.4} does not amortize at period {period} (interest {interest:.4})")]
    NonAmortizingInstallment {
        period: u32,
        installment: f64,
        interest: f64,
    },

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl AmortError {
    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        AmortError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
