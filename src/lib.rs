//! French-method (level installment) loan amortization.
//!
//! [`rate::normalize`] turns any rate quotation into the due periodic rate of
//! a payment frequency; [`loan::generate`] builds the period-by-period
//! schedule, absorbing extra payments that shorten the term or lower the
//! installment.

pub mod calendar;
pub mod error;
pub mod export;
pub mod frequency;
pub mod loan;
pub mod rate;

pub use calendar::{parse_date, Calendar, Gregorian};
pub use error::{AmortError, Result};
pub use frequency::{periods_from_duration, DayCountBasis, Frequency};
pub use loan::{
    generate, level_installment, ExtraPayment, Loan, LoanSummary, Recomputation, ScheduleEngine,
    ScheduleRow,
};
pub use rate::{effective_annual_rate, normalize, RateKind, RateSpec, RateTiming};
