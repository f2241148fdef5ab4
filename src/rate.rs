//! Conversion of quoted interest rates into the due periodic rate of a
//! payment frequency.
//!
//! A quotation is reduced to its reference-period rate, converted from
//! anticipated to due when needed, annualized over the reference frequency and
//! then de-annualized to the target frequency.

use crate::error::{AmortError, Result};
use crate::frequency::{DayCountBasis, Frequency};
use log::debug;
use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RateKind {
    /// Annual nominal rate, divided evenly over the capitalization periods.
    Nominal,
    /// Rate already effective for one capitalization period.
    Effective,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RateTiming {
    /// Interest paid at period end.
    #[default]
    Due,
    /// Interest deducted at period start.
    Anticipated,
}

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RateSpec {
    /// Percentage, i.e. 24.33 for 24.33%.
    pub value: f64,
    pub kind: RateKind,
    pub capitalization: Frequency,
    pub timing: RateTiming,
    pub day_count_basis: Option<DayCountBasis>,
}

impl RateSpec {
    pub fn new(
        value: f64,
        kind: RateKind,
        capitalization: Frequency,
        timing: RateTiming,
        day_count_basis: Option<DayCountBasis>,
    ) -> Self {
        Self {
            value,
            kind,
            capitalization,
            timing,
            day_count_basis,
        }
    }

    /// Due nominal rate with a 360-day basis.
    pub fn nominal(value: f64, capitalization: Frequency) -> Self {
        Self::new(
            value,
            RateKind::Nominal,
            capitalization,
            RateTiming::Due,
            Some(DayCountBasis::Days360),
        )
    }

    /// Due effective rate with a 360-day basis.
    pub fn effective(value: f64, capitalization: Frequency) -> Self {
        Self::new(
            value,
            RateKind::Effective,
            capitalization,
            RateTiming::Due,
            Some(DayCountBasis::Days360),
        )
    }

    pub fn anticipated(mut self) -> Self {
        self.timing = RateTiming::Anticipated;
        self
    }

    pub fn with_basis(mut self, basis: DayCountBasis) -> Self {
        self.day_count_basis = Some(basis);
        self
    }

    /// Due periodic rate for `target`. See [`normalize`].
    pub fn periodic_rate(&self, target: Frequency) -> Result<f64> {
        normalize(self, target)
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RateKind::Nominal => "nominal",
            RateKind::Effective => "effective",
        };
        let timing = match self.timing {
            RateTiming::Due => "due",
            RateTiming::Anticipated => "anticipated",
        };
        write!(
            f,
            "{}% {} {} {}",
            self.value, kind, self.capitalization, timing
        )
    }
}

impl FromStr for RateKind {
    type Err = AmortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominal" => Ok(RateKind::Nominal),
            "effective" => Ok(RateKind::Effective),
            other => Err(AmortError::invalid_input(
                "rate kind",
                format!("expected 'nominal' or 'effective', got '{}'", other),
            )),
        }
    }
}

impl FromStr for RateTiming {
    type Err = AmortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "due" => Ok(RateTiming::Due),
            "anticipated" => Ok(RateTiming::Anticipated),
            other => Err(AmortError::invalid_input(
                "rate timing",
                format!("expected 'due' or 'anticipated', got '{}'", other),
            )),
        }
    }
}

/// Converts `spec` into the due periodic decimal rate for `target`.
///
/// Fails with [`AmortError::InvalidRate`] on a negative value and with
/// [`AmortError::InvalidFrequency`] when either frequency is daily and the
/// spec carries no day-count basis.
pub fn normalize(spec: &RateSpec, target: Frequency) -> Result<f64> {
    if !spec.value.is_finite() || spec.value < 0. {
        return Err(AmortError::InvalidRate {
            value: spec.value,
            reason: "rate must be a non-negative percentage".to_string(),
        });
    }

    let per_year_ref = spec.capitalization.periods_per_year(spec.day_count_basis)?;
    let per_year_target = target.periods_per_year(spec.day_count_basis)?;

    let reference = match spec.kind {
        RateKind::Nominal => (spec.value / 100.) / per_year_ref,
        RateKind::Effective => spec.value / 100.,
    };
    let reference_due = match spec.timing {
        RateTiming::Due => reference,
        RateTiming::Anticipated => anticipated_to_due(reference, spec.value)?,
    };

    let effective_annual = (1. + reference_due).powf(per_year_ref) - 1.;
    let periodic = (1. + effective_annual).powf(1. / per_year_target) - 1.;

    debug!(
        "rate {} -> effective annual {}, {} periodic {}",
        spec, effective_annual, target, periodic
    );
    Ok(periodic)
}

// i / (1 - i); only defined below 100% per period
fn anticipated_to_due(rate: f64, quoted: f64) -> Result<f64> {
    if rate >= 1. {
        return Err(AmortError::InvalidRate {
            value: quoted,
            reason: "anticipated periodic rate must be below 100%".to_string(),
        });
    }
    Ok(rate / (1. - rate))
}

/// Effective annual rate equivalent to a due periodic rate paid at
/// `frequency`.
pub fn effective_annual_rate(
    periodic: f64,
    frequency: Frequency,
    basis: Option<DayCountBasis>,
) -> Result<f64> {
    let per_year = frequency.periods_per_year(basis)?;
    Ok((1. + periodic).powf(per_year) - 1.)
}
