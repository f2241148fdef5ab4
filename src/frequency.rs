use crate::error::{AmortError, Result};
use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Payment or capitalization frequency.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Frequency {
    Daily,
    Weekly,
    /// Every 15 days, 24 periods per year.
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    SemiAnnually,
    Annually,
}

impl Frequency {
    pub const ALL: [Frequency; 8] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Bimonthly,
        Frequency::Quarterly,
        Frequency::SemiAnnually,
        Frequency::Annually,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
            Frequency::SemiAnnually => "semiannual",
            Frequency::Annually => "annual",
        }
    }

    /// Periods per year. Daily depends on the day-count basis and fails
    /// without one.
    pub fn periods_per_year(&self, basis: Option<DayCountBasis>) -> Result<f64> {
        match self {
            Frequency::Daily => match basis {
                Some(basis) => Ok(basis.days() as f64),
                None => Err(AmortError::InvalidFrequency(
                    "daily frequency requires a 360 or 365 day-count basis".to_string(),
                )),
            },
            Frequency::Weekly => Ok(52.),
            Frequency::Biweekly => Ok(24.),
            Frequency::Monthly => Ok(12.),
            Frequency::Bimonthly => Ok(6.),
            Frequency::Quarterly => Ok(4.),
            Frequency::SemiAnnually => Ok(2.),
            Frequency::Annually => Ok(1.),
        }
    }

    /// How a payment date moves forward by one period.
    pub fn step(&self) -> PeriodStep {
        match self {
            Frequency::Daily => PeriodStep::Days(1),
            Frequency::Weekly => PeriodStep::Days(7),
            Frequency::Biweekly => PeriodStep::Days(15),
            Frequency::Monthly => PeriodStep::Months(1),
            Frequency::Bimonthly => PeriodStep::Months(2),
            Frequency::Quarterly => PeriodStep::Months(3),
            Frequency::SemiAnnually => PeriodStep::Months(6),
            Frequency::Annually => PeriodStep::Months(12),
        }
    }

    pub fn is_monthly_multiple(&self) -> bool {
        matches!(self.step(), PeriodStep::Months(_))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Frequency {
    type Err = AmortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            "bimonthly" => Ok(Frequency::Bimonthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "semiannual" | "semiannually" => Ok(Frequency::SemiAnnually),
            "annual" | "annually" => Ok(Frequency::Annually),
            other => Err(AmortError::InvalidFrequency(format!(
                "unknown frequency '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PeriodStep {
    Days(u64),
    Months(u32),
}

/// Day-count basis used for daily rates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DayCountBasis {
    #[default]
    Days360,
    Days365,
}

impl DayCountBasis {
    pub fn days(&self) -> u16 {
        match self {
            DayCountBasis::Days360 => 360,
            DayCountBasis::Days365 => 365,
        }
    }
}

impl TryFrom<u16> for DayCountBasis {
    type Error = AmortError;

    fn try_from(days: u16) -> Result<Self> {
        match days {
            360 => Ok(DayCountBasis::Days360),
            365 => Ok(DayCountBasis::Days365),
            other => Err(AmortError::InvalidFrequency(format!(
                "day-count basis must be 360 or 365, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DayCountBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

/// Number of payments of `payment` frequency that fit in `duration` units of
/// `unit` (e.g. 2 annual units paid monthly is 24). Never less than one.
pub fn periods_from_duration(
    payment: Frequency,
    basis: Option<DayCountBasis>,
    duration: f64,
    unit: Frequency,
) -> Result<u32> {
    if !duration.is_finite() || duration <= 0. {
        return Err(AmortError::invalid_input(
            "duration",
            format!("must be positive, got {}", duration),
        ));
    }
    let per_year_payment = payment.periods_per_year(basis)?;
    let per_year_unit = unit.periods_per_year(basis)?;

    let periods = ((duration / per_year_unit) * per_year_payment).round();
    if periods > u32::MAX as f64 {
        return Err(AmortError::invalid_input(
            "duration",
            format!("{} {} is too long", duration, unit),
        ));
    }
    Ok((periods as u32).max(1))
}
