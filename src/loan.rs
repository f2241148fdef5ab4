use crate::calendar::{format_date, next_payment_date, Calendar, Gregorian};
use crate::error::{AmortError, Result};
use crate::frequency::Frequency;
use crate::rate::{effective_annual_rate, normalize, RateSpec};
use chrono::NaiveDate;
use log::{debug, info, trace, warn};
use std::{collections::BTreeMap, fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A balance at or below this amount is treated as paid off.
pub const CLOSING_TOLERANCE: f64 = 0.01;

// overpayment by an extra payment that is still treated as an exact payoff
const PAYOFF_EPSILON: f64 = 1e-6;

/// What an extra payment changes once it has been applied.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Recomputation {
    /// Keep the installment; the loan ends in fewer periods.
    #[default]
    ReducesTerm,
    /// Keep the term; the installment is recomputed over the remaining periods.
    ReducesInstallment,
}

impl FromStr for Recomputation {
    type Err = AmortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "term" => Ok(Recomputation::ReducesTerm),
            "installment" => Ok(Recomputation::ReducesInstallment),
            other => Err(AmortError::invalid_input(
                "recomputation",
                format!("expected 'term' or 'installment', got '{}'", other),
            )),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtraPayment {
    pub period: u32,
    pub amount: f64,
    pub recomputation: Recomputation,
}

impl ExtraPayment {
    pub fn new(period: u32, amount: f64, recomputation: Recomputation) -> Self {
        Self {
            period,
            amount,
            recomputation,
        }
    }

    pub fn reduces_term(period: u32, amount: f64) -> Self {
        Self::new(period, amount, Recomputation::ReducesTerm)
    }

    pub fn reduces_installment(period: u32, amount: f64) -> Self {
        Self::new(period, amount, Recomputation::ReducesInstallment)
    }
}

/// Parses `PERIOD:AMOUNT[:term|installment]`, defaulting to `term`.
impl FromStr for ExtraPayment {
    type Err = AmortError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |reason: String| AmortError::invalid_input("extra payment", reason);

        let mut parts = s.trim().split(':');
        let period = parts
            .next()
            .unwrap_or_default()
            .trim()
            .parse::<u32>()
            .map_err(|e| malformed(format!("bad period in '{}': {}", s, e)))?;
        let amount = parts
            .next()
            .ok_or_else(|| malformed(format!("'{}' is missing an amount", s)))?
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(format!("bad amount in '{}': {}", s, e)))?;
        let recomputation = match parts.next() {
            Some(kind) => kind.parse()?,
            None => Recomputation::default(),
        };
        if parts.next().is_some() {
            return Err(malformed(format!("'{}' has too many fields", s)));
        }

        Ok(Self::new(period, amount, recomputation))
    }
}

/// One period of an amortization schedule.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScheduleRow {
    pub period: u32,
    pub payment_date: Option<NaiveDate>,
    /// Installment actually charged; below the standing one only on the
    /// final row.
    pub installment: f64,
    pub interest: f64,
    pub principal_portion: f64,
    pub extra_payment: f64,
    pub balance: f64,
}

impl ScheduleRow {
    pub fn new(
        period: u32,
        payment_date: Option<NaiveDate>,
        installment: f64,
        interest: f64,
        principal_portion: f64,
        extra_payment: f64,
        balance: f64,
    ) -> Self {
        Self {
            period,
            payment_date,
            installment,
            interest,
            principal_portion,
            extra_payment,
            balance,
        }
    }
}

impl fmt::Display for ScheduleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .payment_date
            .as_ref()
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "period {}, date {}, installment ${:.4}, interest ${:.4}, principal ${:.4}, extra ${:.4}, balance ${:.4}",
            self.period,
            date,
            self.installment,
            self.interest,
            self.principal_portion,
            self.extra_payment,
            self.balance
        )
    }
}

/// Level (French) installment that repays `principal` in `periods` payments.
pub fn level_installment(principal: f64, periodic_rate: f64, periods: u32) -> Result<f64> {
    if periods == 0 {
        return Err(AmortError::invalid_input("periods", "must be > 0"));
    }
    if periodic_rate == 0. {
        return Ok(principal / periods as f64);
    }
    // 1 - (1+i)^-n, kept accurate for rates too small to move 1+i. It
    // saturates at 1 for long terms at high rates, leaving an interest-only
    // installment.
    let denom = -((-(periods as f64)) * periodic_rate.ln_1p()).exp_m1();
    let pmt = principal * periodic_rate / denom;
    if denom == 0. || !pmt.is_finite() {
        return Ok(principal / periods as f64);
    }
    Ok(pmt)
}

#[derive(Clone, Copy, Debug, Default)]
struct PeriodExtras {
    amount: f64,
    reduces_term: bool,
    reduces_installment: bool,
}

// sum extra payments per period; any ReducesInstallment entry wins
fn group_extra_payments(extra_payments: &[ExtraPayment]) -> Result<BTreeMap<u32, PeriodExtras>> {
    let mut grouped: BTreeMap<u32, PeriodExtras> = BTreeMap::new();

    for extra in extra_payments {
        if extra.period == 0 {
            return Err(AmortError::invalid_input(
                "extra payment",
                "period numbers start at 1",
            ));
        }
        if !extra.amount.is_finite() {
            return Err(AmortError::invalid_input(
                "extra payment",
                format!("amount at period {} is not finite", extra.period),
            ));
        }
        if extra.amount < 0. {
            return Err(AmortError::NegativeExtraPayment {
                period: extra.period,
                amount: extra.amount,
            });
        }

        let entry = grouped.entry(extra.period).or_default();
        entry.amount += extra.amount;
        match extra.recomputation {
            Recomputation::ReducesInstallment => entry.reduces_installment = true,
            Recomputation::ReducesTerm => entry.reduces_term = true,
        }
    }

    for (period, extras) in &grouped {
        if extras.reduces_installment && extras.reduces_term {
            warn!(
                "period {} mixes term and installment extra payments; recomputing installment",
                period
            );
        }
    }
    Ok(grouped)
}

/// Generates French-method schedules, placing payment dates with `C`.
#[derive(Clone, Debug, Default)]
pub struct ScheduleEngine<C = Gregorian> {
    calendar: C,
}

impl ScheduleEngine<Gregorian> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Calendar> ScheduleEngine<C> {
    pub fn with_calendar(calendar: C) -> Self {
        Self { calendar }
    }

    /// Builds the schedule for one loan.
    ///
    /// The standing installment is the level payment for `n_total_periods`.
    /// Extra payments are applied after the scheduled amortization of their
    /// period; a `ReducesInstallment` payment recomputes the installment over
    /// the remaining periods, a `ReducesTerm` payment leaves it as is so the
    /// balance reaches zero sooner. The last row always closes at zero.
    pub fn generate(
        &self,
        principal: f64,
        periodic_rate: f64,
        n_total_periods: u32,
        frequency: Frequency,
        start_date: Option<NaiveDate>,
        extra_payments: &[ExtraPayment],
    ) -> Result<Vec<ScheduleRow>> {
        if !principal.is_finite() || principal <= 0. {
            return Err(AmortError::invalid_input(
                "principal",
                format!("must be > 0, got {}", principal),
            ));
        }
        if n_total_periods == 0 {
            return Err(AmortError::invalid_input("periods", "must be > 0"));
        }
        if !periodic_rate.is_finite() || periodic_rate < 0. {
            return Err(AmortError::invalid_input(
                "periodic rate",
                format!("must be >= 0, got {}", periodic_rate),
            ));
        }

        let extras = group_extra_payments(extra_payments)?;
        let mut installment = level_installment(principal, periodic_rate, n_total_periods)?;
        debug!(
            "principal {}, rate {}, {} {} periods, installment {}",
            principal, periodic_rate, n_total_periods, frequency, installment
        );

        let anchor_month_end = match start_date {
            Some(date) if frequency.is_monthly_multiple() => self.calendar.is_month_end(date),
            _ => false,
        };

        let mut rows: Vec<ScheduleRow> = Vec::with_capacity(n_total_periods as usize);
        let mut balance = principal;
        let mut payment_date = start_date;

        for period in 1..=n_total_periods {
            if balance <= CLOSING_TOLERANCE {
                break;
            }

            payment_date = payment_date
                .map(|date| next_payment_date(&self.calendar, date, frequency, anchor_month_end))
                .transpose()?;

            let interest = balance * periodic_rate;
            let mut principal_portion = installment - interest;
            if principal_portion <= 0. {
                return Err(AmortError::NonAmortizingInstallment {
                    period,
                    installment,
                    interest,
                });
            }

            // final payment when the standing installment would overpay
            let charged = if principal_portion > balance {
                principal_portion = balance;
                interest + principal_portion
            } else {
                installment
            };

            let mut new_balance = balance - principal_portion;
            let period_extras = extras.get(&period);
            let extra_payment = match period_extras {
                Some(paid) => {
                    new_balance -= paid.amount;
                    if new_balance < 0. && new_balance.abs() <= PAYOFF_EPSILON {
                        new_balance = 0.;
                    }
                    paid.amount
                }
                None => 0.,
            };

            trace!(
                "period {}, interest {}, principal {}, extra {}, balance {}",
                period,
                interest,
                principal_portion,
                extra_payment,
                new_balance
            );

            rows.push(ScheduleRow::new(
                period,
                payment_date,
                charged,
                interest,
                principal_portion,
                extra_payment,
                new_balance.max(0.),
            ));
            balance = new_balance;

            let remaining = n_total_periods - period;
            if period_extras.is_some_and(|paid| paid.reduces_installment)
                && balance > CLOSING_TOLERANCE
                && remaining > 0
            {
                installment = level_installment(balance, periodic_rate, remaining)?;
                info!(
                    "installment recomputed after period {}: {} over {} periods",
                    period, installment, remaining
                );
            }

            if balance <= CLOSING_TOLERANCE {
                if remaining > 0 {
                    info!(
                        "loan paid off at period {} of {}",
                        period, n_total_periods
                    );
                }
                break;
            }
        }

        if let Some(last) = rows.last_mut() {
            if last.balance.abs() < CLOSING_TOLERANCE {
                last.balance = 0.;
            }
        }
        Ok(rows)
    }
}

/// [`ScheduleEngine::generate`] on the Gregorian calendar.
pub fn generate(
    principal: f64,
    periodic_rate: f64,
    n_total_periods: u32,
    frequency: Frequency,
    start_date: Option<NaiveDate>,
    extra_payments: &[ExtraPayment],
) -> Result<Vec<ScheduleRow>> {
    ScheduleEngine::new().generate(
        principal,
        periodic_rate,
        n_total_periods,
        frequency,
        start_date,
        extra_payments,
    )
}

/// Column totals of a schedule.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoanSummary {
    pub total_installments: f64,
    pub total_interest: f64,
    pub total_principal: f64,
    pub total_extra: f64,
    /// Installments plus extra payments.
    pub total_paid: f64,
}

impl LoanSummary {
    pub fn from_rows(rows: &[ScheduleRow]) -> Self {
        let mut summary = rows.iter().fold(Self::default(), |mut acc, row| {
            acc.total_installments += row.installment;
            acc.total_interest += row.interest;
            acc.total_principal += row.principal_portion;
            acc.total_extra += row.extra_payment;
            acc
        });
        summary.total_paid = summary.total_installments + summary.total_extra;
        summary
    }
}

/// A loan with its rate resolved and schedule generated.
#[derive(PartialEq, Debug)]
pub struct Loan {
    pub principal: f64,
    pub rate: RateSpec,
    pub periods: u32,
    pub frequency: Frequency,
    pub start_date: Option<NaiveDate>,
    pub extra_payments: Vec<ExtraPayment>,
    periodic_rate: f64,
    effective_annual_rate: f64,
    pmt_amount: f64,
    scheduled_pmts: Vec<ScheduleRow>,
}

impl Loan {
    pub fn new(
        principal: f64,
        rate: RateSpec,
        periods: u32,
        frequency: Frequency,
        start_date: Option<NaiveDate>,
        extra_payments: Vec<ExtraPayment>,
    ) -> Result<Self> {
        let periodic_rate = normalize(&rate, frequency)?;
        let effective_annual_rate =
            effective_annual_rate(periodic_rate, frequency, rate.day_count_basis)?;
        let scheduled_pmts = generate(
            principal,
            periodic_rate,
            periods,
            frequency,
            start_date,
            &extra_payments,
        )?;
        let pmt_amount = level_installment(principal, periodic_rate, periods)?;

        Ok(Self {
            principal,
            rate,
            periods,
            frequency,
            start_date,
            extra_payments,
            periodic_rate,
            effective_annual_rate,
            pmt_amount,
            scheduled_pmts,
        })
    }

    pub fn periodic_rate(&self) -> f64 {
        self.periodic_rate
    }

    pub fn effective_annual_rate(&self) -> f64 {
        self.effective_annual_rate
    }

    /// Installment at the start of the loan, before any recomputation.
    pub fn get_pmt_amount(&self) -> f64 {
        self.pmt_amount
    }

    pub fn get_pmt_count(&self) -> usize {
        self.scheduled_pmts.len()
    }

    /// Row for a 1-based payment number.
    pub fn get_pmt_detail(&self, pmt_number: usize) -> Option<&ScheduleRow> {
        pmt_number
            .checked_sub(1)
            .and_then(|index| self.scheduled_pmts.get(index))
    }

    pub fn get_pmt_info(&self, pmt_number: usize) -> String {
        match self.get_pmt_detail(pmt_number) {
            Some(pmt) => pmt.to_string(),
            None => "No payment information.".to_string(),
        }
    }

    pub fn rows(&self) -> &[ScheduleRow] {
        &self.scheduled_pmts
    }

    pub fn into_rows(self) -> Vec<ScheduleRow> {
        self.scheduled_pmts
    }

    pub fn summary(&self) -> LoanSummary {
        LoanSummary::from_rows(&self.scheduled_pmts)
    }

    pub fn show_amortization(&self) {
        for pmt in &self.scheduled_pmts {
            println!("{}", pmt);
        }
    }
}
