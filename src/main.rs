use amortization::export::{export_csv, export_xlsx, format_thousands, render_table};
use amortization::*;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use log::info;
use simple_logger::SimpleLogger;
use std::{path::PathBuf, process::ExitCode};

/// French-method loan amortization schedule
#[derive(Parser, Debug)]
#[command(name = "amortization", version, about)]
struct Cli {
    /// Loan principal
    #[arg(long)]
    principal: f64,

    /// Quoted rate as a percentage (24.33 for 24.33%)
    #[arg(long)]
    rate: f64,

    /// nominal or effective
    #[arg(long)]
    rate_kind: RateKind,

    /// Capitalization (nominal) or reference period (effective) of the rate
    #[arg(long)]
    capitalization: Frequency,

    /// due or anticipated
    #[arg(long, default_value = "due")]
    timing: RateTiming,

    /// Day-count basis for daily rates, 360 or 365
    #[arg(long, default_value = "360", value_parser = parse_day_count)]
    day_count: DayCountBasis,

    /// Number of installments
    #[arg(long, conflicts_with = "duration", required_unless_present = "duration")]
    periods: Option<u32>,

    /// Loan term length, in --duration-unit units
    #[arg(long, requires = "duration_unit")]
    duration: Option<f64>,

    /// Unit of --duration (monthly for months, annual for years, ...)
    #[arg(long)]
    duration_unit: Option<Frequency>,

    /// Payment frequency
    #[arg(long)]
    frequency: Frequency,

    /// Loan start date, DD/MM/YYYY; the first payment falls one period later
    #[arg(long, value_parser = parse_date)]
    start_date: Option<NaiveDate>,

    /// Extra payment, repeatable
    #[arg(long = "extra", value_name = "PERIOD:AMOUNT[:term|installment]")]
    extras: Vec<ExtraPayment>,

    /// Write the schedule to a CSV file
    #[arg(long)]
    export_csv: Option<PathBuf>,

    /// Write the schedule to an xlsx workbook
    #[arg(long)]
    export_xlsx: Option<PathBuf>,

    /// Print only the first N rows
    #[arg(long)]
    preview: Option<usize>,

    /// Group thousands in printed amounts
    #[arg(long)]
    thousands: bool,

    /// -v for info, -vv for per-period trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_day_count(s: &str) -> Result<DayCountBasis> {
    let days = s
        .trim()
        .parse::<u16>()
        .map_err(|e| AmortError::InvalidFrequency(format!("day-count '{}': {}", s, e)))?;
    DayCountBasis::try_from(days)
}

fn resolve_periods(cli: &Cli) -> Result<u32> {
    match (cli.periods, cli.duration, cli.duration_unit) {
        (Some(periods), _, _) => Ok(periods),
        (None, Some(duration), Some(unit)) => {
            periods_from_duration(cli.frequency, Some(cli.day_count), duration, unit)
        }
        _ => Err(AmortError::InvalidInput {
            field: "term".to_string(),
            reason: "give --periods or --duration with --duration-unit".to_string(),
        }),
    }
}

fn amount(value: f64, thousands: bool) -> String {
    if thousands {
        format_thousands(value)
    } else {
        format!("{:.2}", value)
    }
}

fn run(cli: Cli) -> Result<()> {
    let rate = RateSpec::new(
        cli.rate,
        cli.rate_kind,
        cli.capitalization,
        cli.timing,
        Some(cli.day_count),
    );
    let periods = resolve_periods(&cli)?;

    let loan = Loan::new(
        cli.principal,
        rate,
        periods,
        cli.frequency,
        cli.start_date,
        cli.extras.clone(),
    )?;

    println!(
        "Periodic rate ({}) = {:.6}% | equivalent effective annual = {:.6}%",
        cli.frequency,
        loan.periodic_rate() * 100.,
        loan.effective_annual_rate() * 100.
    );
    println!("Term: {} installments ({})", periods, cli.frequency);
    println!();
    println!("{}", render_table(loan.rows(), cli.thousands, cli.preview));

    let summary = loan.summary();
    println!();
    println!(
        "Summary: interest {} | extra payments {} | total paid {}",
        amount(summary.total_interest, cli.thousands),
        amount(summary.total_extra, cli.thousands),
        amount(summary.total_paid, cli.thousands)
    );

    if let Some(path) = &cli.export_csv {
        export_csv(loan.rows(), path)?;
        info!("schedule written to {}", path.display());
        println!("CSV -> {}", path.display());
    }
    if let Some(path) = &cli.export_xlsx {
        export_xlsx(loan.rows(), path)?;
        info!("schedule written to {}", path.display());
        println!("XLSX -> {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_periods, Cli};
    use amortization::*;
    use clap::Parser;
    use std::path::PathBuf;

    // verifies that types can implement the gated traits below
    fn is_normal<T: Sized + Send + Sync + Unpin>() {}

    #[test]
    fn normal_types() {
        is_normal::<ScheduleRow>();
        is_normal::<ExtraPayment>();
        is_normal::<RateSpec>();
        is_normal::<Loan>();
        is_normal::<ScheduleEngine>();
    }

    #[test]
    fn cli_parses_loan_terms() {
        let cli = Cli::try_parse_from([
            "amortization",
            "--principal",
            "5000000",
            "--rate",
            "24",
            "--rate-kind",
            "nominal",
            "--capitalization",
            "monthly",
            "--frequency",
            "monthly",
            "--periods",
            "24",
            "--start-date",
            "01/01/2025",
            "--extra",
            "6:1800000",
            "--extra",
            "8:1000:installment",
        ])
        .unwrap();

        assert_eq!(cli.rate_kind, RateKind::Nominal);
        assert_eq!(cli.timing, RateTiming::Due);
        assert_eq!(cli.day_count, DayCountBasis::Days360);
        assert_eq!(cli.start_date, Some(parse_date("01/01/2025").unwrap()));
        assert_eq!(
            cli.extras,
            vec![
                ExtraPayment::reduces_term(6, 1_800_000.),
                ExtraPayment::reduces_installment(8, 1000.)
            ]
        );
        assert_eq!(resolve_periods(&cli).unwrap(), 24);
        assert!(cli.export_csv.is_none());
        assert!(cli.export_xlsx.is_none());
    }

    #[test]
    fn cli_parses_export_paths() {
        let cli = Cli::try_parse_from([
            "amortization",
            "--principal",
            "1000",
            "--rate",
            "12",
            "--rate-kind",
            "effective",
            "--capitalization",
            "annual",
            "--frequency",
            "monthly",
            "--periods",
            "12",
            "--export-csv",
            "out/schedule.csv",
            "--export-xlsx",
            "out/schedule.xlsx",
        ])
        .unwrap();

        assert_eq!(cli.export_csv, Some(PathBuf::from("out/schedule.csv")));
        assert_eq!(cli.export_xlsx, Some(PathBuf::from("out/schedule.xlsx")));
    }

    #[test]
    fn cli_resolves_duration() {
        let cli = Cli::try_parse_from([
            "amortization",
            "--principal",
            "100000",
            "--rate",
            "12",
            "--rate-kind",
            "effective",
            "--capitalization",
            "annual",
            "--frequency",
            "monthly",
            "--duration",
            "2",
            "--duration-unit",
            "annual",
            "--day-count",
            "365",
        ])
        .unwrap();

        assert_eq!(cli.day_count, DayCountBasis::Days365);
        assert_eq!(resolve_periods(&cli).unwrap(), 24);
    }

    #[test]
    fn cli_rejects_bad_input() {
        let base = [
            "amortization",
            "--principal",
            "100000",
            "--rate",
            "12",
            "--rate-kind",
            "effective",
            "--capitalization",
            "annual",
            "--frequency",
            "monthly",
        ];
        // no term
        assert!(Cli::try_parse_from(base).is_err());
        // both term forms
        let both = [&base[..], &["--periods", "3", "--duration", "1", "--duration-unit", "annual"][..]].concat();
        assert!(Cli::try_parse_from(both).is_err());
        let bad_basis = [&base[..], &["--periods", "3", "--day-count", "366"][..]].concat();
        assert!(Cli::try_parse_from(bad_basis).is_err());
        let bad_date = [&base[..], &["--periods", "3", "--start-date", "2025-01-01"][..]].concat();
        assert!(Cli::try_parse_from(bad_date).is_err());
        let bad_extra = [&base[..], &["--periods", "3", "--extra", "3:abc"][..]].concat();
        assert!(Cli::try_parse_from(bad_extra).is_err());
    }
}
