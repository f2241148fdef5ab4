//! Tabular output of schedules: CSV and xlsx files, console tables.

use crate::calendar::format_date;
use crate::error::Result;
use crate::loan::ScheduleRow;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

pub const COLUMNS: [&str; 7] = [
    "Period",
    "Date",
    "Installment",
    "Interest",
    "PrincipalPortion",
    "ExtraPayment",
    "Balance",
];

/// Byte-order mark written ahead of CSV files so spreadsheet tools detect UTF-8.
const UTF8_BOM: &[u8] = "\u{feff}".as_bytes();

pub const SHEET_NAME: &str = "Schedule";

fn round(amt: f64, dec: i32) -> f64 {
    if amt == 0. {
        0.
    } else {
        (amt * 10_f64.powi(dec)).round() / 10_f64.powi(dec)
    }
}

fn amount(value: f64, thousands: bool) -> String {
    if thousands {
        format_thousands(value)
    } else {
        format!("{:.2}", round(value, 2))
    }
}

fn date_cell(row: &ScheduleRow) -> String {
    row.payment_date
        .as_ref()
        .map(format_date)
        .unwrap_or_default()
}

fn cells(row: &ScheduleRow, thousands: bool) -> [String; 7] {
    [
        row.period.to_string(),
        date_cell(row),
        amount(row.installment, thousands),
        amount(row.interest, thousands),
        amount(row.principal_portion, thousands),
        amount(row.extra_payment, thousands),
        amount(row.balance, thousands),
    ]
}

/// Two-decimal amount with `,` grouping, e.g. `7,000,000.00`.
pub fn format_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", round(value, 2).abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0. && round(value, 2) != 0. {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Writes the schedule as CSV with a header row.
pub fn write_csv<W: io::Write>(rows: &[ScheduleRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record(cells(row, false))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the schedule to a CSV file, prefixed with a UTF-8 byte-order mark.
pub fn export_csv<P: AsRef<Path>>(rows: &[ScheduleRow], path: P) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;
    write_csv(rows, file)
}

/// Writes the schedule to a single-sheet workbook. Amounts are stored as
/// numbers rounded to cents, dates as `DD/MM/YYYY` text.
pub fn export_xlsx<P: AsRef<Path>>(rows: &[ScheduleRow], path: P) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    let money = Format::new().set_num_format("0.00");

    let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;
    for (col, name) in (0u16..).zip(COLUMNS) {
        sheet.write_string_with_format(0, col, name, &header)?;
    }

    for (line, row) in (1u32..).zip(rows) {
        sheet.write_number(line, 0, row.period)?;
        sheet.write_string(line, 1, date_cell(row))?;
        let amounts = [
            row.installment,
            row.interest,
            row.principal_portion,
            row.extra_payment,
            row.balance,
        ];
        for (col, value) in (2u16..).zip(amounts) {
            sheet.write_number_with_format(line, col, round(value, 2), &money)?;
        }
    }
    sheet.autofit();

    workbook.save(path)?;
    Ok(())
}

#[derive(Tabled)]
struct RowView {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Installment")]
    installment: String,
    #[tabled(rename = "Interest")]
    interest: String,
    #[tabled(rename = "PrincipalPortion")]
    principal_portion: String,
    #[tabled(rename = "ExtraPayment")]
    extra_payment: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

impl RowView {
    fn new(row: &ScheduleRow, thousands: bool) -> Self {
        let [period, date, installment, interest, principal_portion, extra_payment, balance] =
            cells(row, thousands);
        Self {
            period,
            date,
            installment,
            interest,
            principal_portion,
            extra_payment,
            balance,
        }
    }
}

/// Console table of the first `preview` rows (all when `None`), amounts
/// right-aligned.
pub fn render_table(rows: &[ScheduleRow], thousands: bool, preview: Option<usize>) -> String {
    let shown = preview.unwrap_or(rows.len()).min(rows.len());
    let views: Vec<RowView> = rows[..shown]
        .iter()
        .map(|row| RowView::new(row, thousands))
        .collect();

    Table::new(views)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{export_csv, export_xlsx, format_thousands, render_table, write_csv};
    use crate::calendar::parse_date;
    use crate::frequency::Frequency;
    use crate::loan::{generate, ExtraPayment, ScheduleRow};
    use tempfile::tempdir;
    use test_log::test;

    fn sample_rows() -> Vec<ScheduleRow> {
        generate(
            900_000.,
            0.,
            3,
            Frequency::Monthly,
            Some(parse_date("31/01/2025").unwrap()),
            &[ExtraPayment::reduces_term(1, 1234.5)],
        )
        .unwrap()
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(7_000_000.), "7,000,000.00");
        assert_eq!(format_thousands(1234.567), "1,234.57");
        assert_eq!(format_thousands(999.999), "1,000.00");
        assert_eq!(format_thousands(12.), "12.00");
        assert_eq!(format_thousands(0.), "0.00");
        assert_eq!(format_thousands(-1234.5), "-1,234.50");
        assert_eq!(format_thousands(-0.001), "0.00");
    }

    #[test]
    fn test_write_csv() {
        let mut buf = Vec::new();
        write_csv(&sample_rows(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Period,Date,Installment,Interest,PrincipalPortion,ExtraPayment,Balance"
        );
        assert_eq!(lines[1], "1,28/02/2025,300000.00,0.00,300000.00,1234.50,598765.50");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with(",0.00"));
    }

    #[test]
    fn test_write_csv_without_dates() {
        let rows = generate(1000., 0., 2, Frequency::Weekly, None, &[]).unwrap();
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "1,,500.00,0.00,500.00,0.00,500.00");
    }

    #[test]
    fn test_export_csv_starts_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        export_csv(&sample_rows(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.starts_with("Period,Date,"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_export_xlsx() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.xlsx");
        export_xlsx(&sample_rows(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(!bytes.is_empty());
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");

        let without_dates = generate(1000., 0.01, 4, Frequency::Weekly, None, &[]).unwrap();
        let path = dir.path().join("weekly.xlsx");
        export_xlsx(&without_dates, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("schedule.csv");
        assert!(export_csv(&sample_rows(), &path).is_err());
        assert!(export_xlsx(&sample_rows(), path.with_extension("xlsx")).is_err());
    }

    #[test]
    fn test_render_table() {
        let rows = sample_rows();
        let table = render_table(&rows, true, None);
        let lines: Vec<&str> = table.lines().collect();

        let header = lines.iter().find(|line| line.contains("Period")).unwrap();
        for name in super::COLUMNS {
            assert!(header.contains(name), "missing column {}", name);
        }
        assert!(table.contains("300,000.00"));
        assert!(table.contains("598,765.50"));
        assert!(table.contains("28/02/2025"));
        assert!(table.contains("30/04/2025"));
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));

        let preview = render_table(&rows, false, Some(1));
        assert!(preview.contains("300000.00"));
        assert!(preview.contains("28/02/2025"));
        assert!(!preview.contains("31/03/2025"));
        assert_eq!(preview.lines().count(), table.lines().count() - 2);

        assert_eq!(render_table(&rows, false, Some(10)).lines().count(), lines.len());
    }
}
