//! Report export: JSON and CSV artifacts.
//!
//! - **JSON**: the full `LabReport` with schema versioning
//! - **CSV**: value paths, per-variant daily records, the margin ledger and
//!   the annual inflation views, for spreadsheets and plotting tools
//!
//! Reports newer than `SCHEMA_VERSION` are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use leverlab_core::domain::{DailyReturnRecord, MarginDay};

use crate::runner::{AnnualReport, AnnualSeries, LabReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &LabReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize LabReport to JSON")
}

/// Deserialize a `LabReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<LabReport> {
    let report: LabReport =
        serde_json::from_str(json).context("failed to deserialize LabReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

/// Value paths side by side: `date`, `close`, `sma`, `regime_on`, then one
/// column per variant in report order.
pub fn export_growth_csv(report: &LabReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "date".to_string(),
        "close".to_string(),
        "sma".to_string(),
        "regime_on".to_string(),
    ];
    header.extend(report.variants.iter().map(|v| v.label.clone()));
    wtr.write_record(&header)?;

    for (i, day) in report.regime.iter().enumerate() {
        let mut row = vec![
            day.date.to_string(),
            format!("{:.6}", day.close),
            opt(day.sma),
            u8::from(day.regime_on).to_string(),
        ];
        for v in &report.variants {
            row.push(v.growth.get(i).map(|g| format!("{:.2}", g.value)).unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

/// Daily records of one variant.
pub fn export_records_csv(records: &[DailyReturnRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "regime_on",
        "price_return",
        "financing_cost_daily",
        "expense_cost_daily",
        "strategy_return",
    ])?;
    for r in records {
        wtr.write_record([
            &r.date.to_string(),
            &u8::from(r.regime_on).to_string(),
            &format!("{:.8}", r.price_return),
            &format!("{:.8}", r.financing_cost_daily),
            &format!("{:.8}", r.expense_cost_daily),
            &format!("{:.8}", r.strategy_return),
        ])?;
    }
    finish(wtr)
}

/// Margin ledger, one row per day, with derived equity.
pub fn export_margin_csv(ledger: &[MarginDay]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "regime_on",
        "in_market",
        "cash",
        "debt",
        "invested",
        "equity",
        "margin_limit",
        "accrued_interest",
        "reference_rate_pct",
        "underfunded_entry",
    ])?;
    for d in ledger {
        wtr.write_record([
            &d.date.to_string(),
            &u8::from(d.regime_on).to_string(),
            &u8::from(d.in_market).to_string(),
            &format!("{:.2}", d.cash),
            &format!("{:.2}", d.debt),
            &format!("{:.2}", d.invested),
            &format!("{:.2}", d.equity()),
            &format!("{:.2}", d.margin_limit),
            &format!("{:.4}", d.accrued_interest),
            &format!("{:.4}", d.reference_rate_pct),
            &u8::from(d.underfunded_entry).to_string(),
        ])?;
    }
    finish(wtr)
}

fn write_annual_rows(
    wtr: &mut csv::Writer<Vec<u8>>,
    view: &str,
    series: &[AnnualSeries],
) -> Result<()> {
    for s in series {
        for p in &s.points {
            wtr.write_record([
                view,
                &s.label,
                &p.year.to_string(),
                &format!("{:.2}", p.nominal),
                &format!("{:.2}", p.real),
                &format!("{:.6}", p.cpi_factor),
            ])?;
        }
    }
    Ok(())
}

/// Real and dividend-reinvested views in one long-form table: `view`,
/// `label`, `year`, `nominal`, `real`, `cpi_factor`.
pub fn export_annual_report_csv(annual: &AnnualReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["view", "label", "year", "nominal", "real", "cpi_factor"])?;
    let views = [
        ("real", &annual.real),
        ("dividend_reinvested", &annual.dividend_reinvested),
    ];
    for (view, series) in views {
        write_annual_rows(&mut wtr, view, series)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a lab run.
///
/// Creates `{run_id[..12]}/` under `output_dir` containing:
/// - `report.json`: the full `LabReport`
/// - `growth.csv`: every value path with the regime columns
/// - `records_{label}.csv`: daily records per variant
/// - `margin.csv`: the margin ledger, when the run produced one
/// - `annual.csv`: real and dividend-reinvested views, when produced
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &LabReport, output_dir: &Path) -> Result<PathBuf> {
    let short_id = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = output_dir.join(short_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("growth.csv"), export_growth_csv(report)?)?;

    for v in &report.variants {
        let path = run_dir.join(format!("records_{}.csv", v.label));
        std::fs::write(path, export_records_csv(&v.records)?)?;
    }

    if let Some(margin) = &report.margin {
        std::fs::write(run_dir.join("margin.csv"), export_margin_csv(&margin.ledger)?)?;
    }

    if let Some(annual) = &report.annual {
        std::fs::write(run_dir.join("annual.csv"), export_annual_report_csv(annual)?)?;
    }

    Ok(run_dir)
}
