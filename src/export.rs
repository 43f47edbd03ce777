use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::error::Result;
use crate::models::{FeedbackEntry, DATE_FORMAT};

pub const COLUMNS: [&str; 7] = [
    "audit_no",
    "date",
    "project",
    "category",
    "subcategory",
    "rating",
    "comment",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "feedback_data.csv",
            ExportFormat::Excel => "feedback_data.xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("CSV"),
            ExportFormat::Excel => f.write_str("Excel"),
        }
    }
}

/// Write a full snapshot of `entries` into `output_dir` and return the file path.
pub fn export(entries: &[FeedbackEntry], format: ExportFormat, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format.file_name());

    match format {
        ExportFormat::Csv => write_csv(entries, &path)?,
        ExportFormat::Excel => write_excel(entries, &path)?,
    }

    info!("Exported {} rows as {} to {}", entries.len(), format, path.display());
    Ok(path)
}

pub fn write_csv(entries: &[FeedbackEntry], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    if entries.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record(COLUMNS)?;
    }
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_excel(entries: &[FeedbackEntry], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("feedback")?;

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (idx, entry) in entries.iter().enumerate() {
        let row = idx as u32 + 1;
        worksheet.write_number(row, 0, entry.audit_no as f64)?;
        worksheet.write_string(row, 1, entry.date.format(DATE_FORMAT).to_string())?;
        worksheet.write_string(row, 2, &entry.project)?;
        worksheet.write_string(row, 3, &entry.category)?;
        worksheet.write_string(row, 4, &entry.subcategory)?;
        worksheet.write_string(row, 5, &entry.rating)?;
        worksheet.write_string(row, 6, &entry.comment)?;
    }

    workbook.save(path)?;
    Ok(())
}
