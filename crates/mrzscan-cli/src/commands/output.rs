//! Result formatting shared by the scan and mrz commands.

use chrono::NaiveDate;

use mrzscan_core::{MrzFields, RecogResult};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub fn format_result(result: &RecogResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_result_csv(result),
        OutputFormat::Text => Ok(format_result_text(result)),
    }
}

/// Parsed date, or the raw MRZ digits when they do not form a date.
fn date_or_raw(date: Option<NaiveDate>, raw: &str) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| raw.to_string())
}

fn format_result_csv(result: &RecogResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "format",
        "document_code",
        "issuing_country",
        "surname",
        "given_names",
        "document_number",
        "nationality",
        "birth_date",
        "sex",
        "expiry_date",
        "optional_data",
        "valid",
    ])?;

    if let Some(fields) = &result.fields {
        wtr.write_record([
            fields.format.to_string(),
            fields.document_code.clone(),
            fields.issuing_country.clone(),
            fields.surname.clone(),
            fields.given_names.clone(),
            fields.document_number.clone(),
            fields.nationality.clone(),
            date_or_raw(fields.birth_date, &fields.birth_date_raw),
            fields.sex.to_string(),
            date_or_raw(fields.expiry_date, &fields.expiry_date_raw),
            fields.optional_data.clone(),
            fields.is_valid().to_string(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_result_text(result: &RecogResult) -> String {
    let mut lines = vec![format!("Document type: {}", result.document_type)];

    match &result.fields {
        Some(fields) => lines.extend(field_lines(fields)),
        None => lines.push("MRZ: not read".to_string()),
    }

    if !result.lines.is_empty() {
        lines.push(String::new());
        lines.extend(result.lines.iter().cloned());
    }

    lines.join("\n")
}

fn field_lines(fields: &MrzFields) -> Vec<String> {
    let mut lines = vec![
        format!("Format: {}", fields.format),
        format!("Document code: {}", fields.document_code),
        format!("Issuing country: {}", fields.issuing_country),
        format!("Name: {}", fields.full_name()),
        format!("Document number: {}", fields.document_number),
        format!("Nationality: {}", fields.nationality),
        format!(
            "Date of birth: {}",
            date_or_raw(fields.birth_date, &fields.birth_date_raw)
        ),
        format!("Sex: {}", fields.sex),
        format!(
            "Date of expiry: {}",
            date_or_raw(fields.expiry_date, &fields.expiry_date_raw)
        ),
    ];

    if !fields.optional_data.is_empty() {
        lines.push(format!("Optional data: {}", fields.optional_data));
    }
    if let Some(issued) = fields.issue_date {
        lines.push(format!("Date of issue: {}", issued));
    }

    let failed: Vec<&str> = fields
        .checks()
        .into_iter()
        .filter(|(_, check)| !check.is_valid())
        .map(|(name, _)| name)
        .collect();
    if failed.is_empty() {
        lines.push("Check digits: valid".to_string());
    } else {
        lines.push(format!("Check digits: invalid ({})", failed.join(", ")));
    }

    lines
}
