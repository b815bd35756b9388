//! MRZ text parsing for the ICAO 9303 layouts.

use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::checksum::CheckDigit;
use crate::error::MrzError;

lazy_static! {
    static ref MRZ_LINE: Regex = Regex::new(r"^[A-Z0-9<]+$").unwrap();
}

/// Physical MRZ layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrzFormat {
    /// Identity card, 3 lines of 30.
    Td1,
    /// Identity card, 2 lines of 36.
    Td2,
    /// Passport, 2 lines of 44.
    Td3,
    /// Visa, 2 lines of 44.
    MrvA,
    /// Visa, 2 lines of 36.
    MrvB,
    /// French national identity card, 2 lines of 36.
    FrenchId,
}

impl MrzFormat {
    /// Detect the layout from normalized lines.
    pub fn detect(lines: &[String]) -> Result<Self, MrzError> {
        let lengths: Vec<usize> = lines.iter().map(String::len).collect();
        let starts = |prefix: &str| lines.first().is_some_and(|l| l.starts_with(prefix));

        match lengths.as_slice() {
            [30, 30, 30] => Ok(Self::Td1),
            [36, 36] if starts("V") => Ok(Self::MrvB),
            [36, 36] if starts("IDFRA") => Ok(Self::FrenchId),
            [36, 36] => Ok(Self::Td2),
            [44, 44] if starts("V") => Ok(Self::MrvA),
            [44, 44] => Ok(Self::Td3),
            _ => Err(MrzError::UnknownLayout {
                lines: lines.len(),
                length: lengths.first().copied().unwrap_or(0),
            }),
        }
    }
}

impl fmt::Display for MrzFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Td1 => "TD1",
            Self::Td2 => "TD2",
            Self::Td3 => "TD3",
            Self::MrvA => "MRV-A",
            Self::MrvB => "MRV-B",
            Self::FrenchId => "FR-ID",
        })
    }
}

/// Sex of the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Sex {
    fn from_char(c: char) -> Self {
        match c {
            'M' => Self::Male,
            'F' => Self::Female,
            _ => Self::Unspecified,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unspecified => "X",
        })
    }
}

/// Holder and document fields decoded from the MRZ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MrzFields {
    pub format: MrzFormat,
    pub document_code: String,
    pub issuing_country: String,
    pub surname: String,
    pub given_names: String,
    pub document_number: String,
    pub document_number_check: CheckDigit,
    pub nationality: String,
    pub birth_date_raw: String,
    pub birth_date: Option<NaiveDate>,
    pub birth_date_check: CheckDigit,
    pub sex: Sex,
    pub expiry_date_raw: String,
    pub expiry_date: Option<NaiveDate>,
    pub expiry_date_check: Option<CheckDigit>,
    /// Personal number or first optional data field.
    pub optional_data: String,
    pub optional_data_check: Option<CheckDigit>,
    /// Second optional data field (TD1 only).
    pub optional_data_2: String,
    pub composite_check: Option<CheckDigit>,
    pub issue_date: Option<NaiveDate>,
    pub department_number: Option<String>,
}

impl MrzFields {
    /// Every check digit present in the layout, by name.
    pub fn checks(&self) -> Vec<(&'static str, CheckDigit)> {
        let mut checks = vec![
            ("document_number", self.document_number_check),
            ("birth_date", self.birth_date_check),
        ];
        if let Some(check) = self.expiry_date_check {
            checks.push(("expiry_date", check));
        }
        if let Some(check) = self.optional_data_check {
            checks.push(("optional_data", check));
        }
        if let Some(check) = self.composite_check {
            checks.push(("composite", check));
        }
        checks
    }

    /// Whether every check digit matches its recomputed value.
    pub fn is_valid(&self) -> bool {
        self.checks().iter().all(|(_, check)| check.is_valid())
    }

    /// Names as printed on the data page: given names then surname.
    pub fn full_name(&self) -> String {
        [self.given_names.as_str(), self.surname.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Uppercase, drop whitespace and blank lines.
pub fn normalize_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            line.as_ref()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Parse MRZ lines, resolving two-digit birth years against today.
pub fn parse_mrz<S: AsRef<str>>(lines: &[S]) -> Result<MrzFields, MrzError> {
    parse_mrz_with_reference(lines, Local::now().date_naive())
}

/// Parse MRZ lines, resolving two-digit birth years against `today`.
pub fn parse_mrz_with_reference<S: AsRef<str>>(
    lines: &[S],
    today: NaiveDate,
) -> Result<MrzFields, MrzError> {
    let lines = normalize_lines(lines);
    let format = MrzFormat::detect(&lines)?;

    if let Some(index) = lines.iter().position(|line| !MRZ_LINE.is_match(line)) {
        return Err(MrzError::InvalidCharacters(index));
    }
    debug!("parsing {} MRZ", format);

    Ok(match format {
        MrzFormat::Td1 => parse_td1(&lines[0], &lines[1], &lines[2], today),
        MrzFormat::FrenchId => parse_french_id(&lines[0], &lines[1], today),
        _ => parse_two_line(format, &lines[0], &lines[1], today),
    })
}

/// Filler-separated text to words.
fn clean(field: &str) -> String {
    field
        .replace('<', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_names(field: &str) -> (String, String) {
    match field.split_once("<<") {
        Some((surname, given)) => (clean(surname), clean(given)),
        None => (clean(field), String::new()),
    }
}

fn char_at(line: &str, index: usize) -> char {
    line.as_bytes().get(index).map_or('<', |&b| b as char)
}

fn parse_yymmdd(raw: &str, field: &'static str) -> Result<(i32, u32, u32), MrzError> {
    let invalid = || MrzError::InvalidDate {
        field,
        value: raw.to_string(),
    };
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let number = |range: std::ops::Range<usize>| raw[range].parse::<u32>().map_err(|_| invalid());
    Ok((number(0..2)? as i32, number(2..4)?, number(4..6)?))
}

/// Birth dates are never in the future.
fn birth_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, MrzError> {
    let (yy, month, day) = parse_yymmdd(raw, "birth")?;
    let invalid = || MrzError::InvalidDate {
        field: "birth",
        value: raw.to_string(),
    };
    let century = if 2000 + yy > today.year() { 1900 } else { 2000 };
    let date = NaiveDate::from_ymd_opt(century + yy, month, day).ok_or_else(invalid)?;
    if date > today && century == 2000 {
        return NaiveDate::from_ymd_opt(1900 + yy, month, day).ok_or_else(invalid);
    }
    Ok(date)
}

/// Expiry dates are in 20xx.
fn expiry_date(raw: &str) -> Result<NaiveDate, MrzError> {
    let (yy, month, day) = parse_yymmdd(raw, "expiry")?;
    NaiveDate::from_ymd_opt(2000 + yy, month, day).ok_or_else(|| MrzError::InvalidDate {
        field: "expiry",
        value: raw.to_string(),
    })
}

fn log_date<T>(result: Result<T, MrzError>) -> Option<T> {
    result.map_err(|e| debug!("{}", e)).ok()
}

fn parse_two_line(format: MrzFormat, l1: &str, l2: &str, today: NaiveDate) -> MrzFields {
    let (surname, given_names) = split_names(&l1[5..]);
    let len = l2.len();

    let (optional_end, has_optional_check, has_composite) = match format {
        MrzFormat::Td3 => (42, true, true),
        MrzFormat::Td2 => (35, false, true),
        _ => (len, false, false),
    };

    let composite_check = has_composite.then(|| {
        let guarded = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..len - 1]);
        CheckDigit::verify(&guarded, char_at(l2, len - 1))
    });

    MrzFields {
        format,
        document_code: clean(&l1[0..2]),
        issuing_country: clean(&l1[2..5]),
        surname,
        given_names,
        document_number: clean(&l2[0..9]),
        document_number_check: CheckDigit::verify(&l2[0..9], char_at(l2, 9)),
        nationality: clean(&l2[10..13]),
        birth_date_raw: l2[13..19].to_string(),
        birth_date: log_date(birth_date(&l2[13..19], today)),
        birth_date_check: CheckDigit::verify(&l2[13..19], char_at(l2, 19)),
        sex: Sex::from_char(char_at(l2, 20)),
        expiry_date_raw: l2[21..27].to_string(),
        expiry_date: log_date(expiry_date(&l2[21..27])),
        expiry_date_check: Some(CheckDigit::verify(&l2[21..27], char_at(l2, 27))),
        optional_data: clean(&l2[28..optional_end]),
        optional_data_check: has_optional_check
            .then(|| CheckDigit::verify(&l2[28..optional_end], char_at(l2, optional_end))),
        optional_data_2: String::new(),
        composite_check,
        issue_date: None,
        department_number: None,
    }
}

fn parse_td1(l1: &str, l2: &str, l3: &str, today: NaiveDate) -> MrzFields {
    let (surname, given_names) = split_names(l3);

    // Numbers longer than 9 characters continue in the optional data, with
    // a filler in the check digit position and the check digit last.
    let (document_number, document_number_check, optional_data) = {
        let head = &l1[5..14];
        let tail = l1[15..30].split('<').next().unwrap_or("");
        if char_at(l1, 14) == '<' && tail.len() > 1 {
            let (extension, digit) = tail.split_at(tail.len() - 1);
            let full = format!("{}{}", head, extension);
            let rest = &l1[15 + tail.len()..30];
            (
                clean(&full),
                CheckDigit::verify(&full, char_at(digit, 0)),
                clean(rest),
            )
        } else {
            (
                clean(head),
                CheckDigit::verify(head, char_at(l1, 14)),
                clean(&l1[15..30]),
            )
        }
    };

    let guarded = format!("{}{}{}{}", &l1[5..30], &l2[0..7], &l2[8..15], &l2[18..29]);

    MrzFields {
        format: MrzFormat::Td1,
        document_code: clean(&l1[0..2]),
        issuing_country: clean(&l1[2..5]),
        surname,
        given_names,
        document_number,
        document_number_check,
        nationality: clean(&l2[15..18]),
        birth_date_raw: l2[0..6].to_string(),
        birth_date: log_date(birth_date(&l2[0..6], today)),
        birth_date_check: CheckDigit::verify(&l2[0..6], char_at(l2, 6)),
        sex: Sex::from_char(char_at(l2, 7)),
        expiry_date_raw: l2[8..14].to_string(),
        expiry_date: log_date(expiry_date(&l2[8..14])),
        expiry_date_check: Some(CheckDigit::verify(&l2[8..14], char_at(l2, 14))),
        optional_data,
        optional_data_check: None,
        optional_data_2: clean(&l2[18..29]),
        composite_check: Some(CheckDigit::verify(&guarded, char_at(l2, 29))),
        issue_date: None,
        department_number: None,
    }
}

fn parse_french_id(l1: &str, l2: &str, today: NaiveDate) -> MrzFields {
    // Issue date is YYMM; day one of the month.
    let issue_date = log_date(birth_date(&format!("{}01", &l2[0..4]), today));

    MrzFields {
        format: MrzFormat::FrenchId,
        document_code: clean(&l1[0..2]),
        issuing_country: clean(&l1[2..5]),
        surname: clean(&l1[5..30]),
        given_names: clean(&l2[13..27]),
        document_number: clean(&l2[0..12]),
        document_number_check: CheckDigit::verify(&l2[0..12], char_at(l2, 12)),
        nationality: clean(&l1[2..5]),
        birth_date_raw: l2[27..33].to_string(),
        birth_date: log_date(birth_date(&l2[27..33], today)),
        birth_date_check: CheckDigit::verify(&l2[27..33], char_at(l2, 33)),
        sex: Sex::from_char(char_at(l2, 34)),
        expiry_date_raw: String::new(),
        expiry_date: None,
        expiry_date_check: None,
        optional_data: clean(&l1[30..36]),
        optional_data_check: None,
        optional_data_2: String::new(),
        composite_check: Some(CheckDigit::verify(
            &format!("{}{}", l1, &l2[0..35]),
            char_at(l2, 35),
        )),
        issue_date,
        department_number: Some(clean(&l2[4..7])),
    }
}
