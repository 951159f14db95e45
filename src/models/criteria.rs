//! Search criteria and input validation.

use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Date format used by every search form.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse a `mm/dd/yyyy` date and return it in canonical zero-padded form.
pub fn parse_date(input: &str) -> Result<String> {
    to_naive(input).map(|d| d.format(DATE_FORMAT).to_string())
}

fn to_naive(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("Invalid date: '{input}' (expected mm/dd/yyyy)")))
}

/// Validate an operator number (digits only).
pub fn parse_operator(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(format!(
            "Invalid operator number: '{input}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Immutable search parameters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    from_date: String,
    to_date: String,
    operator_id: String,
}

impl SearchCriteria {
    /// Validate and normalize the inputs.
    pub fn new(from_date: &str, to_date: &str, operator_id: &str) -> Result<Self> {
        let from = to_naive(from_date)?;
        let to = to_naive(to_date)?;
        if from > to {
            return Err(AppError::validation(format!(
                "From date {from_date} is after to date {to_date}"
            )));
        }

        Ok(Self {
            from_date: from.format(DATE_FORMAT).to_string(),
            to_date: to.format(DATE_FORMAT).to_string(),
            operator_id: parse_operator(operator_id)?,
        })
    }

    pub fn from_date(&self) -> &str {
        &self.from_date
    }

    pub fn to_date(&self) -> &str {
        &self.to_date
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    /// Whether a filing date (as printed on a result page) is within `to_date`.
    ///
    /// Unparseable dates are kept.
    pub fn filed_by_end(&self, filing_date: &str) -> bool {
        match (to_naive(filing_date), to_naive(&self.to_date)) {
            (Ok(filed), Ok(end)) => filed <= end,
            _ => true,
        }
    }
}
