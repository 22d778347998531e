use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use sea_orm::prelude::Decimal;
use serde::{Deserialize, Serialize};

/// Field name to messages. `__all__` holds errors not tied to one field.
pub type FormErrors = BTreeMap<&'static str, Vec<String>>;

pub const NON_FIELD: &str = "__all__";

const MAX_WHOLE_DIGITS: usize = 4;
const MAX_DECIMAL_PLACES: u32 = 2;
pub const TAG_NAME_MAX: usize = 16;
pub const NAME_MAX: usize = 128;

const REQUIRED: &str = "This field is required.";

pub fn add_error(errors: &mut FormErrors, field: &'static str, msg: impl Into<String>) {
    errors.entry(field).or_default().push(msg.into());
}

/// Actual hours to add to each phase.
#[derive(Deserialize, Serialize, Default, Clone)]
pub struct HoursForm {
    pub actual_design: Option<String>,
    pub actual_development: Option<String>,
    pub actual_testing: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourDeltas {
    pub design: Decimal,
    pub development: Decimal,
    pub testing: Decimal,
}

impl HourDeltas {
    pub fn is_zero(&self) -> bool {
        self.design.is_zero() && self.development.is_zero() && self.testing.is_zero()
    }
}

impl HoursForm {
    pub fn validate(&self) -> Result<HourDeltas, FormErrors> {
        let mut errors = FormErrors::new();
        let design = clean_field(&mut errors, "actual_design", self.actual_design.as_deref());
        let development =
            clean_field(&mut errors, "actual_development", self.actual_development.as_deref());
        let testing = clean_field(&mut errors, "actual_testing", self.actual_testing.as_deref());

        match (design, development, testing) {
            (Some(design), Some(development), Some(testing)) if errors.is_empty() => Ok(HourDeltas {
                design,
                development,
                testing,
            }),
            _ => Err(errors),
        }
    }
}

fn clean_field(errors: &mut FormErrors, field: &'static str, raw: Option<&str>) -> Option<Decimal> {
    match clean_hours(raw) {
        Ok(value) => Some(value),
        Err(msg) => {
            add_error(errors, field, msg);
            None
        }
    }
}

/// Required, non-negative, at most 4 whole digits and 2 decimal places.
pub fn clean_hours(raw: Option<&str>) -> Result<Decimal, String> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or(REQUIRED)?;
    let value = Decimal::from_str(raw).map_err(|_| "Enter a number.".to_string())?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err("Ensure this value is greater than or equal to 0.".to_string());
    }
    let value = value.normalize();
    if value.scale() > MAX_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            MAX_DECIMAL_PLACES
        ));
    }
    let whole = value.trunc();
    let whole_digits = if whole.is_zero() { 0 } else { whole.to_string().len() };
    if whole_digits > MAX_WHOLE_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            MAX_WHOLE_DIGITS
        ));
    }
    Ok(value.abs())
}

/// Largest running total the `decimal(6, 2)` hours columns hold.
pub const MAX_HOURS_TOTAL: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Checks the totals an hour update would store, keyed by form field.
pub fn check_hour_totals(totals: &[(&'static str, Decimal)]) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();
    for &(field, total) in totals {
        if total > MAX_HOURS_TOTAL {
            add_error(
                &mut errors,
                field,
                format!(
                    "The total would be {}; it must stay at or below {}.",
                    total, MAX_HOURS_TOTAL
                ),
            );
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn clean_name(raw: Option<&str>, max: usize) -> Result<String, String> {
    let name = raw.map(str::trim).filter(|v| !v.is_empty()).ok_or(REQUIRED)?;
    let len = name.chars().count();
    if len > max {
        return Err(format!(
            "Ensure this value has at most {} characters (it has {}).",
            max, len
        ));
    }
    Ok(name.to_string())
}

fn clean_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| "Enter a valid date.".to_string()),
    }
}

#[derive(Deserialize, Serialize, Default, Clone)]
pub struct TagForm {
    pub name: Option<String>,
}

impl TagForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        clean_name(self.name.as_deref(), TAG_NAME_MAX).map_err(|msg| {
            let mut errors = FormErrors::new();
            add_error(&mut errors, "name", msg);
            errors
        })
    }
}

#[derive(Deserialize, Serialize, Default, Clone)]
pub struct CompanyForm {
    pub name: Option<String>,
}

impl CompanyForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        clean_name(self.name.as_deref(), NAME_MAX).map_err(|msg| {
            let mut errors = FormErrors::new();
            add_error(&mut errors, "name", msg);
            errors
        })
    }
}

#[derive(Deserialize, Serialize, Default, Clone)]
pub struct ProjectForm {
    pub company: Option<String>,
    pub title: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub estimated_design: Option<String>,
    pub estimated_development: Option<String>,
    pub estimated_testing: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub company_id: i32,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub estimated: HourDeltas,
}

impl ProjectForm {
    /// Field-level checks only; the handler verifies the company exists.
    pub fn validate(&self) -> Result<NewProject, FormErrors> {
        let mut errors = FormErrors::new();

        let company_id = match self.company.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                add_error(&mut errors, "company", REQUIRED);
                None
            }
            Some(raw) => match raw.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    add_error(&mut errors, "company", "Select a valid choice.");
                    None
                }
            },
        };
        let title = match clean_name(self.title.as_deref(), NAME_MAX) {
            Ok(title) => Some(title),
            Err(msg) => {
                add_error(&mut errors, "title", msg);
                None
            }
        };
        let start_date = clean_date(self.start_date.as_deref()).unwrap_or_else(|msg| {
            add_error(&mut errors, "start_date", msg);
            None
        });
        let end_date = clean_date(self.end_date.as_deref()).unwrap_or_else(|msg| {
            add_error(&mut errors, "end_date", msg);
            None
        });
        let design = clean_field(&mut errors, "estimated_design", self.estimated_design.as_deref());
        let development = clean_field(
            &mut errors,
            "estimated_development",
            self.estimated_development.as_deref(),
        );
        let testing = clean_field(&mut errors, "estimated_testing", self.estimated_testing.as_deref());

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                add_error(&mut errors, "end_date", "End date is before the start date.");
            }
        }

        match (company_id, title, design, development, testing) {
            (Some(company_id), Some(title), Some(design), Some(development), Some(testing))
                if errors.is_empty() =>
            {
                Ok(NewProject {
                    company_id,
                    title,
                    start_date,
                    end_date,
                    estimated: HourDeltas {
                        design,
                        development,
                        testing,
                    },
                })
            }
            _ => Err(errors),
        }
    }
}

/// Collects the multi-valued `tags` field of a url-encoded body.
pub fn parse_tag_ids(pairs: &[(String, String)]) -> Result<Vec<i32>, FormErrors> {
    let mut errors = FormErrors::new();
    let mut ids = Vec::new();
    for (key, value) in pairs {
        if key != "tags" {
            continue;
        }
        match value.trim().parse::<i32>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => add_error(&mut errors, "tags", format!("“{}” is not a valid value.", value)),
        }
    }
    if errors.is_empty() {
        Ok(ids)
    } else {
        Err(errors)
    }
}
