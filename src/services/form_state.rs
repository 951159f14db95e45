// src/services/form_state.rs

//! Form field harvesting and override.
//!
//! Turns a server-rendered form into an explicit [`FormFieldSet`] and applies
//! the overrides needed to submit it with exactly one dispatch trigger.

use scraper::{ElementRef, Html};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FormFieldSet, Page};
use crate::utils::html::parse_selector;

/// Input types that dispatch a server action when sent.
const ACTION_TYPES: [&str; 4] = ["submit", "button", "image", "reset"];

/// Which dispatch trigger survives the override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Keep the action control with this name
    Named(String),
    /// Drop every action control. The server dispatches on hidden fields
    /// that page script would set (postback target, method handler).
    Script,
}

/// Overrides applied to a harvested field set before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOverrides {
    pub values: Vec<(String, String)>,
    pub remove: Vec<String>,
    pub trigger: Trigger,
}

impl FormOverrides {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            values: Vec::new(),
            remove: Vec::new(),
            trigger,
        }
    }

    pub fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.push((name.to_string(), value.into()));
        self
    }

    pub fn remove(mut self, names: &[&str]) -> Self {
        self.remove.extend(names.iter().map(|n| n.to_string()));
        self
    }
}

/// Harvest the fields of the form matching `form_selector` on a page.
///
/// A missing form means the markup changed or the session expired, and is
/// an extraction error rather than an empty submission.
pub fn extract(page: &Page, form_selector: &str) -> Result<FormFieldSet> {
    let document = Html::parse_document(&page.body);
    let selector = parse_selector(form_selector)?;
    let form = document
        .select(&selector)
        .next()
        .ok_or_else(|| AppError::extraction(&page.url, format!("form '{form_selector}'")))?;
    extract_from(&form)
}

/// Absolute submission URL of a form; the page itself when `action` is absent.
pub fn action_url(page: &Page, form_selector: &str) -> Result<Url> {
    let document = Html::parse_document(&page.body);
    let selector = parse_selector(form_selector)?;
    let form = document
        .select(&selector)
        .next()
        .ok_or_else(|| AppError::extraction(&page.url, format!("form '{form_selector}'")))?;
    match form.value().attr("action").filter(|a| !a.trim().is_empty()) {
        Some(action) => Ok(page.url.join(action.trim())?),
        None => Ok(page.url.clone()),
    }
}

/// Walk `input` and `select` descendants of a form in document order.
pub fn extract_from(form: &ElementRef<'_>) -> Result<FormFieldSet> {
    let controls = parse_selector("input, select")?;
    let options = parse_selector("option")?;
    let mut fields = FormFieldSet::new();

    for control in form.select(&controls) {
        let element = control.value();
        let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };

        if element.name() == "select" {
            let mut choices = control.select(&options);
            let chosen = control
                .select(&options)
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| choices.next());
            let value = chosen
                .map(|o| {
                    o.value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                })
                .unwrap_or_default();
            fields.push(name, value, false);
        } else {
            let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
            let value = element.attr("value").unwrap_or("");
            fields.push(name, value, ACTION_TYPES.contains(&kind.as_str()));
        }
    }

    Ok(fields)
}

/// Apply overrides and prune alternate dispatch triggers.
///
/// `source` is the page the form came from. A named trigger that is not on
/// the form means the markup changed, reported as an extraction error there.
pub fn apply(
    mut fields: FormFieldSet,
    overrides: &FormOverrides,
    source: &Url,
) -> Result<FormFieldSet> {
    for name in &overrides.remove {
        fields.remove(name);
    }
    for (name, value) in &overrides.values {
        fields.set(name, value.as_str());
    }

    match &overrides.trigger {
        Trigger::Named(keep) => fields.retain(|f| !f.action || &f.name == keep),
        Trigger::Script => fields.retain(|f| !f.action),
    }

    if let Trigger::Named(name) = &overrides.trigger {
        let remaining = fields.actions().count();
        if remaining != 1 {
            return Err(AppError::extraction(
                source,
                format!("one submit control '{name}' on the form, found {remaining}"),
            ));
        }
    }

    Ok(fields)
}
