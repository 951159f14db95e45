//! New Mexico OCD imaging case file search (ASP.NET postback form).

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::models::{PageRequest, Record, SearchCriteria};
use crate::services::form_state::{self, FormOverrides, Trigger};
use crate::services::paginator::{EVENT_ARGUMENT, EVENT_TARGET};
use crate::services::{Fetcher, IdSource, ListLayout, PaginationStyle};
use crate::sites::SearchSite;

const FORM: &str = "form#form1";
const SEARCH_BUTTON: &str = "ctl00$main$btnSearch";
const CASE_TYPE: &str = "ctl00$main$ddlCaseType";
const DATE_CRITERIA: &str = "ctl00$main$FilingDate$DateCriteriaList1$ddlCriteria";
const FILING_DATE: &str = "ctl00$main$FilingDate$txtDate";

/// Compulsory pooling cases
const CASE_TYPE_POOLING: &str = "CP";

/// Alternate actions on the criteria form.
const ALTERNATE_ACTIONS: &[&str] = &[
    "ctl00$main$btnClearAll",
    "ctl00$main$btnGoBack",
    "ctl00$main$btnCaseNo",
];

const PAGINATION: PaginationStyle = PaginationStyle::Postback {
    form: FORM,
    next_anchor: "a#Next",
    removed: &["ctl00$main$CaseFileList1$btnReturn"],
};

/// Case number, case type, applicant, filing date.
pub const LIST_LAYOUT: ListLayout = ListLayout {
    version: 1,
    link_selector: "div#pnlList > table a",
    id: IdSource::Column(0),
    record_type: Some(1),
    applicant: Some(2),
    api_no: None,
    filing_date: Some(3),
    strip_session: false,
};

/// Case files filed after the from-date, paged by postback.
pub struct OcdSite {
    search_url: Url,
}

impl OcdSite {
    pub fn new(search_url: Url) -> Self {
        Self { search_url }
    }
}

#[async_trait]
impl SearchSite for OcdSite {
    fn name(&self) -> &'static str {
        "ocd"
    }

    async fn search_request(
        &self,
        fetcher: &Fetcher,
        criteria: &SearchCriteria,
    ) -> Result<PageRequest> {
        let criteria_page = fetcher
            .fetch(&PageRequest::get(self.search_url.clone()))
            .await?;

        let fields = form_state::extract(&criteria_page, FORM)?;
        let overrides = FormOverrides::new(Trigger::Named(SEARCH_BUTTON.to_string()))
            .remove(ALTERNATE_ACTIONS)
            .set(EVENT_TARGET, "")
            .set(EVENT_ARGUMENT, "")
            .set(CASE_TYPE, CASE_TYPE_POOLING)
            .set(DATE_CRITERIA, "GreaterThan")
            .set(FILING_DATE, criteria.from_date());
        let fields = form_state::apply(fields, &overrides, &criteria_page.url)?;
        let url = form_state::action_url(&criteria_page, FORM)?;

        Ok(PageRequest::post(url, fields))
    }

    fn pagination(&self) -> &PaginationStyle {
        &PAGINATION
    }

    fn list_layout(&self) -> &ListLayout {
        &LIST_LAYOUT
    }

    /// The form only filters "filed after", so the end of the range is
    /// applied here.
    fn accepts(&self, record: &Record, criteria: &SearchCriteria) -> bool {
        criteria.filed_by_end(&record.filing_date)
    }
}
