//! Texas RRC completion packet search.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;
use crate::models::{PageRequest, SearchCriteria, SearchMode};
use crate::services::form_state::{self, FormOverrides, Trigger};
use crate::services::{DetailLayout, Fetcher, IdSource, ListLayout, PaginationStyle};
use crate::sites::SearchSite;

const FORM: &str = r#"form[name="externalPacketForm"]"#;
const METHOD: &str = "formData.methodHndlr.inputValue";

const PAGINATION: PaginationStyle = PaginationStyle::Anchor {
    link_text: "[Next>]",
};

/// Tracking number from the link, API number in the fourth column.
pub const LIST_LAYOUT: ListLayout = ListLayout {
    version: 1,
    link_selector: r#"table.DataGrid a[href*="?packetSummary"]"#,
    id: IdSource::LinkText,
    record_type: None,
    applicant: None,
    api_no: Some(3),
    filing_date: None,
    strip_session: true,
};

pub const DETAIL_LAYOUT: DetailLayout = DetailLayout {
    version: 1,
    operator_label: "Operator Name:",
    operator_value: "strong",
    forms_header: "Form/Attachment",
    link_text: "View",
    name_column: 0,
};

/// Compact pipe-delimited search descriptor.
pub fn query_descriptor(criteria: &SearchCriteria) -> String {
    format!(
        "|0={}|1={}|5={}|17=N|18=N|19=N|21=N",
        criteria.from_date(),
        criteria.to_date(),
        criteria.operator_id()
    )
}

/// Packets submitted by one operator within a date range.
pub struct RrcSite {
    search_url: Url,
    mode: SearchMode,
}

impl RrcSite {
    pub fn new(search_url: Url, mode: SearchMode) -> Self {
        Self { search_url, mode }
    }

    /// Search as a single GET carrying the query descriptor.
    fn query_search(&self, criteria: &SearchCriteria) -> PageRequest {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("pager.pageSize", "100")
            .append_pair("pager.offset", "0")
            .append_pair(METHOD, "search")
            .append_pair("searchArgs.paramValue", &query_descriptor(criteria))
            .append_pair("offset", "0")
            .append_pair("pageSize", "10")
            .append_pair("formData.hrefValue", "|1003=home|1005=home|1007=0");
        PageRequest::get(url)
    }

    /// Search by loading the home form and posting it back.
    async fn form_search(
        &self,
        fetcher: &Fetcher,
        criteria: &SearchCriteria,
    ) -> Result<PageRequest> {
        let mut init_url = self.search_url.clone();
        init_url
            .query_pairs_mut()
            .append_pair(METHOD, "init")
            .append_pair("formData.headerTabSelected", "home")
            .append_pair("formData.pageForwardHndlr.inputValue", "home");
        let home = fetcher.fetch(&PageRequest::get(init_url)).await?;

        let fields = form_state::extract(&home, FORM)?;
        // Mirrors the page's doSearch() script.
        let overrides = FormOverrides::new(Trigger::Script)
            .remove(&["searchArgs.excludeStatusAndApprovedDtHndlr.booleanValue"])
            .set("searchArgs.fromSubmitDtArgHndlr.inputValue", criteria.from_date())
            .set("searchArgs.toSubmitDtArgHndlr.inputValue", criteria.to_date())
            .set("searchArgs.operatorNoArgHndlr.inputValue", criteria.operator_id())
            .set(METHOD, "search");
        let fields = form_state::apply(fields, &overrides, &home.url)?;
        let url = form_state::action_url(&home, FORM)?;

        Ok(PageRequest::post(url, fields))
    }
}

#[async_trait]
impl SearchSite for RrcSite {
    fn name(&self) -> &'static str {
        "rrc"
    }

    async fn search_request(
        &self,
        fetcher: &Fetcher,
        criteria: &SearchCriteria,
    ) -> Result<PageRequest> {
        match self.mode {
            SearchMode::Query => Ok(self.query_search(criteria)),
            SearchMode::Form => self.form_search(fetcher, criteria).await,
        }
    }

    fn pagination(&self) -> &PaginationStyle {
        &PAGINATION
    }

    fn list_layout(&self) -> &ListLayout {
        &LIST_LAYOUT
    }

    fn detail_layout(&self) -> Option<&DetailLayout> {
        Some(&DETAIL_LAYOUT)
    }
}
