// src/services/extractor.rs

//! Record extraction from result and detail pages.
//!
//! Column positions are a contract with each site's table layout. A
//! reordered table yields records with the wrong fields rather than an
//! error; the fixture tests per layout are what catch that.

use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{AttachmentRef, DetailInfo, Page, Record};
use crate::utils::html::{ancestor, parse_selector, row_cells, text_of};
use crate::utils::{resolve_url, strip_session_id};

/// Where a record's id is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Text of the detail link itself
    LinkText,
    /// Cell at this index in the link's row
    Column(usize),
}

/// Column schema of a result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLayout {
    /// Bumped whenever the site's table layout changes
    pub version: u32,
    /// Selects the per-record detail links
    pub link_selector: &'static str,
    pub id: IdSource,
    pub record_type: Option<usize>,
    pub applicant: Option<usize>,
    pub api_no: Option<usize>,
    pub filing_date: Option<usize>,
    /// Drop `;jsessionid=` from detail links
    pub strip_session: bool,
}

/// Labels that locate the interesting parts of a detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailLayout {
    pub version: u32,
    /// Text the operator cell starts with
    pub operator_label: &'static str,
    /// Element inside that cell holding the name
    pub operator_value: &'static str,
    /// Exact header text of the attachments table
    pub forms_header: &'static str,
    /// Exact text of the per-attachment links
    pub link_text: &'static str,
    /// Cell holding the attachment name
    pub name_column: usize,
}

/// Extract every record on a result page.
pub fn extract_list_page(page: &Page, layout: &ListLayout) -> Result<Vec<Record>> {
    let document = Html::parse_document(&page.body);
    let links = parse_selector(layout.link_selector)?;
    let mut records = Vec::new();

    for link in document.select(&links) {
        let Some(row) = ancestor(&link, "tr") else {
            continue;
        };
        let cells = row_cells(&row);
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| cells.get(i))
                .map(text_of)
                .unwrap_or_default()
        };

        let href = link.value().attr("href").unwrap_or("");
        let href = if layout.strip_session {
            strip_session_id(href)
        } else {
            href.to_string()
        };

        let id = match layout.id {
            IdSource::LinkText => text_of(&link),
            IdSource::Column(i) => cell(Some(i)),
        };

        records.push(Record {
            id,
            record_type: cell(layout.record_type),
            applicant: cell(layout.applicant),
            api_no: cell(layout.api_no),
            filing_date: cell(layout.filing_date),
            url: resolve_url(&page.url, &href),
            operator_name: None,
            forms: Vec::new(),
        });
    }

    Ok(records)
}

/// Extract operator name and attachment links from a detail page.
///
/// Missing labels mean the page shape changed; both are fatal.
pub fn extract_detail_page(page: &Page, layout: &DetailLayout) -> Result<DetailInfo> {
    let document = Html::parse_document(&page.body);
    let cells = parse_selector("td")?;
    let headers = parse_selector("th")?;
    let anchors = parse_selector("a")?;
    let value_sel = parse_selector(layout.operator_value)?;

    let operator_cell = document
        .select(&cells)
        .find(|td| text_of(td).starts_with(layout.operator_label))
        .ok_or_else(|| {
            AppError::extraction(&page.url, format!("td starting '{}'", layout.operator_label))
        })?;
    let operator_name = operator_cell
        .select(&value_sel)
        .next()
        .map(|v| text_of(&v))
        .ok_or_else(|| {
            AppError::extraction(
                &page.url,
                format!("{} inside '{}'", layout.operator_value, layout.operator_label),
            )
        })?;

    let header = document
        .select(&headers)
        .find(|th| text_of(th) == layout.forms_header)
        .ok_or_else(|| AppError::extraction(&page.url, format!("th '{}'", layout.forms_header)))?;
    let table = ancestor(&header, "table").ok_or_else(|| {
        AppError::extraction(&page.url, format!("table around '{}'", layout.forms_header))
    })?;

    let mut forms = Vec::new();
    for link in table.select(&anchors) {
        if text_of(&link) != layout.link_text {
            continue;
        }
        let Some(row) = ancestor(&link, "tr") else {
            continue;
        };
        let display_name = row_cells(&row)
            .get(layout.name_column)
            .map(text_of)
            .unwrap_or_default();
        let href = link.value().attr("href").unwrap_or("");

        forms.push(AttachmentRef {
            display_name,
            source_url: resolve_url(&page.url, href),
        });
    }

    Ok(DetailInfo {
        operator_name,
        forms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const CASE_LAYOUT: ListLayout = ListLayout {
        version: 1,
        link_selector: "div#pnlList > table a",
        id: IdSource::Column(0),
        record_type: Some(1),
        applicant: Some(2),
        api_no: None,
        filing_date: Some(3),
        strip_session: false,
    };

    const DETAIL_LAYOUT: DetailLayout = DetailLayout {
        version: 1,
        operator_label: "Operator Name:",
        operator_value: "strong",
        forms_header: "Form/Attachment",
        link_text: "View",
        name_column: 0,
    };

    fn page(url: &str, body: &str) -> Page {
        Page::new(Url::parse(url).unwrap(), body)
    }

    #[test]
    fn test_list_page_reads_columns() {
        let body = r#"
            <div id="pnlList"><table>
              <tr><th>Case</th><th>Type</th><th>Applicant</th><th>Filed</th><th></th></tr>
              <tr><td>CP-100</td><td>Compulsory Pooling</td><td>Acme LLC</td><td>07/01/2019</td>
                  <td><a href="CaseFile.aspx?id=100">View</a></td></tr>
              <tr><td>CP-101</td><td>Compulsory Pooling</td><td>Beta Inc</td><td>07/05/2019</td>
                  <td><a href="/imaging/CaseFile.aspx?id=101">View</a></td></tr>
            </table></div>
        "#;
        let records = extract_list_page(
            &page("http://ocd.example/imaging/CaseFileCriteria.aspx", body),
            &CASE_LAYOUT,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "CP-100");
        assert_eq!(records[0].record_type, "Compulsory Pooling");
        assert_eq!(records[0].applicant, "Acme LLC");
        assert_eq!(records[0].filing_date, "07/01/2019");
        assert_eq!(
            records[0].url,
            "http://ocd.example/imaging/CaseFile.aspx?id=100"
        );
        assert_eq!(records[1].id, "CP-101");
        assert_eq!(records[1].applicant, "Beta Inc");
        assert_eq!(
            records[1].url,
            "http://ocd.example/imaging/CaseFile.aspx?id=101"
        );
    }

    #[test]
    fn test_list_page_without_rows_is_empty() {
        let records =
            extract_list_page(&page("http://ocd.example/", "<p>No results</p>"), &CASE_LAYOUT)
                .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_list_page_strips_session_and_reads_link_text() {
        let layout = ListLayout {
            version: 1,
            link_selector: r#"table.DataGrid a[href*="?packetSummary"]"#,
            id: IdSource::LinkText,
            record_type: None,
            applicant: None,
            api_no: Some(3),
            filing_date: None,
            strip_session: true,
        };
        let body = r#"
            <table class="DataGrid">
              <tr><td><a href="publicSearchAction.do;jsessionid=XYZ?packetSummary=1&amp;packetId=77"> 77 </a></td>
                  <td>W-2</td><td>Submitted</td><td>42-123-45678</td></tr>
            </table>
        "#;
        let records = extract_list_page(
            &page("http://rrc.example/CMPL/publicSearchAction.do", body),
            &layout,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "77");
        assert_eq!(records[0].api_no, "42-123-45678");
        assert_eq!(
            records[0].url,
            "http://rrc.example/CMPL/publicSearchAction.do?packetSummary=1&packetId=77"
        );
    }

    #[test]
    fn test_detail_page() {
        let body = r#"
            <table><tr><td>Operator Name: <strong> Acme Oil &amp; Gas </strong></td></tr></table>
            <table>
              <tr><th>Form/Attachment</th><th>Action</th></tr>
              <tr><td>W-2</td><td><a href="/dpimages/r/4800">View</a></td></tr>
              <tr><td>Other</td><td><a href="/dpimages/r/4821">View</a></td></tr>
              <tr><td>Other</td><td><a href="/dpimages/r/4902">View</a></td></tr>
              <tr><td>Help</td><td><a href="/help">Help</a></td></tr>
            </table>
        "#;
        let detail =
            extract_detail_page(&page("http://rrc.example/CMPL/x.do", body), &DETAIL_LAYOUT)
                .unwrap();
        assert_eq!(detail.operator_name, "Acme Oil & Gas");
        assert_eq!(detail.forms.len(), 3);
        assert_eq!(detail.forms[1].display_name, "Other");
        assert_eq!(detail.forms[1].source_url, "http://rrc.example/dpimages/r/4821");
    }

    #[test]
    fn test_detail_page_missing_header_is_fatal() {
        let body = r#"<table><tr><td>Operator Name: <strong>Acme</strong></td></tr></table>"#;
        let err = extract_detail_page(&page("http://rrc.example/d", body), &DETAIL_LAYOUT)
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { ref expected, .. } if expected.contains("Form/Attachment")));
    }

    #[test]
    fn test_detail_page_missing_operator_is_fatal() {
        let body = r#"<table><tr><th>Form/Attachment</th></tr></table>"#;
        let err = extract_detail_page(&page("http://rrc.example/d", body), &DETAIL_LAYOUT)
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
    }
}
