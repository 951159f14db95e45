//! Filing records harvested from result pages.

use serde::{Deserialize, Serialize};

/// A named document linked from a record's detail page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Label from the Form/Attachment column (not unique within a record)
    pub display_name: String,

    /// Absolute URL of the document
    pub source_url: String,
}

/// Operator and attachments read from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailInfo {
    pub operator_name: String,
    pub forms: Vec<AttachmentRef>,
}

/// One filed record from a search result table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Tracking or case number
    pub id: String,

    /// Case or packet type
    #[serde(default)]
    pub record_type: String,

    #[serde(default)]
    pub applicant: String,

    /// API number, used as the top-level download folder
    #[serde(default)]
    pub api_no: String,

    #[serde(default)]
    pub filing_date: String,

    /// Absolute detail page URL
    pub url: String,

    /// Filled from the detail page
    #[serde(default)]
    pub operator_name: Option<String>,

    /// Filled from the detail page
    #[serde(default)]
    pub forms: Vec<AttachmentRef>,
}

impl Record {
    /// Merge detail page data into the record.
    pub fn apply_detail(&mut self, detail: DetailInfo) {
        self.operator_name = Some(detail.operator_name);
        self.forms = detail.forms;
    }

    /// Row for the tabular export.
    pub fn csv_row(&self) -> [&str; 5] {
        [
            &self.id,
            &self.record_type,
            &self.applicant,
            &self.filing_date,
            &self.url,
        ]
    }
}
