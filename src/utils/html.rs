//! Small helpers over `scraper` element trees.

use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Element text with whitespace collapsed and trimmed.
pub fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest ancestor element with the given tag name.
pub fn ancestor<'a>(element: &ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name().eq_ignore_ascii_case(tag))
}

/// Direct `td` cells of a table row, in order.
pub fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name().eq_ignore_ascii_case("td"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector("a[href*=\"?packetSummary\"]").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_ancestor_and_cells() {
        let doc = Html::parse_document(
            "<table><tr><td> A\n  1 </td><td><a href='x'>go</a></td></tr></table>",
        );
        let a_sel = parse_selector("a").unwrap();
        let a = doc.select(&a_sel).next().unwrap();
        let tr = ancestor(&a, "tr").unwrap();
        let cells = row_cells(&tr);
        assert_eq!(cells.len(), 2);
        assert_eq!(text_of(&cells[0]), "A 1");
        assert!(ancestor(&a, "form").is_none());
    }
}
