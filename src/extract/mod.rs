// src/extract/mod.rs

pub mod locator;

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::EtlError;
use crate::table::{ResultTable, Value};

pub use locator::{Locator, TbodyIndex};

/// Glyph the source pages use for "no data".
pub const MISSING_MARKER: &str = "\u{2014}";

/// Which non-empty rows make it into the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowRule {
    AcceptAll,
    /// Cell `link_cell` must contain an `<a>` and cell `value_cell` must not
    /// contain `missing_marker`.
    LinkedWithValue {
        link_cell: usize,
        value_cell: usize,
        missing_marker: String,
    },
}

/// One output field, read from a fixed cell offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSource {
    pub name: String,
    pub cell: usize,
}

impl ColumnSource {
    pub fn new(name: impl Into<String>, cell: usize) -> Self {
        Self {
            name: name.into(),
            cell,
        }
    }
}

/// Parse `html` and build the pre-transform table.
///
/// Rows without any `<td>` are header or separator rows and are skipped.
/// Zero accepted rows is not an error.
#[instrument(level = "info", skip(html, locator))]
pub fn extract_table<L: Locator + ?Sized>(
    html: &str,
    locator: &L,
    rule: &RowRule,
    columns: &[ColumnSource],
) -> Result<ResultTable> {
    let doc = Html::parse_document(html);
    let td = Selector::parse("td").expect("td selector should parse");
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let mut table = ResultTable::with_text_fields(&names);

    let rows = locator.locate_rows(&doc)?;
    debug!(rows = rows.len(), "located candidate rows");

    for (row_no, row) in rows.iter().enumerate() {
        let cells: Vec<ElementRef> = row.select(&td).collect();
        if cells.is_empty() {
            continue;
        }
        if !accepts(rule, &cells, row_no)? {
            continue;
        }
        let record = columns
            .iter()
            .map(|c| cell_at(&cells, c.cell, row_no).map(|el| Value::Text(cell_text(el))))
            .collect::<Result<Vec<_>>>()?;
        table.push_row(record)?;
    }

    if table.is_empty() {
        warn!(
            candidates = rows.len(),
            "no rows accepted; the source layout may have changed"
        );
    } else {
        debug!(accepted = table.len(), "extracted rows");
    }
    Ok(table)
}

fn accepts(rule: &RowRule, cells: &[ElementRef], row_no: usize) -> Result<bool> {
    match rule {
        RowRule::AcceptAll => Ok(true),
        RowRule::LinkedWithValue {
            link_cell,
            value_cell,
            missing_marker,
        } => {
            let a = Selector::parse("a").expect("a selector should parse");
            let has_link = cell_at(cells, *link_cell, row_no)?
                .select(&a)
                .next()
                .is_some();
            if !has_link {
                return Ok(false);
            }
            let value = cell_text(cell_at(cells, *value_cell, row_no)?);
            Ok(!value.contains(missing_marker.as_str()))
        }
    }
}

fn cell_at<'a, 'b>(cells: &'b [ElementRef<'a>], idx: usize, row_no: usize) -> Result<&'b ElementRef<'a>> {
    cells.get(idx).ok_or_else(|| {
        EtlError::Layout(format!(
            "row {} has {} cells, expected at least {}",
            row_no,
            cells.len(),
            idx + 1
        ))
        .into()
    })
}

/// All descendant text, trimmed.
pub fn cell_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries_rule() -> RowRule {
        RowRule::LinkedWithValue {
            link_cell: 0,
            value_cell: 2,
            missing_marker: MISSING_MARKER.to_string(),
        }
    }

    fn countries_columns() -> Vec<ColumnSource> {
        vec![
            ColumnSource::new("Country", 0),
            ColumnSource::new("GDP_USD_millions", 2),
        ]
    }

    const COUNTRIES: &str = r#"<html><body>
        <table><tbody><tr><td>nav</td></tr></tbody></table>
        <table><tbody><tr><td>legend</td></tr></tbody></table>
        <table><tbody>
          <tr><th>Country</th><th>Region</th><th>IMF</th></tr>
          <tr><td>World</td><td></td><td>105,568,776</td></tr>
          <tr><td><a href="/wiki/US">United States</a></td><td>Americas</td><td>26,854,599</td></tr>
          <tr><td><a href="/wiki/Russia">Russia</a></td><td>Europe</td><td>—</td></tr>
          <tr><td> <a href="/wiki/China">China</a> </td><td>Asia</td><td>
              19,373,586 <sup>[n 1]</sup></td></tr>
        </tbody></table>
    </body></html>"#;

    #[test]
    fn countries_rows_need_link_and_value() {
        let t = extract_table(
            COUNTRIES,
            &TbodyIndex::new(2),
            &countries_rule(),
            &countries_columns(),
        )
        .unwrap();
        assert_eq!(t.field_names(), vec!["Country", "GDP_USD_millions"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "Country"), Some(&Value::Text("United States".into())));
        assert_eq!(
            t.get(0, "GDP_USD_millions"),
            Some(&Value::Text("26,854,599".into()))
        );
        assert_eq!(t.get(1, "Country"), Some(&Value::Text("China".into())));
        assert_eq!(
            t.get(1, "GDP_USD_millions"),
            Some(&Value::Text("19,373,586 [n 1]".into()))
        );
    }

    const BANKS: &str = r#"<html><body><table><tbody>
        <tr><th>Rank</th><th>Bank name</th><th>Market cap</th></tr>
        <tr><td>1</td><td><a href="/jpm">JPMorgan Chase</a></td><td>432.92
        </td></tr>
        <tr><td>2</td><td>Bank of America</td><td>231.52</td></tr>
        <tr><td>3</td><td>Mystery Bank</td><td>n/a</td></tr>
    </tbody></table></body></html>"#;

    #[test]
    fn banks_accept_every_non_empty_row() {
        let t = extract_table(
            BANKS,
            &TbodyIndex::new(0),
            &RowRule::AcceptAll,
            &[
                ColumnSource::new("Name", 1),
                ColumnSource::new("MC_USD_Billion", 2),
            ],
        )
        .unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(0, "Name"), Some(&Value::Text("JPMorgan Chase".into())));
        assert_eq!(t.get(0, "MC_USD_Billion"), Some(&Value::Text("432.92".into())));
        assert_eq!(t.get(2, "MC_USD_Billion"), Some(&Value::Text("n/a".into())));
    }

    #[test]
    fn no_matching_rows_gives_empty_table() {
        let t = extract_table(
            COUNTRIES,
            &TbodyIndex::new(0),
            &countries_rule(),
            &countries_columns(),
        );
        // the link check fails before the missing value cell is read
        let t = t.unwrap();
        assert!(t.is_empty());
        assert_eq!(t.fields().len(), 2);
    }

    #[test]
    fn short_accepted_row_is_a_layout_error() {
        let page = r#"<table><tbody><tr><td><a href="x">X</a></td></tr></tbody></table>"#;
        let err = extract_table(
            page,
            &TbodyIndex::new(0),
            &countries_rule(),
            &countries_columns(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::Layout(_))
        ));
    }
}
