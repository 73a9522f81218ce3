// src/extract/locator.rs

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::EtlError;

/// Picks the element rows that hold the dataset out of a parsed page.
///
/// All positional assumptions about the source page live behind this trait.
pub trait Locator {
    fn locate_rows<'a>(&self, doc: &'a Html) -> Result<Vec<ElementRef<'a>>>;
}

/// The `index`-th `<tbody>` in document order (0-based), and every `<tr>` inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TbodyIndex {
    pub index: usize,
}

impl TbodyIndex {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl Locator for TbodyIndex {
    fn locate_rows<'a>(&self, doc: &'a Html) -> Result<Vec<ElementRef<'a>>> {
        let tbody = Selector::parse("tbody").expect("tbody selector should parse");
        let tr = Selector::parse("tr").expect("tr selector should parse");

        let bodies: Vec<ElementRef<'a>> = doc.select(&tbody).collect();
        let body = bodies.get(self.index).ok_or_else(|| {
            EtlError::Layout(format!(
                "wanted tbody #{} but the page has {}",
                self.index,
                bodies.len()
            ))
        })?;
        Ok(body.select(&tr).collect())
    }
}
