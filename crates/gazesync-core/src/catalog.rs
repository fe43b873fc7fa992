//! Static disclosure catalog — the process-wide list of pages and sections
//!
//! Loaded once at startup, read-only thereafter, shared as
//! `Arc<SectionCatalog>`. The catalog precomputes a page-major arena of
//! section records with stable indices, so the engine can preallocate one
//! dwell record per `(page, section)` pair instead of churning nested maps.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

/// Compliance weight of a section. High-priority sections are the ones an
/// observer is expected to challenge when left incomplete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

fn default_priority() -> Priority {
    Priority::Normal
}

/// One addressable disclosure region with its own dwell threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub id: String,
    pub title: String,
    #[serde(rename = "requiredDwellSecs")]
    pub required_dwell_secs: f64,
    #[serde(default = "default_priority")]
    pub priority: Priority,
}

/// A disclosure page and its ordered section checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub id: String,
    pub name: String,
    pub sections: Vec<SectionDefinition>,
}

/// Stable slot in the catalog arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SectionIdx(pub usize);

/// One arena record: a section definition plus its owning page.
#[derive(Debug, Clone)]
pub struct SectionRecord {
    pub page_id: String,
    pub definition: SectionDefinition,
}

#[derive(Deserialize)]
struct CatalogFile {
    pages: Vec<PageDefinition>,
}

/// Immutable catalog with arena indexing.
#[derive(Debug)]
pub struct SectionCatalog {
    pages: Vec<PageDefinition>,
    records: Vec<SectionRecord>,
    index: HashMap<(String, String), SectionIdx>,
    page_ranges: HashMap<String, Range<usize>>,
    section_pages: HashMap<String, String>,
}

impl SectionCatalog {
    pub fn from_pages(pages: Vec<PageDefinition>) -> Self {
        let mut records = Vec::new();
        let mut index = HashMap::new();
        let mut page_ranges = HashMap::new();
        let mut section_pages = HashMap::new();

        for page in &pages {
            let start = records.len();
            for section in &page.sections {
                index.insert(
                    (page.id.clone(), section.id.clone()),
                    SectionIdx(records.len()),
                );
                // First page wins for the bare-section fallback lookup
                section_pages
                    .entry(section.id.clone())
                    .or_insert_with(|| page.id.clone());
                records.push(SectionRecord {
                    page_id: page.id.clone(),
                    definition: section.clone(),
                });
            }
            page_ranges.insert(page.id.clone(), start..records.len());
        }

        Self {
            pages,
            records,
            index,
            page_ranges,
            section_pages,
        }
    }

    /// Load from a JSON file: `{ "pages": [ { "id", "name", "sections": [...] } ] }`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        if file.pages.is_empty() {
            return Err(Error::ConfigError(format!(
                "{}: catalog has no pages",
                path.display()
            )));
        }
        Ok(Self::from_pages(file.pages))
    }

    /// Number of section records in the arena.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pages in declaration order.
    pub fn pages(&self) -> &[PageDefinition] {
        &self.pages
    }

    pub fn page(&self, page_id: &str) -> Option<&PageDefinition> {
        self.pages.iter().find(|p| p.id == page_id)
    }

    /// Arena slot for a `(page, section)` pair.
    pub fn slot(&self, page_id: &str, section_id: &str) -> Option<SectionIdx> {
        self.index
            .get(&(page_id.to_string(), section_id.to_string()))
            .copied()
    }

    pub fn record(&self, idx: SectionIdx) -> &SectionRecord {
        &self.records[idx.0]
    }

    /// All arena slots belonging to a page, in section order.
    pub fn page_slots(&self, page_id: &str) -> impl Iterator<Item = SectionIdx> + '_ {
        self.page_ranges
            .get(page_id)
            .cloned()
            .unwrap_or(0..0)
            .map(SectionIdx)
    }

    /// Owning page of a section id, for samples that arrive without a page
    /// tag. First declaring page wins when ids repeat across pages.
    pub fn page_of_section(&self, section_id: &str) -> Option<&str> {
        self.section_pages.get(section_id).map(String::as_str)
    }

    /// The built-in disclosure catalog for the financial-product kiosk.
    pub fn builtin() -> Self {
        fn section(id: &str, title: &str, required: f64, priority: Priority) -> SectionDefinition {
            SectionDefinition {
                id: id.to_string(),
                title: title.to_string(),
                required_dwell_secs: required,
                priority,
            }
        }

        Self::from_pages(vec![
            PageDefinition {
                id: "productJoin".to_string(),
                name: "Product Enrollment".to_string(),
                sections: vec![
                    section("risk-warning", "Investment Risk Disclosure", 10.0, Priority::High),
                    section("fee-info", "Fees and Charges", 8.0, Priority::High),
                    section("withdrawal-right", "Withdrawal Rights and Termination", 6.0, Priority::Normal),
                ],
            },
            PageDefinition {
                id: "productDetail".to_string(),
                name: "Product Details".to_string(),
                sections: vec![
                    section("product-overview", "Product Overview", 5.0, Priority::Normal),
                    section("investment-strategy", "Investment Strategy", 6.0, Priority::Normal),
                    section("subscription-info", "Subscription Information", 4.0, Priority::Normal),
                ],
            },
            PageDefinition {
                id: "productComparison".to_string(),
                name: "Product Comparison".to_string(),
                sections: vec![
                    section("product-comparison-table", "Comparison Table", 6.0, Priority::Normal),
                    section("risk-return-analysis", "Risk and Return Analysis", 6.0, Priority::High),
                    section("recommendation", "Suitability Recommendation", 4.0, Priority::Normal),
                ],
            },
        ])
    }
}
