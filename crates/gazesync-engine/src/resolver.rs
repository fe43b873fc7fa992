//! Coordinate-to-Section Resolver
//!
//! Maps a screen coordinate plus the active page to a section id, or none.
//! The browser original walked the DOM (`elementFromPoint` + a
//! `[data-section]` ancestor); here the rendered layout is a set of
//! per-page bounding boxes supplied by whatever renders the disclosure.
//! A miss is a normal outcome (gaze on whitespace), not an error.

use gazesync_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Seam for the subject role: anything that can attribute a coordinate.
pub trait SectionResolver: Send + Sync {
    fn resolve(&self, page_id: &str, x: f64, y: f64) -> Option<&str>;
}

/// Axis-aligned bounds of one rendered section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBounds {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SectionBounds {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Stateless resolver over a static layout map. First enclosing section in
/// document order wins.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LayoutResolver {
    pages: HashMap<String, Vec<SectionBounds>>,
}

impl LayoutResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a layout file: `{ "<pageId>": [ { "id", "x", "y", "width", "height" } ] }`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let pages: HashMap<String, Vec<SectionBounds>> = serde_json::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        Ok(Self { pages })
    }

    pub fn with_page(mut self, page_id: impl Into<String>, sections: Vec<SectionBounds>) -> Self {
        self.pages.insert(page_id.into(), sections);
        self
    }

    /// Evenly stacked full-width bands, the shape of the kiosk's single
    /// column of section cards. Handy for simulators and tests.
    pub fn stacked(
        page_id: impl Into<String>,
        section_ids: &[&str],
        width: f64,
        band_height: f64,
    ) -> Self {
        let sections = section_ids
            .iter()
            .enumerate()
            .map(|(i, id)| SectionBounds {
                id: id.to_string(),
                x: 0.0,
                y: i as f64 * band_height,
                width,
                height: band_height,
            })
            .collect();
        Self::new().with_page(page_id, sections)
    }
}

impl SectionResolver for LayoutResolver {
    fn resolve(&self, page_id: &str, x: f64, y: f64) -> Option<&str> {
        self.pages
            .get(page_id)?
            .iter()
            .find(|b| b.contains(x, y))
            .map(|b| b.id.as_str())
    }
}
