//! Engagement Accumulator — the central state machine
//!
//! Consumes the ordered-but-gappy event stream an observer receives from the
//! relay and integrates it into one `SessionState`: per-section dwell time,
//! latched viewed/completed flags, and synchronously recomputed page
//! progress. Dwell is monotone for the life of the state; a reconnect only
//! changes `connection_status`, never accumulated dwell.
//!
//! Section records live in a fixed arena preallocated from the catalog and
//! indexed by `(page, section)`. Records start uninstantiated and flip on
//! first reference, so the observer still sees sections "appear" the way the
//! lazy-map original behaved, without per-event map churn.

use gazesync_core::{
    ClientCountData, ConnectionStatus, Envelope, ErrorData, GazeData, MonitorConfig,
    PageChangeData, Priority, SectionCatalog, SectionIdx, SharedClock,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dwell record for one catalog section.
#[derive(Debug, Clone, Default)]
pub struct SectionState {
    /// Number of samples credited. `dwell_secs` is derived from this.
    pub sample_count: u64,
    pub dwell_secs: f64,
    /// Producer-side timestamp of the last contributing sample (epoch ms).
    pub last_sample_at: Option<i64>,
    pub viewed: bool,
    /// Whether any event has referenced this section's page yet.
    pub instantiated: bool,
}

/// Observer-side session state. One instance per monitor view; survives
/// transport reconnects and is discarded with the view.
#[derive(Debug)]
pub struct SessionState {
    sections: Vec<SectionState>,
    page_progress: HashMap<String, f64>,
    pub current_page: Option<String>,
    /// Producer timestamp of the last explicit page change. A gaze sample's
    /// page tag only overrides `current_page` when strictly newer, so a
    /// reordered stale sample cannot undo a navigation.
    page_authority_at: i64,
    pub last_active_section: Option<String>,
    /// Local receive time of the last relay event (epoch ms).
    pub last_event_at: i64,
    pub connection_status: ConnectionStatus,
    pub subject_active: bool,
}

/// The state machine driving a `SessionState` from gaze and page events.
pub struct Accumulator {
    catalog: Arc<SectionCatalog>,
    config: MonitorConfig,
    clock: SharedClock,
    state: SessionState,
}

impl Accumulator {
    pub fn new(catalog: Arc<SectionCatalog>, config: MonitorConfig, clock: SharedClock) -> Self {
        let now = clock.now_ms();
        let state = SessionState {
            sections: vec![SectionState::default(); catalog.len()],
            page_progress: HashMap::new(),
            current_page: None,
            page_authority_at: 0,
            last_active_section: None,
            last_event_at: now,
            connection_status: ConnectionStatus::Connecting,
            subject_active: true,
        };
        Self {
            catalog,
            config,
            clock,
            state,
        }
    }

    pub fn catalog(&self) -> &Arc<SectionCatalog> {
        &self.catalog
    }

    /// Apply one inbound envelope. Events are processed to completion in
    /// arrival order, which is what makes a page change authoritative over a
    /// stale-tagged sample received in the same tick window.
    pub fn apply(&mut self, envelope: &Envelope) {
        match envelope {
            Envelope::GazeData(data) => self.handle_gaze(data),
            Envelope::PageChange(data) => self.handle_page_change(data),
            Envelope::ClientCount(data) => self.note_client_count(data),
            Envelope::Error(data) => self.note_relay_error(data),
        }
    }

    /// Explicit navigation: authoritative for `current_page`, and the page's
    /// full section checklist is instantiated at zero dwell immediately so
    /// the observer sees it before any gaze sample arrives.
    pub fn handle_page_change(&mut self, data: &PageChangeData) {
        self.touch();

        if self.catalog.page(&data.current_page).is_none() {
            warn!(page = %data.current_page, "page change references unknown page, dropped");
            return;
        }
        self.instantiate_page(&data.current_page);
        self.state.current_page = Some(data.current_page.clone());
        self.state.page_authority_at = data.timestamp;
        debug!(page = %data.current_page, "page change");
    }

    /// One gaze sample. A null section is a resolver miss: normal, recency
    /// bookkeeping only. A tagged section earns one fixed dwell increment on
    /// the page attributed as `sample.currentPage`, else the session's
    /// current page, else the section's owning page in the catalog. Samples
    /// for a non-current page keep accumulating across a navigation.
    pub fn handle_gaze(&mut self, data: &GazeData) {
        self.touch();

        // Page tag on a sample is the fallback page signal; an explicit page
        // change with an equal or later timestamp stays authoritative
        if let Some(tag) = &data.current_page {
            if self.catalog.page(tag).is_some() {
                if data.timestamp > self.state.page_authority_at
                    && self.state.current_page.as_deref() != Some(tag)
                {
                    self.instantiate_page(tag);
                    self.state.current_page = Some(tag.clone());
                }
            } else {
                warn!(page = %tag, "gaze sample references unknown page");
            }
        }

        let Some(section_id) = &data.section_id else {
            return;
        };

        let Some(page_id) = data
            .current_page
            .clone()
            .or_else(|| self.state.current_page.clone())
            .or_else(|| self.catalog.page_of_section(section_id).map(str::to_string))
        else {
            warn!(section = %section_id, "gaze sample with no attributable page, dropped");
            return;
        };

        let Some(idx) = self.catalog.slot(&page_id, section_id) else {
            warn!(page = %page_id, section = %section_id, "unknown section reference, dropped");
            return;
        };

        self.instantiate_page(&page_id);

        let section = &mut self.state.sections[idx.0];
        // Dwell derives from the count: repeated `+= 0.1` drifts below
        // exact multiples of the requirement
        section.sample_count += 1;
        section.dwell_secs = section.sample_count as f64 * self.config.sample_interval_secs;
        section.last_sample_at = Some(data.timestamp);
        section.viewed = true;
        self.state.last_active_section = Some(section_id.clone());

        self.recompute_page_progress(&page_id);
    }

    /// Peer count is informational: observed, logged, recency only.
    fn note_client_count(&mut self, data: &ClientCountData) {
        self.touch();
        debug!(count = data.count, "relay client count");
    }

    fn note_relay_error(&mut self, data: &ErrorData) {
        self.touch();
        warn!(message = %data.message, "relay error");
    }

    /// Transport connect/disconnect callbacks land here. Connection status
    /// is independent of subject liveness.
    pub fn set_connection_status(&mut self, status: ConnectionStatus) {
        self.state.connection_status = status;
    }

    fn touch(&mut self) {
        self.state.last_event_at = self.clock.now_ms();
        self.state.subject_active = true;
    }

    /// Flip every section of a page to instantiated. Idempotent; dwell
    /// already sits at zero for untouched records.
    fn instantiate_page(&mut self, page_id: &str) {
        let mut newly = false;
        let slots: Vec<SectionIdx> = self.catalog.page_slots(page_id).collect();
        for idx in slots {
            let section = &mut self.state.sections[idx.0];
            if !section.instantiated {
                section.instantiated = true;
                newly = true;
            }
        }
        if newly {
            debug!(page = %page_id, "page sections instantiated");
            self.recompute_page_progress(page_id);
        }
    }

    /// Synchronous aggregation: mean of the page's instantiated sections'
    /// clamped progress, 0 when none are instantiated.
    fn recompute_page_progress(&mut self, page_id: &str) {
        let mut total = 0.0;
        let mut count = 0usize;
        for idx in self.catalog.page_slots(page_id) {
            let section = &self.state.sections[idx.0];
            if !section.instantiated {
                continue;
            }
            total += clamped_progress(section.dwell_secs, self.required(idx));
            count += 1;
        }
        let progress = if count == 0 { 0.0 } else { total / count as f64 };
        self.state.page_progress.insert(page_id.to_string(), progress);
    }

    fn required(&self, idx: SectionIdx) -> f64 {
        self.catalog.record(idx).definition.required_dwell_secs
    }

    // -- read side ----------------------------------------------------------

    pub fn current_page(&self) -> Option<&str> {
        self.state.current_page.as_deref()
    }

    pub fn last_active_section(&self) -> Option<&str> {
        self.state.last_active_section.as_deref()
    }

    pub fn last_event_at(&self) -> i64 {
        self.state.last_event_at
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.connection_status
    }

    pub fn subject_active(&self) -> bool {
        self.state.subject_active
    }

    pub fn set_subject_active(&mut self, active: bool) {
        self.state.subject_active = active;
    }

    /// Observer overlay condition: disconnection always surfaces, even when
    /// the last known activity was recent.
    pub fn needs_attention(&self) -> bool {
        self.state.connection_status == ConnectionStatus::Disconnected || !self.state.subject_active
    }

    /// Dwell record for an instantiated section, `None` otherwise.
    pub fn section_state(&self, page_id: &str, section_id: &str) -> Option<&SectionState> {
        let idx = self.catalog.slot(page_id, section_id)?;
        let section = &self.state.sections[idx.0];
        section.instantiated.then_some(section)
    }

    pub fn section_progress(&self, page_id: &str, section_id: &str) -> Option<f64> {
        let idx = self.catalog.slot(page_id, section_id)?;
        let section = &self.state.sections[idx.0];
        section
            .instantiated
            .then(|| clamped_progress(section.dwell_secs, self.required(idx)))
    }

    pub fn section_completed(&self, page_id: &str, section_id: &str) -> Option<bool> {
        let idx = self.catalog.slot(page_id, section_id)?;
        let section = &self.state.sections[idx.0];
        section
            .instantiated
            .then(|| section.dwell_secs >= self.required(idx))
    }

    /// Cached page progress in [0, 100]; 0 for a page nothing has touched.
    pub fn page_progress(&self, page_id: &str) -> f64 {
        self.state.page_progress.get(page_id).copied().unwrap_or(0.0)
    }

    /// Display-ready view of every instantiated page.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut pages = Vec::new();
        for page in self.catalog.pages() {
            let sections: Vec<SectionSnapshot> = self
                .catalog
                .page_slots(&page.id)
                .filter_map(|idx| {
                    let section = &self.state.sections[idx.0];
                    if !section.instantiated {
                        return None;
                    }
                    let def = &self.catalog.record(idx).definition;
                    Some(SectionSnapshot {
                        id: def.id.clone(),
                        title: def.title.clone(),
                        priority: def.priority,
                        dwell_secs: section.dwell_secs,
                        required_dwell_secs: def.required_dwell_secs,
                        progress: clamped_progress(section.dwell_secs, def.required_dwell_secs),
                        completed: section.dwell_secs >= def.required_dwell_secs,
                        viewed: section.viewed,
                    })
                })
                .collect();
            if sections.is_empty() {
                continue;
            }
            pages.push(PageSnapshot {
                id: page.id.clone(),
                name: page.name.clone(),
                progress: self.page_progress(&page.id),
                sections,
            });
        }

        SessionSnapshot {
            current_page: self.state.current_page.clone(),
            connection_status: self.state.connection_status,
            subject_active: self.state.subject_active,
            needs_attention: self.needs_attention(),
            last_active_section: self.state.last_active_section.clone(),
            pages,
        }
    }
}

fn clamped_progress(dwell: f64, required: f64) -> f64 {
    if required <= 0.0 {
        return 100.0;
    }
    (dwell / required).min(1.0) * 100.0
}

/// Point-in-time view for the observer display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub current_page: Option<String>,
    pub connection_status: ConnectionStatus,
    pub subject_active: bool,
    pub needs_attention: bool,
    pub last_active_section: Option<String>,
    pub pages: Vec<PageSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub id: String,
    pub name: String,
    pub progress: f64,
    pub sections: Vec<SectionSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSnapshot {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub dwell_secs: f64,
    pub required_dwell_secs: f64,
    pub progress: f64,
    pub completed: bool,
    pub viewed: bool,
}
