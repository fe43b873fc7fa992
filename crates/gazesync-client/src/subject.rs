//! Subject role — the disclosure-reading side of the session
//!
//! Attributes raw gaze coordinates to sections through the injected
//! resolver and publishes `gazeData`/`pageChange` envelopes. The gaze
//! producer itself (camera, prediction model, calibration) is an external
//! collaborator that just calls [`SubjectSession::publish_gaze`] per sample.

use crate::sync::lock;
use crate::transport::SessionTransport;
use gazesync_core::{Envelope, ReconnectPolicy, SharedClock};
use gazesync_engine::SectionResolver;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct SubjectSession {
    transport: SessionTransport,
    resolver: Box<dyn SectionResolver>,
    clock: SharedClock,
    current_page: Arc<Mutex<String>>,
}

impl SubjectSession {
    pub fn new(
        url: url::Url,
        resolver: Box<dyn SectionResolver>,
        initial_page: impl Into<String>,
        policy: ReconnectPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            transport: SessionTransport::new(url, policy),
            resolver,
            clock,
            current_page: Arc::new(Mutex::new(initial_page.into())),
        }
    }

    /// Open the channel. Every (re)connect announces the current page so an
    /// observer that joined or reconnected mid-session starts from the
    /// right checklist.
    pub fn start(&self) {
        let transport = self.transport.clone();
        let current_page = self.current_page.clone();
        let clock = self.clock.clone();
        self.transport.on_connect(move || {
            let page = lock(&current_page).clone();
            transport.send(&Envelope::page_change(page, clock.now_ms()));
        });
        self.transport.connect();
    }

    /// Navigate to a page and announce it.
    pub fn navigate(&self, page_id: impl Into<String>) {
        let page_id = page_id.into();
        *lock(&self.current_page) = page_id.clone();
        debug!(page = %page_id, "navigating");
        self.transport
            .send(&Envelope::page_change(page_id, self.clock.now_ms()));
    }

    /// Publish one raw gaze sample. A coordinate that resolves to no
    /// section still goes out (tagged null) so the observer sees the
    /// subject as present even while gazing at whitespace.
    pub fn publish_gaze(&self, x: f64, y: f64) {
        let page = lock(&self.current_page).clone();
        let section = self.resolver.resolve(&page, x, y).map(str::to_string);
        self.transport.send(&Envelope::gaze(
            x,
            y,
            self.clock.now_ms(),
            section,
            Some(page),
        ));
    }

    pub fn current_page(&self) -> String {
        lock(&self.current_page).clone()
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    pub fn shutdown(&self) {
        self.transport.disconnect();
    }
}
