//! Observer role — monitor view of the subject's reading progress
//!
//! Wires transport callbacks into the Engagement Accumulator and drives the
//! liveness tick. Single-writer discipline: transport callbacks and the
//! tick both mutate the session through one mutex, which is the
//! serialization a multi-threaded host needs around the accumulator.

use crate::sync::lock;
use crate::transport::SessionTransport;
use gazesync_core::{
    ConnectionStatus, Envelope, MonitorConfig, SectionCatalog, SharedClock,
};
use gazesync_engine::{Accumulator, LivenessMonitor, SessionSnapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct ObserverSession {
    transport: SessionTransport,
    accumulator: Arc<Mutex<Accumulator>>,
    monitor: Arc<LivenessMonitor>,
    tick_period: Duration,
    cancel: CancellationToken,
}

impl ObserverSession {
    pub fn new(
        url: url::Url,
        catalog: Arc<SectionCatalog>,
        config: MonitorConfig,
        clock: SharedClock,
    ) -> Self {
        let transport = SessionTransport::new(url, config.reconnect.clone());
        let accumulator = Arc::new(Mutex::new(Accumulator::new(
            catalog,
            config.clone(),
            clock.clone(),
        )));
        let monitor = Arc::new(LivenessMonitor::new(&config, clock));
        Self {
            transport,
            accumulator,
            monitor,
            tick_period: config.liveness_tick(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register callbacks, open the channel, start the liveness tick.
    pub fn start(&self) {
        let acc = self.accumulator.clone();
        self.transport.on_connect(move || {
            lock(&acc).set_connection_status(ConnectionStatus::Connected);
        });

        let acc = self.accumulator.clone();
        self.transport.on_disconnect(move || {
            lock(&acc).set_connection_status(ConnectionStatus::Disconnected);
        });

        self.transport.on_error(move |message| {
            warn!(message = %message, "transport error");
        });

        let acc = self.accumulator.clone();
        self.transport.on_gaze(move |data| {
            lock(&acc).handle_gaze(&data);
        });

        let acc = self.accumulator.clone();
        self.transport.on_page_change(move |data| {
            lock(&acc).handle_page_change(&data);
        });

        let acc = self.accumulator.clone();
        self.transport.on_client_count(move |data| {
            lock(&acc).apply(&Envelope::ClientCount(data));
        });

        let acc = self.accumulator.clone();
        self.transport.on_relay_error(move |message| {
            lock(&acc).apply(&Envelope::error(message));
        });

        self.transport.connect();
        self.spawn_liveness_tick();
    }

    fn spawn_liveness_tick(&self) {
        let acc = self.accumulator.clone();
        let monitor = self.monitor.clone();
        let cancel = self.cancel.clone();
        let period = self.tick_period;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        monitor.evaluate(&mut lock(&acc));
                    }
                }
            }
        });
    }

    /// Display-ready view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.accumulator).snapshot()
    }

    /// Attention overlay condition: disconnected OR subject inactive.
    pub fn needs_attention(&self) -> bool {
        lock(&self.accumulator).needs_attention()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// User-triggered reconnect, e.g. the overlay's reconnect button. Also
    /// the only way to resume after the automatic retry budget runs out.
    pub fn reconnect(&self) {
        self.transport.connect();
    }

    /// Direct handle for hosts that render from the accumulator.
    pub fn accumulator(&self) -> Arc<Mutex<Accumulator>> {
        self.accumulator.clone()
    }

    /// Teardown: close the transport and stop the liveness tick. No timer
    /// or callback fires afterward.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.transport.disconnect();
    }
}
