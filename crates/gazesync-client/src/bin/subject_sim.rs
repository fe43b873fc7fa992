//! Scripted subject — walks the disclosure catalog against a live relay
//!
//! Connects as the subject role, visits every catalog page, and sweeps a
//! synthetic gaze down each section for its required dwell time. Point an
//! observer at the same relay to watch the checklist fill in.

use clap::Parser;
use gazesync_client::SubjectSession;
use gazesync_core::{system_clock, ReconnectPolicy, SectionCatalog};
use gazesync_engine::{LayoutResolver, SectionBounds};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VIEWPORT_WIDTH: f64 = 1280.0;
const BAND_HEIGHT: f64 = 240.0;

#[derive(Parser)]
#[command(name = "subject-sim", about = "Scripted gaze subject for relay testing")]
struct Cli {
    /// Relay websocket URL
    #[arg(long, default_value = "ws://127.0.0.1:9400/ws")]
    url: String,

    /// Milliseconds between gaze samples
    #[arg(long, default_value = "100")]
    sample_interval_ms: u64,

    /// Extra dwell beyond each section's requirement, as a fraction
    #[arg(long, default_value = "0.2")]
    overshoot: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subject_sim=info,gazesync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let url = url::Url::parse(&cli.url)?;
    let catalog = SectionCatalog::builtin();
    let resolver = layout_for(&catalog);

    let first_page = catalog
        .pages()
        .first()
        .map(|p| p.id.clone())
        .ok_or_else(|| anyhow::anyhow!("catalog has no pages"))?;

    let session = SubjectSession::new(
        url,
        Box::new(resolver),
        first_page,
        ReconnectPolicy::default(),
        system_clock(),
    );
    session.start();

    // Let the connection settle before the walk starts.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let sample_interval = Duration::from_millis(cli.sample_interval_ms);
    for page in catalog.pages() {
        info!(page = %page.id, "visiting page");
        session.navigate(page.id.clone());
        tokio::time::sleep(sample_interval).await;

        for (i, section) in page.sections.iter().enumerate() {
            let dwell = section.required_dwell_secs * (1.0 + cli.overshoot);
            let samples = (dwell / (cli.sample_interval_ms as f64 / 1000.0)).ceil() as u64;
            let x = VIEWPORT_WIDTH / 2.0;
            let y = i as f64 * BAND_HEIGHT + BAND_HEIGHT / 2.0;
            info!(section = %section.id, dwell_secs = dwell, samples, "sweeping section");
            for _ in 0..samples {
                session.publish_gaze(x, y);
                tokio::time::sleep(sample_interval).await;
            }
        }
    }

    info!("walk complete");
    session.shutdown();
    Ok(())
}

/// One full-width band per section, stacked in catalog order, for every
/// page in the catalog.
fn layout_for(catalog: &SectionCatalog) -> LayoutResolver {
    let mut resolver = LayoutResolver::new();
    for page in catalog.pages() {
        let bands = page
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| SectionBounds {
                id: s.id.clone(),
                x: 0.0,
                y: i as f64 * BAND_HEIGHT,
                width: VIEWPORT_WIDTH,
                height: BAND_HEIGHT,
            })
            .collect();
        resolver = resolver.with_page(page.id.clone(), bands);
    }
    resolver
}
