use anyhow::Result;
use tracing::{info, warn};

use geolake::app::App;
use geolake::config::AppConfig;
use geolake::panel::PanelState;
use geolake::telemetry;

/// Drives the full workflow once: load the base dataset, run the initial
/// queries, then build the shrine-density choropleth.
#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    telemetry::init_tracing(&config);

    let app = App::from_config(&config)?;
    app.start().await?;

    match app.count.state() {
        PanelState::Ready(total) => info!(total, "countries in base dataset"),
        state => warn!(?state, "count panel did not settle"),
    }
    if let PanelState::Ready(areas) = app.largest.state() {
        for entry in &areas {
            info!(name = %entry.name, area = entry.area, "largest country");
        }
    }

    app.build_choropleth().await;
    match app.choropleth.state() {
        PanelState::Ready(collection) => {
            info!(regions = collection.features.len(), "choropleth ready")
        }
        PanelState::NoResult => info!("choropleth produced no regions"),
        state => warn!(?state, "choropleth did not settle"),
    }

    Ok(())
}
