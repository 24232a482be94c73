pub(crate) mod cli;
pub(crate) mod core;
pub(crate) mod dashboard;
pub(crate) mod models;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::dashboard::Dashboard;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = cli::parse_args(std::env::args().skip(1))?;
    if command == cli::Command::Help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let state = AppState::new(settings)?;
    tracing::info!(
        backend = %state.client().base_url(),
        environment = %state.settings().runtime().environment.as_str(),
        "Pedagogical Radar client ready"
    );

    let dashboard = Dashboard::new(state);
    dashboard.start().await;

    cli::execute(&dashboard, command).await
}
