use std::process::ExitCode;

use crate::app::config::AppConfig;

mod app;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    match app::init(&config) {
        Ok(app) => {
            app.run();
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
