// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod capture;
mod classify;
mod config;
mod error;
mod mail;
mod station;
mod storm;
mod upload;
mod weather;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use config::StationConfig;
use error::{Result, StationError};
use mail::{test_notification, SmtpNotifier};
use storm::Notifier;
use station::{timestamp_now, CycleOutcome, Station};

#[derive(Parser, Debug)]
#[command(name = "rainradar-station", version, about)]
struct Cli {
    /// JSON configuration file (defaults to the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Station directory holding jpg/, json/ and cache/
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture, archive, record weather, embed the radar panel and upload.
    Run,
    /// Only render the radar panel into the background image.
    Radar,
    /// Fetch and classify current weather, print it as JSON.
    Weather,
    /// Send a test mail through the storm warning SMTP settings.
    StormTestMail,
    /// Print the location of the per-user configuration file.
    ConfigPath,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    if matches!(cli.cmd, Command::ConfigPath) {
        println!("{}", StationConfig::get_config_path()?.display());
        return Ok(());
    }

    let config = StationConfig::load(cli.config.as_deref())?;
    let layout = config.layout(cli.base_dir.as_deref())?;
    let station = Station::new(&config, layout);
    info!("Station directory {}", station.layout().base.display());

    match cli.cmd {
        Command::Run => match station.run()? {
            CycleOutcome::Skipped => info!("Cycle skipped"),
            CycleOutcome::Completed {
                archived,
                record,
                radar,
                uploaded,
            } => info!(
                "Cycle complete for {} (record {}, radar {}, uploaded: {})",
                archived.display(),
                record.display(),
                radar.map_or("failed", |g| g.source),
                uploaded
            ),
        },
        Command::Radar => {
            let generated = station.radar()?;
            info!(
                "Radar panel {}x{} ({}, epoch {:?})",
                generated.panel_size.0, generated.panel_size.1, generated.source, generated.epoch
            );
        }
        Command::Weather => {
            let client = station.weather_client()?;
            let record = station.observe(&client, &timestamp_now());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::StormTestMail => {
            let mail = config.storm.mail.clone().ok_or_else(|| {
                StationError::Config("storm.mail is not configured".to_string())
            })?;
            let to = mail.to.clone();
            SmtpNotifier::new(mail).notify(&test_notification())?;
            info!("Test mail sent to {}", to);
        }
        Command::ConfigPath => {}
    }

    Ok(())
}
