mod app;
mod config;
mod error;
mod input;
mod output;
mod report;

use app::JoyTestApp;
use clap::Parser;
use config::{Args, RunConfig, Settings};
use input::keyboard::KeyboardReader;
use input::GilrsSession;
use output::Output;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = RunConfig::new(Settings::load(), args);
    log::debug!("Running with {:?}", config);

    let session = GilrsSession::new()?;
    let key_sender = session.sender();
    let mut app = JoyTestApp::new(session, &config)?;

    let mut output = Output::new(config.log_file.as_deref())?;

    log::info!("Press Escape to quit");
    let keyboard = match KeyboardReader::start(key_sender) {
        Ok(keyboard) => {
            output.set_raw_console(true);
            Some(keyboard)
        }
        Err(e) => {
            log::warn!("Keyboard unavailable, Escape will not quit: {}", e);
            None
        }
    };

    let result = app.run(&mut output);

    drop(keyboard);
    output.close()?;
    Ok(result?)
}
