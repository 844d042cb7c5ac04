use std::process::ExitCode;

use color_eyre::Result;
use tracing::info;

use memtop::{
    app::{App, Controller, Timing},
    config::Config,
    input::CrosstermEvents,
    logging, snapshot,
    terminal::{self, TerminalSession},
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // the terminal is back to normal by now
            eprintln!("memtop: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    terminal::install_hooks()?;
    let config = Config::load()?;
    let _log_guard = logging::init(&config)?;
    info!(path = ?Config::location(), ?config, "starting");
    let terminated = terminal::install_signal_handler()?;

    let app = App::new(config.start_merged, config.merge_key());
    let source = snapshot::source_for(&config);
    let mut controller = Controller::new(app, source, CrosstermEvents, Timing::from(&config))
        .with_termination(terminated);
    // an unreadable process table is reported before the screen is taken over
    controller.sample()?;

    let mut session = TerminalSession::enter()?;
    let res = controller.run(session.terminal_mut());
    drop(session);
    res
}
