use std::process::ExitCode;

use clap::Parser;
use lumen_app::{App, AppArgs};

fn main() -> ExitCode {
    let args = AppArgs::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();

    lumen_graph::init();
    lumen_app::init();

    match App::new(args).run(&mut std::io::stdout().lock()) {
        Ok(summary) if summary.faulted_frames() == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            log::error!("{} frames faulted", summary.faulted_frames());
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
