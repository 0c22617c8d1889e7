//! talking-t: headless talker. Speaks on schedule; reads menu commands from
//! stdin (`speak`, `minute`, `ten_minutes`, `hourly`, `quit`).

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use talking_t::avatar::LogAvatar;
use talking_t::config::Config;
use talking_t::menu::MenuAction;
use talking_t::schedule::ScheduleMode;
use talking_t::talker::TalkerCommand;

#[derive(Parser, Debug)]
#[command(name = "talking-t", about = "Speaks a phrase on a schedule")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting schedule (overrides config)
    #[arg(short, long, value_enum)]
    mode: Option<ScheduleMode>,

    /// Speak one phrase and exit
    #[arg(long)]
    speak_now: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    talking_t::init_logging(args.verbose);

    info!("talking-t starting");

    let config = Config::load(args.config.as_deref());
    let mut talker = talking_t::build_talker(&config, args.mode, None, Arc::new(LogAvatar));

    if args.speak_now {
        if let Some(handle) = talker.speak_now() {
            handle.await?;
        }
        return Ok(());
    }

    let (tx, rx) = mpsc::unbounded_channel::<TalkerCommand>();

    // Terminal stands in for the menu. A plain thread, so a pending read
    // never holds up runtime shutdown.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match MenuAction::parse_input(&line) {
                Some(action) => {
                    if tx.send(action.command()).is_err() {
                        return;
                    }
                }
                None => warn!("Unknown command: {}", line.trim()),
            }
        }
        // stdin closed (launchd, nohup): keep the schedule running
        info!("stdin closed, running on schedule only");
        loop {
            std::thread::park();
        }
    });

    talker.run(rx).await;
    info!("talking-t stopped");

    Ok(())
}
