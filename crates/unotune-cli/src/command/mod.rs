use std::process;

use clap::{CommandFactory as _, Parser};

use self::train::TrainArg;

mod train;

/// Evolve Uno agent weights against a fixed baseline
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None, disable_help_flag = true)]
pub struct CommandArgs {
    /// Print help and exit
    #[arg(short, long)]
    help: bool,
    #[clap(flatten)]
    train: TrainArg,
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    if args.help {
        CommandArgs::command().print_help()?;
        process::exit(1);
    }
    train::run(&args.train)
}
