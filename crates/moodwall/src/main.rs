mod cli;
mod paths;
mod preview;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Palette(args)) => run::print_palette(args),
        Some(Command::Check(args)) => run::check_board(args),
        None => run::run(cli.run),
    }
}
