//! PulsePin host tool — sends timed-output commands to a board over serial.

mod cli;
mod commands;
mod port;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ports => commands::ports(),
        Commands::Actions => {
            commands::actions();
            Ok(())
        }
        Commands::Send { line } => {
            let mut port = commands::open_port(cli.port.as_deref(), cli.baud)?;
            commands::send(port.as_mut(), &line, cli.listen)
        }
        Commands::Action { name } => {
            let line = commands::resolve_action(&name)?;
            let mut port = commands::open_port(cli.port.as_deref(), cli.baud)?;
            commands::send(port.as_mut(), line, cli.listen)?;
            println!("Performed action: {}", name);
            Ok(())
        }
    }
}
