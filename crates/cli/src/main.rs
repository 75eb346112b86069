// CLI modules
mod cli;
mod logging;
mod state;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Add, Cat, Dag, GetJson, Init, Pinned, Resolve, Rm};

command_enum! {
    (Init, Init),
    (Resolve, Resolve),
    (Add, Add),
    (Cat, Cat),
    (GetJson, GetJson),
    (Dag, Dag),
    (Rm, Rm),
    (Pinned, Pinned),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // A missing or broken config is reported by the command that needs it
    let log_dir = state::AppState::load(args.config.clone())
        .ok()
        .and_then(|state| state.config.log_dir);
    let guards = logging::init_logging(args.log_level, log_dir.as_deref());

    let ctx = cli::op::OpContext::new(args.config);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(guards);
            std::process::exit(1);
        }
    }
}
