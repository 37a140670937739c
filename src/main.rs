use clap::Parser;
use tabnote::cli::commands::Cli;
use tabnote::cli::handlers;
use tabnote::logging;

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
