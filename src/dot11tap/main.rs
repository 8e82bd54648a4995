use std::env;
use std::io;
use std::process;

use tracing::{error, Level};

mod cli;
mod conf;
mod pipeline;
mod report;

use cli::Command;

fn init_logging(verbosity: usize) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let conf = match cli::parse_args(&args) {
        Ok(Command::Run(conf)) => conf,
        Ok(Command::Help(usage)) => {
            println!("{}", usage);
            return;
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    init_logging(conf.verbosity);

    let stdout = io::stdout();
    if let Err(e) = pipeline::run(&conf, stdout.lock()) {
        error!("{}", e);
        process::exit(1);
    }
}
