use clap::error::ErrorKind;
use clap::Parser;

use evalwatch::{error, logging, Config};

#[tokio::main]
async fn main() {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => std::process::exit(0),
                _ => std::process::exit(1),
            }
        }
    };

    if config.no_color {
        colored::control::set_override(false);
    }
    logging::init(&config.log_level, config.log_json);

    match evalwatch::run(&config).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error::print_error(&e);
            std::process::exit(1);
        }
    }
}
