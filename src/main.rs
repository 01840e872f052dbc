use clap::Parser;
use fip_hunter::cli::Cli;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;

const LOG_CONFIG: &str = "log4rs.yml";

/// Console-only logging when no log4rs.yml is present.
fn init_default_logging() -> Result<(), Box<dyn Error>> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l:5})} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    if std::path::Path::new(LOG_CONFIG).exists() {
        log4rs::init_file(LOG_CONFIG, Default::default())?;
    } else {
        init_default_logging()?;
    }
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    log::debug!("#Start main() {:?}", cli.command());

    if let Err(e) = fip_hunter::run(cli).await {
        log::error!("{e}");
        return Err(e.into());
    }
    Ok(())
}
