use ballots_recon::{
    config::{Opt, Settings},
    info_time,
    process::process_election,
    Result,
};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::{filter::Directive, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let filter = EnvFilter::from_default_env().add_directive(opt.log.parse::<Directive>()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let start_time = Local::now();
    let recon = process_election(&Settings::from(opt)).await?;
    info_time!(
        start_time,
        "Full program time, complete: {}",
        recon.is_complete()
    );

    Ok(())
}
