use clap::Parser;
use log::error;
use tcproxy_local::config::Cli;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = tcproxy_local::run(cli).await {
        error!("{e}");
        std::process::exit(1);
    }
}
