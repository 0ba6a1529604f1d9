use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use turnpike_prepare::cli::Cli;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(err) = cli.run() {
        error!("{err:#}");
        std::process::exit(1);
    }
}
