use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = ssaictl::Cli::parse();
    ssaictl::init_tracing(cli.verbose);
    if let Err(err) = ssaictl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
