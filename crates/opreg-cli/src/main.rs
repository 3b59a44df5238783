//! The `opreg` binary: a thin `clap` front end over the library crates,
//! following the split `flowctl`/`migrate` draw between argument parsing
//! (this crate) and the work itself (`opreg-loader`, `opreg-store`,
//! `opreg-service`).

mod build;
mod migrate;
mod serve;

use clap::Parser;

#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Parse a directory of operator bundle manifests and load it into a store.
    Build(build::BuildArgs),
    /// Apply or revert the store's schema migrations.
    Migrate(migrate::MigrateArgs),
    /// Run the catalog's read-only gRPC API against a built store.
    Serve(serve::ServeArgs),
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        match cli.command {
            Command::Build(args) => build::run(args).await,
            Command::Migrate(args) => migrate::run(args).await,
            Command::Serve(args) => serve::run(args).await,
        }
    })
}
