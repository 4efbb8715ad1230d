use clap::Parser;
use stellarforge::cli::{handle_edit, handle_init, handle_list, handle_show, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            backend,
            debounce_ms,
        } => handle_init(backend, debounce_ms),
        Commands::Show { world, json } => handle_show(world, json),
        Commands::Edit {
            world,
            actor,
            replace,
            json,
        } => handle_edit(world, actor, replace, json),
        Commands::List { json } => handle_list(json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
