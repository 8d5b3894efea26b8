//! msgplay CLI

use std::path::{Path, PathBuf};
use std::process;

use msgplay::recording::{load_file, RecordingPool};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("msgplay v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: msgplay <command> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  inspect <recording>   List correlation groups in match order");
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "inspect" => {
            if args.len() < 3 {
                eprintln!("Usage: msgplay inspect <recording>");
                process::exit(1);
            }

            let path = PathBuf::from(&args[2]);
            if let Err(e) = inspect(&path) {
                eprintln!("{e:#}");
                process::exit(1);
            }
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'msgplay' for usage information.");
            process::exit(1);
        }
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let messages = load_file(path)
        .with_context(|| format!("failed to load recording {}", path.display()))?;
    let pool = RecordingPool::load(messages);

    println!("Recording: {} ({} messages)", path.display(), pool.len());
    println!();
    println!("{:<28} {:<40} {:>6}", "PARENT TYPE", "ORIGINAL PARENT ID", "COUNT");

    for group in pool.groups() {
        println!(
            "{:<28} {:<40} {:>6}",
            group.key.msg_type.as_deref().unwrap_or("-"),
            group.key.msg_id.as_deref().unwrap_or("-"),
            group.count
        );
    }

    Ok(())
}
