//! Dump command - print the mirrored keys once

use crate::cli::args::DumpArgs;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::system::System;
use console::style;
use std::collections::BTreeMap;

/// Execute the dump command
pub async fn execute(args: DumpArgs, config: &Config) -> MirrorResult<()> {
    let mut config = config.clone();
    if let Some(pattern) = args.pattern {
        config.mirror.pattern = pattern;
    }

    let system = System::start(&config).await?;
    let snapshot = system.environment().snapshot();
    if !system.environment().is_live() {
        eprintln!(
            "{} Change feed closed during load, values may be stale",
            style("!").yellow()
        );
    }
    let backend = system.backend_name();
    system.stop().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_table(&snapshot, &config.mirror.pattern, backend);
    }

    Ok(())
}

fn print_table(snapshot: &BTreeMap<String, String>, pattern: &str, backend: &str) {
    if snapshot.is_empty() {
        println!(
            "{} No keys matching {} in {}",
            style("!").yellow(),
            style(pattern).cyan(),
            backend
        );
        return;
    }

    let width = snapshot.keys().map(String::len).max().unwrap_or(0).max(3);
    println!(
        "{:<width$}  {}",
        style("KEY").bold(),
        style("VALUE").bold(),
        width = width
    );
    println!("{}", "-".repeat(width + 7));

    for (key, value) in snapshot {
        println!("{:<width$}  {}", key, value, width = width);
    }

    println!();
    println!("{} key(s) from {}", snapshot.len(), backend);
}
