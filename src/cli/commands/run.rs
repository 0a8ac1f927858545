//! Run command - mirror the store and animate the circle

use crate::cli::args::RunArgs;
use crate::config::schema::SketchConfig;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::mirror::EnvReader;
use crate::sketch::{Frame, Sketch};
use crate::system::System;
use console::style;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> MirrorResult<()> {
    let mut config = config.clone();
    if let Some(pattern) = args.pattern {
        config.mirror.pattern = pattern;
    }
    if let Some(fps) = args.fps {
        config.sketch.fps = fps;
    }

    let system = System::start(&config).await?;

    println!(
        "Mirroring {} from {} ({} keys)",
        style(&config.mirror.pattern).cyan(),
        system.backend_name(),
        system.environment().len()
    );

    let rendered = animate(system.reader(), &config.sketch, args.frames).await;
    system.stop().await?;

    println!("{} Rendered {} frames", style("✓").green(), rendered);
    Ok(())
}

/// Tick the sketch at the configured rate until `frames` or Ctrl-C
async fn animate(reader: EnvReader, config: &SketchConfig, frames: Option<u64>) -> u64 {
    let mut sketch = Sketch::new(config.clone());
    let period = Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1)));
    let report_every = config.report_every.max(1);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stale_reported = false;

    loop {
        if frames.is_some_and(|limit| sketch.frames() >= limit) {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("Interrupted");
                println!();
                break;
            }
            _ = ticker.tick() => {
                if !stale_reported && !reader.is_live() {
                    stale_reported = true;
                    eprintln!(
                        "{} Change feed closed, showing the last mirrored values",
                        style("!").yellow()
                    );
                }
                let frame = sketch.tick(&reader);
                if frame.number % report_every == 0 {
                    print_frame(&frame);
                }
            }
        }
    }

    sketch.frames()
}

fn print_frame(frame: &Frame) {
    let line = frame.to_string();
    if frame.overridden {
        println!("{}", style(line).cyan());
    } else {
        println!("{}", line);
    }
}
