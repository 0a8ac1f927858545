//! Check command - validate key names against the env namespace

use crate::cli::args::CheckArgs;
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::is_valid_env_key;
use console::style;

/// Execute the check command
pub async fn execute(args: CheckArgs) -> MirrorResult<()> {
    let mut rejected = 0;

    for key in &args.keys {
        if is_valid_env_key(key) {
            println!("{} {}", style("✓").green(), key);
        } else {
            rejected += 1;
            println!(
                "{} {} {}",
                style("✗").red(),
                key,
                style("(not an env key)").dim()
            );
        }
    }

    if rejected > 0 {
        return Err(MirrorError::User(format!(
            "{} of {} keys would be rejected",
            rejected,
            args.keys.len()
        )));
    }

    Ok(())
}
