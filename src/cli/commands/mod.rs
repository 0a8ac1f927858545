//! CLI command implementations

pub mod check;
pub mod config;
pub mod dump;
pub mod run;

pub use check::execute as check;
pub use config::execute as config;
pub use dump::execute as dump;
pub use run::execute as run;
