pub mod adapters;
pub mod config;
pub mod db;
pub mod error;
pub mod jq;
pub mod pipeline;
pub mod registry;

use config::Settings;
use db::Drivers;
use error::Result;
use pipeline::{parse_lines, render, Executor};
use registry::Registry;

/// Parses `lines` into a pipeline, runs it and formats the result.
pub async fn run_query<S: AsRef<str>>(
    lines: &[S],
    registry: &Registry,
    drivers: &Drivers,
    settings: &Settings,
) -> Result<String> {
    let pipeline = parse_lines(lines, registry)?;
    let outcome = Executor::new(drivers, settings).run(pipeline).await?;
    render(&outcome, settings.debug_mode)
}

/// Accepts the `::`-separated single-argument form as well as plain lines.
pub fn split_legacy_lines(args: &[String]) -> Vec<String> {
    match args {
        [single] if single.starts_with("::") => single
            .trim_start_matches("::")
            .split("::")
            .map(str::to_string)
            .collect(),
        _ => args.to_vec(),
    }
}
