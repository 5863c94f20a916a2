pub mod algorithm;
pub mod capture;
pub mod error;
pub mod models;
pub mod reader;
pub mod telemetry;

use std::path::PathBuf;

use error::{ReaderError, Result};
use models::settings::ReaderSettings;
use reader::{replay, store};

const USAGE: &str = "usage: readpoint <trace.json> [settings.json] [--save <session.json>]";

#[derive(Debug, PartialEq)]
struct CliOptions {
    trace: PathBuf,
    settings: Option<PathBuf>,
    save: Option<PathBuf>,
}

pub fn run() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run_replay(&args) {
        log::error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run_replay(args: &[String]) -> Result<()> {
    let options = parse_args(args)?;
    let settings = match &options.settings {
        Some(path) => ReaderSettings::load(path)?,
        None => ReaderSettings::load_default()?,
    };

    let trace = replay::load_trace(&options.trace)?;
    let summary = replay::replay_trace(&trace, settings)?;
    if let Some(path) = &options.save {
        store::save_session(&summary.session, Some(path))?;
    }

    let json =
        serde_json::to_string_pretty(&summary).map_err(|e| ReaderError::json(&options.trace, e))?;
    println!("{json}");
    Ok(())
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let mut positional = Vec::new();
    let mut save = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--save" => {
                let path = iter
                    .next()
                    .ok_or_else(|| ReaderError::InvalidInput(format!("--save needs a path\n{USAGE}")))?;
                save = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => {
                return Err(ReaderError::InvalidInput(format!(
                    "unknown option {flag}\n{USAGE}"
                )));
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let trace = positional
        .next()
        .ok_or_else(|| ReaderError::InvalidInput(USAGE.to_string()))?;
    let settings = positional.next();
    if positional.next().is_some() {
        return Err(ReaderError::InvalidInput(USAGE.to_string()));
    }

    Ok(CliOptions {
        trace,
        settings,
        save,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_trace_settings_and_save() {
        let options = parse_args(&args(&["t.json", "--save", "out.json", "s.json"])).unwrap();
        assert_eq!(
            options,
            CliOptions {
                trace: PathBuf::from("t.json"),
                settings: Some(PathBuf::from("s.json")),
                save: Some(PathBuf::from("out.json")),
            }
        );
    }

    #[test]
    fn rejects_missing_trace_and_extra_arguments() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["a", "b", "c"])).is_err());
        assert!(parse_args(&args(&["a", "--save"])).is_err());
        assert!(parse_args(&args(&["a", "--verbose"])).is_err());
    }
}
