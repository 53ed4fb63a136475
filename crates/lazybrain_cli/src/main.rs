//! CLI entry point.
//!
//! # Responsibility
//! - Exercise the capture pipeline and reports against a local
//!   database, independently of any chat transport.
//! - Keep output deterministic for quick local sanity checks.

use chrono::Utc;
use lazybrain_core::classify::openai::{OpenAiClassifier, OpenAiConfig};
use lazybrain_core::db::open_db;
use lazybrain_core::repo::settings_repo;
use lazybrain_core::{
    generate_report, init_logging, CapturePipeline, CoreConfig, ReportKind,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const DEFAULT_USER_ID: i64 = 1;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let config = CoreConfig::from_env();
    config.validate()?;

    let db_path = std::env::var("LAZYBRAIN_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("lazybrain.db"));
    // Logging init wants an absolute directory.
    let log_dir = match std::env::var("LAZYBRAIN_LOG_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir()
            .map_err(|err| err.to_string())?
            .join("logs"),
    };
    init_logging("info", &log_dir.to_string_lossy())?;

    let mut conn = open_db(&db_path).map_err(|err| err.to_string())?;

    let [command, rest @ ..] = args else {
        return Err(usage());
    };

    match (command.as_str(), rest) {
        ("capture", [text]) => {
            let pipeline = build_pipeline(config)?;
            let result = pipeline
                .handle_inbound(&mut conn, DEFAULT_USER_ID, text, "cli")
                .map_err(|err| err.to_string())?;
            println!("{result:#?}");
            Ok(())
        }
        ("action", [token]) => {
            let pipeline = build_pipeline(config)?;
            let result = pipeline
                .handle_button_action(&mut conn, DEFAULT_USER_ID, token)
                .map_err(|err| err.to_string())?;
            println!("{result:#?}");
            Ok(())
        }
        ("report", [kind]) => {
            let kind = match kind.as_str() {
                "morning" => ReportKind::Morning,
                "evening" => ReportKind::Evening,
                "weekly" => ReportKind::Weekly,
                other => return Err(format!("unknown report kind `{other}`")),
            };
            let today = Utc::now().date_naive();
            let report = generate_report(&conn, DEFAULT_USER_ID, kind, today)
                .map_err(|err| err.to_string())?;
            println!("{report:#?}");
            Ok(())
        }
        ("setting", [key]) => {
            let value = settings_repo::get(&conn, DEFAULT_USER_ID, key)
                .map_err(|err| err.to_string())?;
            match value {
                Some(value) => println!("{key}={value}"),
                None => println!("{key} is unset"),
            }
            Ok(())
        }
        ("setting", [key, value]) => {
            settings_repo::set(&conn, DEFAULT_USER_ID, key, value)
                .map_err(|err| err.to_string())?;
            println!("{key}={value}");
            Ok(())
        }
        ("version", []) => {
            println!("lazybrain_core version={}", lazybrain_core::core_version());
            Ok(())
        }
        _ => Err(usage()),
    }
}

fn build_pipeline(config: CoreConfig) -> Result<CapturePipeline<OpenAiClassifier>, String> {
    let timeout = Duration::from_secs(config.classifier_timeout_secs);
    let classifier = OpenAiClassifier::new(OpenAiConfig::from_env(timeout)?);
    Ok(CapturePipeline::new(config, classifier))
}

fn usage() -> String {
    "usage: lazybrain_cli <capture TEXT | action TOKEN | report morning|evening|weekly | setting KEY [VALUE] | version>"
        .to_string()
}
