//! Command line front end for the pattern queue

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pattern_model::validate;
use pattern_queue::{AddChangeRequest, ChangeStatus, PatternConfig, PatternService};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("pattern-queue")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect the live pattern file and apply delayed changes")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Pattern file (overrides the configuration)"),
        )
        .subcommand(
            Command::new("show")
                .about("Print the current pattern")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the parsed document as JSON"),
                ),
        )
        .subcommand(Command::new("validate").about("Parse and validate the pattern file"))
        .subcommand(Command::new("info").about("Print an analysis of the current pattern"))
        .subcommand(
            Command::new("replace")
                .about("Schedule a find/replace change and wait for it to run")
                .arg(
                    Arg::new("find")
                        .long("find")
                        .required(true)
                        .help("Literal text to look for"),
                )
                .arg(
                    Arg::new("replace")
                        .long("replace")
                        .required(true)
                        .help("Replacement for the first occurrence"),
                )
                .arg(
                    Arg::new("delay")
                        .long("delay")
                        .default_value("0")
                        .value_parser(value_parser!(f64))
                        .help("Seconds to wait before applying"),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .help("What the change does (5-200 characters)"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<PatternConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PatternConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PatternConfig::default(),
    };
    if let Some(pattern) = matches.get_one::<PathBuf>("pattern") {
        config = config.with_pattern_path(pattern);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let service = PatternService::new(config);

    match matches.subcommand() {
        Some(("show", args)) => {
            if args.get_flag("json") {
                let doc = service.current()?;
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print!("{}", service.store().read_raw()?);
            }
        }
        Some(("validate", _)) => {
            let doc = service.current()?;
            let violations = validate(&doc);
            if violations.is_empty() {
                println!("{}: valid", service.store().path().display());
            } else {
                for v in &violations {
                    println!("{v}");
                }
                bail!("{} violation(s)", violations.len());
            }
        }
        Some(("info", _)) => {
            let summary = service.summary()?;
            let header = service.header()?;
            let out = serde_json::json!({
                "path": service.store().path(),
                "header": header,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Some(("replace", args)) => {
            let find = args.get_one::<String>("find").cloned().unwrap_or_default();
            let replace = args.get_one::<String>("replace").cloned().unwrap_or_default();
            let delay = args.get_one::<f64>("delay").copied().unwrap_or_default();
            let mut request = AddChangeRequest::new(find, replace).with_delay(delay);
            if let Some(description) = args.get_one::<String>("description") {
                request = request.with_description(description);
            }

            let response = service.schedule(&request)?;
            let scheduler = service.start();

            let limit = Duration::from_secs_f64(delay)
                + service.config().fallback_timeout()
                + Duration::from_secs(5);
            let record = service.wait_for(response.id, limit).await;
            scheduler.shutdown().await;

            let Some(record) = record else {
                bail!("change {} did not finish in time", response.id);
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            if record.status != ChangeStatus::Executed {
                bail!("change {} {}", record.id, record.status);
            }
        }
        _ => {}
    }

    Ok(())
}
