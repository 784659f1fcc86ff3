//! `hitl`: list, inspect and export HITL review packets

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use hitl_packet::{
    flatten_packet, inspect_packet, write_csv, ArtifactFormat, DiscoveryConfig, PacketDirectory,
    PacketSession, SessionListing, Verdict,
};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "hitl=info,hitl_packet=info";

/// Exit code for a missing session or rejected packet
const EXIT_REJECTED: u8 = 2;

fn cli() -> Command {
    Command::new("hitl")
        .version(hitl_packet::VERSION)
        .about("Inspect human-in-the-loop review packets")
        .subcommand_required(true)
        .arg(
            Arg::new("dir")
                .long("dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Packet directory (overrides HITL_PACKET_DIR)"),
        )
        .subcommand(
            Command::new("list")
                .about("List packet sessions, newest first")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show a packet with its validation result")
                .arg(Arg::new("session").required(true).help("Session identifier"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a packet (exit 0 clean, 1 suspect, 2 rejected)")
                .arg(
                    Arg::new("session")
                        .required_unless_present("file")
                        .conflicts_with("file")
                        .help("Session identifier"),
                )
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .help("Validate a packet file directly"),
                ),
        )
        .subcommand(
            Command::new("flatten")
                .about("Export flattened records as CSV")
                .arg(Arg::new("session").required(true).help("Session identifier"))
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write to file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("artifact")
                .about("Print an engine-written artifact")
                .arg(Arg::new("session").required(true).help("Session identifier"))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .required(true)
                        .value_parser(["csv", "md", "markdown"])
                        .help("Artifact format"),
                ),
        )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let matches = cli().get_matches();

    match run(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_REJECTED)
        }
    }
}

fn directory(matches: &ArgMatches) -> PacketDirectory {
    let config = match matches.get_one::<PathBuf>("dir") {
        Some(dir) => DiscoveryConfig::default().with_packet_dir(dir),
        None => DiscoveryConfig::from_env(),
    };
    PacketDirectory::new(config)
}

fn session_arg(args: &ArgMatches) -> Result<&str> {
    args.get_one::<String>("session")
        .map(String::as_str)
        .context("missing session identifier")
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let packets = directory(matches);
    let mut out = io::stdout().lock();

    match matches.subcommand() {
        Some(("list", args)) => {
            list(&packets, args.get_flag("json"), &mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("show", args)) => {
            let verdict = show(&packets, session_arg(args)?, args.get_flag("json"), &mut out)?;
            if verdict == Verdict::Rejected {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("validate", args)) => {
            let raw = match args.get_one::<PathBuf>("file") {
                Some(path) => read_packet_file(path)?,
                None => load(&packets, session_arg(args)?)?,
            };
            let verdict = validate(&raw, &mut out)?;
            Ok(ExitCode::from(exit_code(verdict)))
        }
        Some(("flatten", args)) => {
            let raw = load(&packets, session_arg(args)?)?;
            let rows = flatten_packet(&raw);
            match args.get_one::<PathBuf>("out") {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("cannot create {}", path.display()))?;
                    write_csv(&rows, BufWriter::new(file))?;
                    tracing::info!(rows = rows.len(), path = %path.display(), "wrote csv");
                }
                None => write_csv(&rows, &mut out)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(("artifact", args)) => {
            let session = session_arg(args)?;
            let format = args
                .get_one::<String>("format")
                .and_then(|f| ArtifactFormat::parse(f))
                .context("unknown artifact format")?;
            let Some(text) = packets.read_artifact(session, format) else {
                bail!("no {format} artifact for session {session}");
            };
            out.write_all(text.as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
        _ => unreachable!("subcommand_required"),
    }
}

fn load(packets: &PacketDirectory, session: &str) -> Result<Value> {
    packets
        .load_packet(session)
        .with_context(|| format!("session not found: {session}"))
}

fn read_packet_file(path: &Path) -> Result<Value> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))
}

fn exit_code(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Clean => 0,
        Verdict::Suspect => 1,
        Verdict::Rejected => EXIT_REJECTED,
    }
}

fn list(packets: &PacketDirectory, json: bool, out: &mut impl Write) -> Result<()> {
    let sessions = packets.discover();
    if json {
        let listing = SessionListing::from_sessions(&sessions);
        serde_json::to_writer_pretty(&mut *out, &listing)?;
        writeln!(out)?;
        return Ok(());
    }

    if sessions.is_empty() {
        writeln!(out, "No packets found in {}", packets.config().packet_dir().display())?;
        return Ok(());
    }
    writeln!(out, "{:<40} {:<20} {:>7}  ARTIFACTS", "SESSION", "MODIFIED", "RECORDS")?;
    for session in &sessions {
        writeln!(out, "{}", listing_line(session))?;
    }
    Ok(())
}

fn listing_line(session: &PacketSession) -> String {
    let records = session
        .metadata
        .as_ref()
        .map_or_else(|| "-".to_string(), |m| m.record_count.to_string());
    let artifacts: Vec<&str> = [
        session.csv_path.as_ref().map(|_| "csv"),
        session.md_path.as_ref().map(|_| "md"),
    ]
    .into_iter()
    .flatten()
    .collect();
    format!(
        "{:<40} {:<20} {:>7}  {}",
        session.session_id,
        session.modified_at.format("%Y-%m-%d %H:%M:%S"),
        records,
        artifacts.join(",")
    )
}

fn show(
    packets: &PacketDirectory,
    session: &str,
    json: bool,
    out: &mut impl Write,
) -> Result<Verdict> {
    let Some(detail) = packets.load_detail(session) else {
        bail!("session not found: {session}");
    };

    // schema-invalid packets are never rendered
    let review = inspect_packet(&detail.packet);
    let verdict = review.verdict();
    if verdict == Verdict::Rejected {
        if json {
            let rejection = serde_json::json!({
                "verdict": verdict,
                "schemaIssues": review.schema_issues,
                "validation": detail.validation,
            });
            serde_json::to_writer_pretty(&mut *out, &rejection)?;
            writeln!(out)?;
        } else {
            writeln!(out, "Session:      {session}")?;
            writeln!(out, "Rejected:     packet failed schema validation")?;
            for issue in &review.schema_issues {
                writeln!(out, "  schema: {issue}")?;
            }
        }
        return Ok(verdict);
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &detail)?;
        writeln!(out)?;
        return Ok(verdict);
    }

    let meta = &detail.packet["metadata"];
    writeln!(out, "Session:      {session}")?;
    writeln!(out, "Generated at: {}", text_or_dash(&meta["generated_at"]))?;
    writeln!(out, "Schema:       {}", text_or_dash(&detail.packet["schema_version"]))?;
    writeln!(out, "Validation:   {}", detail.validation.summary())?;
    for error in &detail.validation.errors {
        writeln!(out, "  - {error}")?;
    }
    writeln!(out)?;
    for row in flatten_packet(&detail.packet) {
        writeln!(
            out,
            "{:<16} {:<8} {:<8} matched={:<5} flags={}",
            row.policy_id, row.status, row.confidence, row.matched, row.quality_flags
        )?;
    }
    Ok(verdict)
}

fn text_or_dash(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn validate(raw: &Value, out: &mut impl Write) -> Result<Verdict> {
    let review = inspect_packet(raw);
    let verdict = review.verdict();
    writeln!(out, "Verdict: {verdict}")?;
    for issue in &review.schema_issues {
        writeln!(out, "  schema: {issue}")?;
    }
    writeln!(out, "Invariants: {}", review.validation.summary())?;
    for error in &review.validation.errors {
        writeln!(out, "  - {error}")?;
    }
    Ok(verdict)
}
