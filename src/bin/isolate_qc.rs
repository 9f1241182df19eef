//! Isolate QC Tool
//!
//! Judges one sequenced isolate from its fastp, sylph, stringMLST and KAT
//! outputs and writes a one-row summary record.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use isolate_qc::config::QcConfig;
use isolate_qc::engine::QcEngine;
use isolate_qc::evaluate::QcStatus;
use isolate_qc::inputs::SamplePaths;
use isolate_qc::reference::ReferenceTable;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "isolate_qc=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = Command::new("isolate-qc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("PASS/WARNING/FAIL quality verdict for a bacterial isolate sequencing run")
        .author("Megan Johnson")
        .arg(
            Arg::new("sample")
                .short('s')
                .long("sample")
                .value_name("ID")
                .help("Sample identifier")
                .required_unless_present("dump_config"),
        )
        .arg(path_arg("fastp", "fastp", "JSON", "fastp JSON report").required_unless_present("dump_config"))
        .arg(path_arg("sylph", "sylph", "TSV", "sylph profile").required_unless_present("dump_config"))
        .arg(path_arg("mlst", "mlst", "TSV", "stringMLST result"))
        .arg(path_arg("kat_hist", "kat-hist", "FILE", "KAT k-mer histogram"))
        .arg(path_arg("kat_gcp", "kat-gcp", "FILE", "KAT GC x coverage matrix"))
        .arg(
            path_arg("reference", "reference", "CSV", "Species genome size and GC reference table")
                .short('r')
                .required_unless_present("dump_config"),
        )
        .arg(path_arg("config", "config", "YAML", "QC threshold configuration").short('c'))
        .arg(
            path_arg("output_dir", "output-dir", "DIRECTORY", "Directory for the summary files")
                .short('o')
                .default_value("."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Also write <sample>_summary.json")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump_config")
                .long("dump-config")
                .help("Print the default configuration as YAML and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("dump_config") {
        print!("{}", QcConfig::default().to_yaml()?);
        return Ok(());
    }

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => QcConfig::load(path)
            .with_context(|| format!("Invalid configuration {}", path.display()))?,
        None => QcConfig::default(),
    };
    let profile = config.profile().context("Configuration rejected")?;

    let reference_path = required_path(&matches, "reference")?;
    let reference = ReferenceTable::load(&reference_path)
        .with_context(|| format!("Failed to load reference table {}", reference_path.display()))?;

    let sample_id = matches
        .get_one::<String>("sample")
        .cloned()
        .context("--sample is required")?;
    let paths = SamplePaths {
        fastp_json: Some(required_path(&matches, "fastp")?),
        sylph_tsv: Some(required_path(&matches, "sylph")?),
        mlst_tsv: matches.get_one::<PathBuf>("mlst").cloned(),
        kat_hist: matches.get_one::<PathBuf>("kat_hist").cloned(),
        kat_gcp: matches.get_one::<PathBuf>("kat_gcp").cloned(),
        ..SamplePaths::new(sample_id.clone())
    };
    let output_dir = required_path(&matches, "output_dir")?;

    println!("🧬 Isolate QC");
    println!("Sample: {}", sample_id);
    println!(
        "Metrics: {} (k-mer analysis {})",
        profile.catalog.len(),
        if profile.kmer.is_some() { "on" } else { "off" }
    );

    let inputs = paths.load(&profile)?;
    let engine = QcEngine::new(profile, reference);
    let report = engine.evaluate_sample(&inputs);
    let record = report.record();

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let csv_path = output_dir.join(format!("{}_summary.csv", sample_id));
    record.write_csv(&csv_path)?;

    println!("📊 Per-metric results:");
    for obs in report.table.iter() {
        let marker = match obs.status() {
            QcStatus::Passed => "✅",
            QcStatus::Warning => "⚠️ ",
            QcStatus::Failed => "❌",
            QcStatus::Skipped => "⏭️ ",
        };
        println!("  {} {:<22} {}", marker, obs.metric().key(), obs.message());
    }

    let verdict = &report.verdict;
    if verdict.contributors.is_empty() {
        println!("🎯 Final status: {}", verdict.status);
    } else {
        println!(
            "🎯 Final status: {} ({})",
            verdict.status,
            verdict.contributor_keys().join(", ")
        );
    }
    println!("💾 Summary saved to: {}", csv_path.display());

    if matches.get_flag("json") {
        let json_path = output_dir.join(format!("{}_summary.json", sample_id));
        record.export_json(&json_path)?;
        println!("💾 JSON saved to: {}", json_path.display());
    }

    Ok(())
}

fn path_arg(id: &'static str, long: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name(value_name)
        .help(help)
        .value_parser(value_parser!(PathBuf))
}

fn required_path(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .with_context(|| format!("--{} is required", id.replace('_', "-")))
}
