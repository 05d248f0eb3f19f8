/*
SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza
*/

extern crate anndats;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use polars::prelude::*;

use anndats::cleaner::RecordCleaner;
use anndats::collate::CollateJob;
use anndats::config::{
    CleanArgs, Cli, CollateArgs, Command, ROOT_ENV, ReconcileArgs, RelationsArgs, VerifyArgs,
    WindowsArgs,
};
use anndats::identifiers::{normalize_local_keys, strip_float_artefacts};
use anndats::io::{WriteOptions, parse_dates, publish, read_table, write_table};
use anndats::manifest::OutputManifest;
use anndats::pipeline::AnnouncementPipeline;
use anndats::reconciler::{KeyReconciler, ReconcileColumns};
use anndats::relations::{collate_relations, multiplicity};
use anndats::windows::{WindowColumns, derive_validity_windows};

fn main() {
    // a missing .env is fine
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    info!("root {} (override with --root or {ROOT_ENV})", cli.root_dir().display());

    if let Err(e) = run(&cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Clean(args) => clean(cli, args),
        Command::Collate(args) => collate(cli, args),
        Command::Windows(args) => windows(cli, args),
        Command::Relations(args) => relations(cli, args),
        Command::Reconcile(args) => reconcile(cli, args),
        Command::Verify(args) => verify(cli, args),
    }
}

fn load(cli: &Cli, path: &Path) -> Result<DataFrame> {
    let path = cli.resolve(path);
    read_table(&path, None).with_context(|| format!("reading {}", path.display()))
}

fn save(cli: &Cli, df: &DataFrame, path: &Path) -> Result<()> {
    save_as(cli, df, path, &cli.write_options())
}

fn save_as(cli: &Cli, df: &DataFrame, path: &Path, options: &WriteOptions) -> Result<()> {
    let path = cli.resolve(path);
    let written = if cli.no_manifest {
        write_table(df, &path, options)
    } else {
        publish(df, &path, options).map(|m| info!("sha256 {}", m.sha256))
    };
    written.with_context(|| format!("writing {}", path.display()))
}

fn clean(cli: &Cli, args: &CleanArgs) -> Result<()> {
    let df = load(cli, &args.input)?;
    let df = parse_dates(&df, "input", &args.date_columns)?;
    let cleaner = RecordCleaner::new(args.index.iter().cloned(), args.variables.iter().cloned())
        .with_tie_breaks(args.tie_breaks.clone())
        .with_table_name("input");
    let out = if args.keyed {
        cleaner.clean_keyed(&df)?
    } else {
        cleaner.clean(&df)?
    };
    save(cli, &out, &args.out)
}

fn collate(cli: &Cli, args: &CollateArgs) -> Result<()> {
    let cleaner = RecordCleaner::new(args.index.iter().cloned(), args.variables.iter().cloned());
    let mut job = CollateJob::new(cli.resolve(&args.source_dir), args.prefix.as_str(), cleaner);
    job.frequencies = args.frequencies.clone();
    job.years = args.years()?;
    job.date_columns = args.date_columns.clone();
    job.tag_column = (!args.no_tag).then(|| args.tag_column.clone());

    let out = job.run().context("collating yearly exports")?;
    save(cli, &out, &args.out)
}

fn windows(cli: &Cli, args: &WindowsArgs) -> Result<()> {
    let obs = load(cli, &args.observations)?;
    let obs = parse_dates(&obs, "observations", &[args.date.as_str()])?;
    let names = WindowColumns::new(
        args.key.as_str(),
        args.first_name.as_str(),
        args.last_name.as_str(),
    );
    let out = derive_validity_windows(&obs, &args.date, &names)?;
    save(cli, &out, &args.out)
}

fn relations(cli: &Cli, args: &RelationsArgs) -> Result<()> {
    let mut sources = Vec::with_capacity(args.sources.len());
    for p in &args.sources {
        let mut df = load(cli, p)?;
        if args.normalize {
            df = normalize_local_keys(&df, "relation", &args.local_key)?;
            df = strip_float_artefacts(&df, "relation", &[args.canonical_key.as_str()])?;
        }
        sources.push(df);
    }
    let out = collate_relations(&sources, &args.local_key, &args.canonical_key)?;

    let ambiguous = multiplicity(&out, &args.local_key, &args.canonical_key)?
        .lazy()
        .filter(col("multiplicity").gt(lit(1)))
        .collect()?
        .height();
    info!("{ambiguous} local key(s) map to more than one {}", args.canonical_key);
    save(cli, &out, &args.out)
}

fn reconcile(cli: &Cli, args: &ReconcileArgs) -> Result<()> {
    let mut record_dates = vec![args.date.clone()];
    record_dates.extend(args.date_columns.iter().cloned());

    let records = parse_dates(&load(cli, &args.records)?, "records", &record_dates)?;
    let relation = load(cli, &args.relation)?;
    let windows = parse_dates(
        &load(cli, &args.windows)?,
        "windows",
        &[args.first_valid.as_str(), args.last_valid.as_str()],
    )?;

    let columns = ReconcileColumns {
        local_key: args.local_key.clone(),
        canonical_key: args.canonical_key.clone(),
        record_date: args.date.clone(),
        first_valid: args.first_valid.clone(),
        last_valid: args.last_valid.clone(),
    };
    let reconciler = KeyReconciler::new(columns)
        .with_buffer_days(args.buffer_days)
        .with_mandatory(args.mandatory.iter().cloned())
        .with_tie_breaks(args.tie_breaks.clone());

    let mut pipeline = AnnouncementPipeline::new(reconciler)
        .with_tie_breaks(args.tie_breaks.clone())
        .with_key_normalization(args.normalize_keys);
    if !args.variables.is_empty() {
        pipeline = pipeline.with_variables(args.variables.clone());
    }

    let out = pipeline.run(&records, &relation, &windows)?;
    info!("summary {}", serde_json::to_string(&out.summary)?);

    save(cli, &out.resolved, &args.out)?;
    // unmatched keys are for reading by eye; format follows the extension
    let options = WriteOptions {
        format: None,
        ..cli.write_options()
    };
    save_as(cli, &out.unmatched, &args.unmatched_path(), &options)
}

fn verify(cli: &Cli, args: &VerifyArgs) -> Result<()> {
    let sidecar = cli.resolve(&args.manifest);
    let manifest = OutputManifest::load(&sidecar)
        .with_context(|| format!("reading manifest {}", sidecar.display()))?;
    let intact = manifest
        .verify()
        .with_context(|| format!("hashing {}", manifest.path.display()))?;
    if !intact {
        bail!(
            "{} no longer matches sha256 {} recorded at {}",
            manifest.path.display(),
            manifest.sha256,
            manifest.written_at
        );
    }
    info!(
        "{} ok: {} row(s), sha256 {}",
        manifest.path.display(),
        manifest.rows,
        manifest.sha256
    );
    Ok(())
}
