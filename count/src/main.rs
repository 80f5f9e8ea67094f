//! # mq-count
//!
//! Count how often peptides, precursors, protein groups or genes are
//! identified across a collection of MaxQuant output folders.
//!
//! ```bash
//! # count peptides over the folders listed in two YAML registries
//! mq-count count peptides --folders file_paths.yaml --eligible eligable_files.yaml
//!
//! # count genes over every subdirectory, four reader threads, top 50
//! mq-count count genes --scan /data/mq_out --jobs 4 --top 50
//!
//! # inspect a single folder
//! mq-count preview /data/mq_out/run_01 evidence
//! mq-count params /data/mq_out/run_01/mqpar.xml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use mqtxt::{
    load_mqpar_xml, scan_directory, CounterConfig, EligibleFolders, FeatureCounter, FeatureKind,
    Filter, FolderRegistry, GenePolicy, MaxQuantOutput, RowFilter, SampleFolder, SampleRename,
    Selector, Verbosity,
};

/// Feature frequencies across MaxQuant output folders
#[derive(Parser)]
#[command(name = "mq-count")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count features of one kind over many sample folders
    Count {
        /// peptides, evidence, protein_groups or genes
        #[arg(value_name = "KIND")]
        kind: FeatureKind,

        /// YAML mapping folder name -> path
        #[arg(long, requires = "eligible")]
        folders: Option<PathBuf>,

        /// YAML with the `files` to count
        #[arg(long, requires = "folders")]
        eligible: Option<PathBuf>,

        /// Treat every subdirectory of DIR as a sample folder
        #[arg(long, value_name = "DIR", conflicts_with = "folders")]
        scan: Option<PathBuf>,

        /// CSV with a `new_sample_id` column; only listed folders are
        /// counted and their dumps renamed afterwards
        #[arg(long, requires = "overwrite")]
        rename: Option<PathBuf>,

        /// Directory holding counter state and dumps
        #[arg(long, default_value = ".")]
        state_dir: PathBuf,

        /// Start from an empty counter instead of resuming
        #[arg(long)]
        overwrite: bool,

        /// Reader threads (1 reads sequentially, 0 uses all cores)
        #[arg(short = 'j', long, default_value = "1")]
        jobs: usize,

        /// Save state every N newly counted folders (0 only saves at the end)
        #[arg(long, default_value = "0")]
        checkpoint: usize,

        /// How gene lists become gene keys: set, expand or razor
        #[arg(long, default_value = "set")]
        gene_policy: GenePolicy,

        /// Drop rows with an intensity below this value (protein groups and
        /// genes always need a positive intensity)
        #[arg(long)]
        min_intensity: Option<i64>,

        /// Print the N most common keys
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Write the most common keys (all, unless --top is given) as TSV
        #[arg(long, value_name = "FILE")]
        top_out: Option<PathBuf>,
    },

    /// Run the reader and selector on a single folder
    Preview {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,

        #[arg(value_name = "KIND")]
        kind: FeatureKind,

        /// Number of keys to print
        #[arg(short, long, default_value = "10")]
        n: usize,
    },

    /// Print summary.txt of a folder
    Summary {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },

    /// Print one section of a parameter file as JSON
    Params {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, default_value = "MaxQuantParams")]
        section: String,
    },
}

struct CountArgs {
    kind: FeatureKind,
    folders: Option<PathBuf>,
    eligible: Option<PathBuf>,
    scan: Option<PathBuf>,
    rename: Option<PathBuf>,
    state_dir: PathBuf,
    overwrite: bool,
    jobs: usize,
    checkpoint: usize,
    gene_policy: GenePolicy,
    min_intensity: Option<i64>,
    top: Option<usize>,
    top_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let verbosity = match (cli.quiet, cli.verbose) {
        (true, _) => Verbosity::Quiet,
        (false, 0) | (false, 1) => Verbosity::Normal,
        _ => Verbosity::Verbose,
    };

    match cli.command {
        Commands::Count {
            kind,
            folders,
            eligible,
            scan,
            rename,
            state_dir,
            overwrite,
            jobs,
            checkpoint,
            gene_policy,
            min_intensity,
            top,
            top_out,
        } => run_count(
            CountArgs {
                kind,
                folders,
                eligible,
                scan,
                rename,
                state_dir,
                overwrite,
                jobs,
                checkpoint,
                gene_policy,
                min_intensity,
                top,
                top_out,
            },
            verbosity,
        ),
        Commands::Preview { folder, kind, n } => run_preview(folder, kind, n),
        Commands::Summary { folder } => run_summary(folder),
        Commands::Params { file, section } => run_params(file, section),
    }
}

fn collect_folders(args: &CountArgs) -> Result<Vec<SampleFolder>> {
    match (&args.scan, &args.folders, &args.eligible) {
        (Some(root), _, _) => {
            scan_directory(root).with_context(|| format!("Failed to scan {}", root.display()))
        }
        (None, Some(folders), Some(eligible)) => {
            let registry = FolderRegistry::from_yaml(folders)
                .with_context(|| format!("Failed to read {}", folders.display()))?;
            let eligible = EligibleFolders::from_yaml(eligible)
                .with_context(|| format!("Failed to read {}", eligible.display()))?;
            Ok(registry.select(&eligible)?)
        }
        _ => bail!("Either --scan or both --folders and --eligible are required"),
    }
}

fn run_count(args: CountArgs, verbosity: Verbosity) -> Result<()> {
    let mut folders = collect_folders(&args)?;

    let rename = match &args.rename {
        Some(path) => {
            let rename = SampleRename::from_csv(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            folders = rename.restrict(folders);
            Some(rename)
        }
        None => None,
    };

    let mut filter = Filter::for_kind(args.kind);
    if let Some(cutoff) = args.min_intensity {
        filter = filter.add_row_filter(RowFilter::MinIntensity(cutoff));
    }
    let selector = Selector::new(args.kind)
        .with_filter(filter)
        .with_gene_policy(args.gene_policy);

    let config = CounterConfig::new(args.kind, &args.state_dir)
        .overwrite(args.overwrite)
        .checkpoint_every(args.checkpoint)
        .verbosity(verbosity)
        .selector(selector);
    let state_path = config.state_path.clone();
    let mut counter = FeatureCounter::new(config)
        .with_context(|| format!("Failed to load {}", state_path.display()))?;

    info!("Counting {} over {} folders", args.kind, folders.len());
    info!("State: {}", state_path.display());

    if args.jobs == 1 {
        counter.sum_over_files(&folders)?;
    } else {
        if args.jobs > 1 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(args.jobs)
                .build_global()
                .context("Failed to start reader threads")?;
        }
        counter.par_sum_over_files(&folders)?;
    }
    counter
        .save()
        .with_context(|| format!("Failed to save {}", state_path.display()))?;

    if let Some(rename) = rename {
        let report = counter.rename_dumps(&rename.mapping)?;
        info!(
            "Renamed {} dumps, {} missing, {} failed",
            report.renamed.len(),
            report.missing.len(),
            report.failed.len()
        );
        counter.save()?;
    }

    println!("{}: {}", args.kind, counter.summary());
    for skipped in counter.skipped() {
        println!("  skipped {}: {}", skipped.id, skipped.reason);
    }

    let c = counter.counter();
    println!("{} distinct keys, {} occurrences", c.len(), c.total());
    if let Some(n) = args.top {
        for (key, count) in c.most_common(n) {
            println!("{}\t{}", key, count);
        }
    }
    if let Some(path) = &args.top_out {
        c.write_most_common(path, args.top.unwrap_or_else(|| c.len()))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn run_preview(folder: PathBuf, kind: FeatureKind, n: usize) -> Result<()> {
    let selector = Selector::new(kind);
    let table = selector.load(&folder)?;
    let selection = selector.select(&table)?;

    println!("{}", table.path.display());
    println!("  rows:     {}", table.len());
    println!("  selected: {}", selection.len());
    for key in selection.keys.iter().take(n) {
        println!("  {}", key);
    }
    Ok(())
}

fn run_summary(folder: PathBuf) -> Result<()> {
    let mut output = MaxQuantOutput::new(&folder);
    let summary = output
        .summary()
        .with_context(|| format!("Failed to read summary of {}", folder.display()))?;

    println!("{}", summary.columns().join("\t"));
    for row in summary.rows() {
        let cells = row.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        println!("{}", cells.join("\t"));
    }
    Ok(())
}

fn run_params(file: PathBuf, section: String) -> Result<()> {
    let params = load_mqpar_xml(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value = params.section(&section)?;
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
