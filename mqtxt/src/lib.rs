//! A Rust library for reading MaxQuant output folders and counting how
//! often features (peptides, precursors, protein groups, genes) are
//! identified across many runs.
//!
//! Tab-delimited output files are read into a typed [`Table`], with columns
//! cast according to a declared schema for each [`FileKind`]:
//!
//! ```rust,ignore
//! # use mqtxt::*;
//! let mut run = MaxQuantOutput::new("./data/run_01/txt");
//! let peptides = run.peptides()?;
//! println!("{} peptides", peptides.len());
//! ```
//!
//! A [`Selector`] applies a [`Filter`] (decoys and contaminants by default)
//! and the deduplication rule of its [`FeatureKind`], turning one table
//! into the [`FeatureKey`]s that file contributes
//!
//! ```rust,ignore
//! # use mqtxt::*;
//! let selector = Selector::new(FeatureKind::Evidence)
//!     .with_filter(Filter::standard().add_row_filter(RowFilter::MinIntensity(1000)));
//! let table = selector.load("./data/run_01/txt")?;
//! let selection = selector.select(&table)?;
//! ```
//!
//! A [`FeatureCounter`] runs the selector over a list of sample folders,
//! writes one dump per folder and keeps a [`FrequencyCounter`] that can be
//! saved and resumed later. Folders already counted in a previous run are
//! not counted twice.
//!
//! ```rust,ignore
//! # use mqtxt::*;
//! let registry = FolderRegistry::from_yaml("file_paths.yaml")?;
//! let eligible = EligibleFolders::from_yaml("eligable_files.yaml")?;
//! let folders = registry.select(&eligible)?;
//!
//! let mut counter = FeatureCounter::new(CounterConfig::new(FeatureKind::Peptides, "./counts"))?;
//! counter.par_sum_over_files(&folders)?;
//! counter.save()?;
//! for (key, n) in counter.counter().most_common(20) {
//!     println!("{}\t{}", key, n);
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

mod aggregate;
mod config;
mod error;
mod feature;
mod filter;
mod mqpar;
mod output;
mod parser;
mod schema;

pub use aggregate::*;
pub use config::*;
pub use error::{Error, Result};
pub use feature::{FeatureKey, FeatureKind, GenePolicy, GeneSet};
pub use filter::{select_max_by, Candidate, Filter, RowFilter, Selection, Selector};
pub use mqpar::{find_parameter_files, load_mqpar_xml, Parameters};
pub use output::MaxQuantOutput;
pub use parser::{Table, Value};
pub use schema::{ColumnType, FileKind, MQ_VERSION};
