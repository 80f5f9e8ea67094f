//! Fixed column-name to dtype tables for MaxQuant text output.
//!
//! The tables follow MaxQuant 1.6.12.0. Columns listed here but absent from a
//! file (older or newer MaxQuant versions) are tolerated, and columns present
//! in a file but not listed pass through as [`ColumnType::Text`].
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MQ_VERSION: &str = "1.6.12.0";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    /// 64-bit integer; may be written with comma thousands separators
    Integer,
    Float,
    /// `+` marks a set flag, an empty cell an unset one
    Flag,
}

/// Output files of a single MaxQuant run
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileKind {
    Peptides,
    Evidence,
    ProteinGroups,
    Summary,
    Parameters,
}

impl FileKind {
    pub const ALL: [FileKind; 5] = [
        FileKind::Peptides,
        FileKind::Evidence,
        FileKind::ProteinGroups,
        FileKind::Summary,
        FileKind::Parameters,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            FileKind::Peptides => "peptides.txt",
            FileKind::Evidence => "evidence.txt",
            FileKind::ProteinGroups => "proteinGroups.txt",
            FileKind::Summary => "summary.txt",
            FileKind::Parameters => "mqpar.xml",
        }
    }

    /// Is this a tab-delimited table (as opposed to the XML parameter file)?
    pub fn is_tabular(self) -> bool {
        self != FileKind::Parameters
    }

    /// Declared dtype table, if one exists for this file
    pub fn schema(self) -> &'static [(&'static str, ColumnType)] {
        match self {
            FileKind::Peptides => PEPTIDES,
            FileKind::Evidence => EVIDENCE,
            FileKind::ProteinGroups => PROTEIN_GROUPS,
            FileKind::Summary | FileKind::Parameters => &[],
        }
    }

    /// Declared type of `column`, if any
    pub fn column_type(self, column: &str) -> Option<ColumnType> {
        self.schema()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, ty)| *ty)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

use ColumnType::*;

pub static PEPTIDES: &[(&str, ColumnType)] = &[
    ("N-term cleavage window", Text),
    ("C-term cleavage window", Text),
    ("Amino acid before", Text),
    ("First amino acid", Text),
    ("Second amino acid", Text),
    ("Second last amino acid", Text),
    ("Last amino acid", Text),
    ("Amino acid after", Text),
    ("A Count", Integer),
    ("R Count", Integer),
    ("N Count", Integer),
    ("D Count", Integer),
    ("C Count", Integer),
    ("Q Count", Integer),
    ("E Count", Integer),
    ("G Count", Integer),
    ("H Count", Integer),
    ("I Count", Integer),
    ("L Count", Integer),
    ("K Count", Integer),
    ("M Count", Integer),
    ("F Count", Integer),
    ("P Count", Integer),
    ("S Count", Integer),
    ("T Count", Integer),
    ("W Count", Integer),
    ("Y Count", Integer),
    ("V Count", Integer),
    ("U Count", Integer),
    ("O Count", Integer),
    ("Sequence", Text),
    ("Length", Integer),
    ("Missed cleavages", Integer),
    ("Mass", Float),
    ("Proteins", Text),
    ("Leading razor protein", Text),
    ("Start position", Float),
    ("End position", Float),
    ("Gene names", Text),
    ("Protein names", Text),
    ("Unique (Groups)", Text),
    ("Unique (Proteins)", Text),
    ("Charges", Text),
    ("PEP", Float),
    ("Score", Float),
    ("Intensity", Integer),
    ("Reverse", Flag),
    ("Potential contaminant", Flag),
    ("id", Integer),
    ("Protein group IDs", Text),
    ("Mod. peptide IDs", Text),
    ("Evidence IDs", Text),
    ("MS/MS IDs", Text),
    ("Best MS/MS", Float),
    ("Oxidation (M) site IDs", Text),
    ("MS/MS Count", Integer),
];

pub static EVIDENCE: &[(&str, ColumnType)] = &[
    ("Sequence", Text),
    ("Length", Integer),
    ("Modifications", Text),
    ("Modified sequence", Text),
    ("Missed cleavages", Integer),
    ("Proteins", Text),
    ("Leading proteins", Text),
    ("Leading razor protein", Text),
    ("Gene names", Text),
    ("Protein names", Text),
    ("Type", Text),
    ("Raw file", Text),
    ("Charge", Integer),
    ("m/z", Float),
    ("Mass", Float),
    ("Retention time", Float),
    ("PEP", Float),
    ("MS/MS count", Integer),
    ("Score", Float),
    ("Delta score", Float),
    ("Intensity", Integer),
    ("Reverse", Flag),
    ("Potential contaminant", Flag),
    ("id", Integer),
    ("Protein group IDs", Text),
    ("Peptide ID", Integer),
    ("Mod. peptide ID", Integer),
    ("MS/MS IDs", Text),
    ("Best MS/MS", Float),
];

pub static PROTEIN_GROUPS: &[(&str, ColumnType)] = &[
    ("Protein IDs", Text),
    ("Majority protein IDs", Text),
    ("Peptide counts (all)", Text),
    ("Peptide counts (razor+unique)", Text),
    ("Peptide counts (unique)", Text),
    ("Protein names", Text),
    ("Gene names", Text),
    ("Fasta headers", Text),
    ("Number of proteins", Integer),
    ("Peptides", Integer),
    ("Razor + unique peptides", Integer),
    ("Unique peptides", Integer),
    ("Sequence coverage [%]", Float),
    ("Unique + razor sequence coverage [%]", Float),
    ("Unique sequence coverage [%]", Float),
    ("Mol. weight [kDa]", Float),
    ("Sequence length", Integer),
    ("Sequence lengths", Text),
    ("Q-value", Float),
    ("Score", Float),
    ("Intensity", Integer),
    ("MS/MS count", Integer),
    ("Only identified by site", Flag),
    ("Reverse", Flag),
    ("Potential contaminant", Flag),
    ("id", Integer),
    ("Peptide IDs", Text),
    ("Peptide is razor", Text),
    ("Mod. peptide IDs", Text),
    ("Evidence IDs", Text),
    ("MS/MS IDs", Text),
    ("Best MS/MS", Text),
    ("Oxidation (M) site IDs", Text),
    ("Oxidation (M) site positions", Text),
    ("Taxonomy IDs", Text),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn declared_types() {
        assert_eq!(
            FileKind::Peptides.column_type("Intensity"),
            Some(ColumnType::Integer)
        );
        assert_eq!(
            FileKind::ProteinGroups.column_type("Only identified by site"),
            Some(ColumnType::Flag)
        );
        assert_eq!(FileKind::Evidence.column_type("Charge"), Some(ColumnType::Integer));
        assert_eq!(FileKind::Peptides.column_type("Not a column"), None);
        assert_eq!(FileKind::Summary.column_type("Raw file"), None);
    }

    #[test]
    fn file_names() {
        assert_eq!(FileKind::ProteinGroups.to_string(), "proteinGroups.txt");
        assert!(!FileKind::Parameters.is_tabular());
    }
}
