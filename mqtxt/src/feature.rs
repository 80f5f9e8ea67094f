use super::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Level at which features are counted across folders
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Peptide sequences from peptides.txt
    Peptides,
    /// Precursors (sequence + charge) from evidence.txt
    Evidence,
    /// Protein groups from proteinGroups.txt
    ProteinGroups,
    /// Gene sets from proteinGroups.txt
    Genes,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Peptides,
        FeatureKind::Evidence,
        FeatureKind::ProteinGroups,
        FeatureKind::Genes,
    ];

    /// Output file the features are read from
    pub fn file_kind(self) -> FileKind {
        match self {
            FeatureKind::Peptides => FileKind::Peptides,
            FeatureKind::Evidence => FileKind::Evidence,
            FeatureKind::ProteinGroups | FeatureKind::Genes => FileKind::ProteinGroups,
        }
    }

    /// Working subset of columns loaded for selection and kept in dumps
    pub fn use_cols(self) -> &'static [&'static str] {
        match self {
            FeatureKind::Peptides => &[
                "Sequence",
                "Intensity",
                "Score",
                "PEP",
                "id",
                "Protein group IDs",
                "Evidence IDs",
                "Reverse",
                "Potential contaminant",
            ],
            FeatureKind::Evidence => &[
                "Sequence",
                "Charge",
                "m/z",
                "id",
                "Peptide ID",
                "Protein group IDs",
                "Intensity",
                "Score",
                "Reverse",
                "Potential contaminant",
            ],
            FeatureKind::ProteinGroups | FeatureKind::Genes => &[
                "Protein IDs",
                "Majority protein IDs",
                "Gene names",
                "Evidence IDs",
                "Q-value",
                "Score",
                "Only identified by site",
                "Reverse",
                "Potential contaminant",
                "Intensity",
            ],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Peptides => "peptides",
            FeatureKind::Evidence => "evidence",
            FeatureKind::ProteinGroups => "protein_groups",
            FeatureKind::Genes => "genes",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "peptides" => Ok(FeatureKind::Peptides),
            "evidence" | "precursors" => Ok(FeatureKind::Evidence),
            "protein_groups" | "proteingroups" => Ok(FeatureKind::ProteinGroups),
            "genes" => Ok(FeatureKind::Genes),
            _ => Err(format!(
                "unknown feature kind '{}' (expected peptides, evidence, protein_groups or genes)",
                s
            )),
        }
    }
}

/// Gene annotation of a protein group. A missing annotation is its own
/// bucket and never equal to a named gene.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeneSet {
    Named(String),
    Unannotated,
}

const UNANNOTATED: &str = "<unannotated>";

/// How semicolon-delimited gene lists turn into gene keys
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GenePolicy {
    /// The whole list is one key
    GeneSet,
    /// One key per listed gene
    Expand,
    /// Only the first listed gene
    Razor,
}

impl Default for GenePolicy {
    fn default() -> Self {
        GenePolicy::GeneSet
    }
}

impl GenePolicy {
    /// Gene keys for one (possibly missing) `Gene names` cell
    pub fn keys(self, genes: Option<&str>) -> Vec<GeneSet> {
        let genes = match genes.map(str::trim).filter(|g| !g.is_empty()) {
            Some(g) => g,
            None => return vec![GeneSet::Unannotated],
        };
        match self {
            GenePolicy::GeneSet => vec![GeneSet::Named(genes.into())],
            GenePolicy::Expand => genes
                .split(';')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(|g| GeneSet::Named(g.into()))
                .collect(),
            GenePolicy::Razor => genes
                .split(';')
                .map(str::trim)
                .find(|g| !g.is_empty())
                .map(|g| vec![GeneSet::Named(g.into())])
                .unwrap_or_else(|| vec![GeneSet::Unannotated]),
        }
    }
}

impl FromStr for GenePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gene-set" | "geneset" | "set" => Ok(GenePolicy::GeneSet),
            "expand" => Ok(GenePolicy::Expand),
            "razor" => Ok(GenePolicy::Razor),
            _ => Err(format!("unknown gene policy '{}' (expected set, expand or razor)", s)),
        }
    }
}

/// Identifying value of a row, counted across folders
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureKey {
    Peptide(String),
    Precursor { sequence: String, charge: u8 },
    ProteinGroup(String),
    Gene(GeneSet),
}

impl FeatureKey {
    /// Parse the textual form written by `Display` back into a key of `kind`
    pub fn parse(kind: FeatureKind, s: &str) -> Result<FeatureKey> {
        match kind {
            FeatureKind::Peptides => Ok(FeatureKey::Peptide(s.into())),
            FeatureKind::Evidence => {
                let (sequence, charge) = s
                    .rsplit_once('_')
                    .ok_or_else(|| Error::InvalidKey(s.into()))?;
                let charge = charge.parse::<u8>().map_err(|_| Error::InvalidKey(s.into()))?;
                Ok(FeatureKey::Precursor {
                    sequence: sequence.into(),
                    charge,
                })
            }
            FeatureKind::ProteinGroups => Ok(FeatureKey::ProteinGroup(s.into())),
            FeatureKind::Genes if s == UNANNOTATED => Ok(FeatureKey::Gene(GeneSet::Unannotated)),
            FeatureKind::Genes => Ok(FeatureKey::Gene(GeneSet::Named(s.into()))),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeatureKey::Peptide(s) | FeatureKey::ProteinGroup(s) => f.write_str(s),
            FeatureKey::Precursor { sequence, charge } => write!(f, "{}_{}", sequence, charge),
            FeatureKey::Gene(GeneSet::Named(s)) => f.write_str(s),
            FeatureKey::Gene(GeneSet::Unannotated) => f.write_str(UNANNOTATED),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_text_round_trip() {
        let keys = vec![
            (FeatureKind::Peptides, FeatureKey::Peptide("AAAK".into())),
            (
                FeatureKind::Evidence,
                FeatureKey::Precursor {
                    sequence: "AAA_K".into(),
                    charge: 3,
                },
            ),
            (FeatureKind::ProteinGroups, FeatureKey::ProteinGroup("P1;P2".into())),
            (FeatureKind::Genes, FeatureKey::Gene(GeneSet::Named("ACTB;ACTG1".into()))),
            (FeatureKind::Genes, FeatureKey::Gene(GeneSet::Unannotated)),
        ];
        for (kind, key) in keys {
            assert_eq!(FeatureKey::parse(kind, &key.to_string()).unwrap(), key);
        }
        assert!(FeatureKey::parse(FeatureKind::Evidence, "AAAK").is_err());
    }

    #[test]
    fn gene_policies() {
        let g = Some("ACTB; ACTG1");
        assert_eq!(
            GenePolicy::GeneSet.keys(g),
            vec![GeneSet::Named("ACTB; ACTG1".into())]
        );
        assert_eq!(
            GenePolicy::Expand.keys(g),
            vec![GeneSet::Named("ACTB".into()), GeneSet::Named("ACTG1".into())]
        );
        assert_eq!(GenePolicy::Razor.keys(g), vec![GeneSet::Named("ACTB".into())]);
        for policy in &[GenePolicy::GeneSet, GenePolicy::Expand, GenePolicy::Razor] {
            assert_eq!(policy.keys(None), vec![GeneSet::Unannotated]);
            assert_eq!(policy.keys(Some("  ")), vec![GeneSet::Unannotated]);
        }
    }

    #[test]
    fn kind_names() {
        for kind in &FeatureKind::ALL {
            assert_eq!(kind.name().parse::<FeatureKind>().unwrap(), *kind);
        }
        assert_eq!("protein-groups".parse::<FeatureKind>(), Ok(FeatureKind::ProteinGroups));
        assert_eq!(FeatureKind::Genes.file_kind(), FileKind::ProteinGroups);
    }
}
