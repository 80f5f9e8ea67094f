//! Per-file selection of feature keys: composable row filters plus the
//! deduplication rules for each [`FeatureKind`]
use super::*;
use std::cmp::Ordering;
use std::convert::TryFrom;

#[derive(Clone, Debug, PartialEq)]
pub enum RowFilter {
    /// Drop decoy hits flagged in `Reverse`
    Reverse,
    /// Drop rows flagged in `Potential contaminant`
    Contaminant,
    /// Drop protein groups flagged in `Only identified by site`
    OnlyIdentifiedBySite,
    /// Keep rows with `Intensity` >= N; a missing intensity fails
    MinIntensity(i64),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    row_filters: Vec<RowFilter>,
}

impl Filter {
    pub fn new() -> Self {
        Filter {
            row_filters: Vec::new(),
        }
    }

    /// Decoys and contaminants are dropped for every feature kind
    pub fn standard() -> Self {
        Filter::new()
            .add_row_filter(RowFilter::Reverse)
            .add_row_filter(RowFilter::Contaminant)
    }

    /// Default filter of each feature kind. Protein groups additionally drop
    /// site-only identifications and rows without a positive `Intensity`.
    pub fn for_kind(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Peptides | FeatureKind::Evidence => Filter::standard(),
            FeatureKind::ProteinGroups | FeatureKind::Genes => Filter::standard()
                .add_row_filter(RowFilter::OnlyIdentifiedBySite)
                .add_row_filter(RowFilter::MinIntensity(1)),
        }
    }

    pub fn add_row_filter(mut self, f: RowFilter) -> Self {
        self.row_filters.push(f);
        self
    }

    /// Which rows of `table` pass every filter.
    ///
    /// A flag column absent from the file counts as unset, so older MaxQuant
    /// versions without e.g. `Only identified by site` still load.
    pub fn mask(&self, table: &Table) -> Vec<bool> {
        let mut mask = vec![true; table.len()];
        for filter in &self.row_filters {
            let idx = match table.column(filter.column()) {
                Some(idx) => idx,
                None => {
                    if let RowFilter::MinIntensity(_) = filter {
                        mask.iter_mut().for_each(|m| *m = false);
                    }
                    continue;
                }
            };
            for (m, row) in mask.iter_mut().zip(table.rows()) {
                if *m && filter.rejects(&row[idx]) {
                    *m = false;
                }
            }
        }
        mask
    }
}

impl RowFilter {
    fn column(&self) -> &'static str {
        match self {
            RowFilter::Reverse => "Reverse",
            RowFilter::Contaminant => "Potential contaminant",
            RowFilter::OnlyIdentifiedBySite => "Only identified by site",
            RowFilter::MinIntensity(_) => "Intensity",
        }
    }

    fn rejects(&self, value: &Value) -> bool {
        match self {
            RowFilter::MinIntensity(cutoff) => value.as_i64().map(|i| i < *cutoff).unwrap_or(true),
            _ => value.as_flag(),
        }
    }
}

/// A row competing for the single slot of its group in [`select_max_by`]
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate<G> {
    pub row: usize,
    pub group: G,
    pub score: Option<f64>,
}

/// Descending score order with missing scores last
fn score_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep exactly one candidate per group, the one with the highest score.
///
/// Candidates are stably sorted descending on (group, score) and the first
/// of each group is kept, so equal scores resolve to the earliest input row.
pub fn select_max_by<G: Ord>(mut candidates: Vec<Candidate<G>>) -> Vec<Candidate<G>> {
    candidates.sort_by(|a, b| {
        b.group
            .cmp(&a.group)
            .then_with(|| score_desc(a.score, b.score))
    });
    candidates.dedup_by(|a, b| a.group == b.group);
    candidates
}

/// Rows kept from one file, and the keys they contribute
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Row indices into the source [`Table`]
    pub rows: Vec<usize>,
    pub keys: Vec<FeatureKey>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Turns one loaded table into the feature keys of that file
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub kind: FeatureKind,
    pub filter: Filter,
    pub gene_policy: GenePolicy,
}

impl Selector {
    pub fn new(kind: FeatureKind) -> Self {
        Selector {
            kind,
            filter: Filter::for_kind(kind),
            gene_policy: GenePolicy::default(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_gene_policy(mut self, policy: GenePolicy) -> Self {
        self.gene_policy = policy;
        self
    }

    /// Load the working columns of this selector's file from `folder`
    pub fn load<P: AsRef<Path>>(&self, folder: P) -> Result<Table> {
        let kind = self.kind.file_kind();
        Table::load(
            folder.as_ref().join(kind.file_name()),
            kind,
            Some(self.kind.use_cols()),
        )
    }

    pub fn select(&self, table: &Table) -> Result<Selection> {
        let mask = self.filter.mask(table);
        match self.kind {
            FeatureKind::Peptides => select_peptides(table, &mask),
            FeatureKind::Evidence => select_evidence(table, &mask),
            FeatureKind::ProteinGroups | FeatureKind::Genes => {
                self.select_protein_groups(table, &mask)
            }
        }
    }

    fn select_protein_groups(&self, table: &Table, mask: &[bool]) -> Result<Selection> {
        let ids = table
            .column("Protein IDs")
            .or_else(|| table.column("Majority protein IDs"))
            .ok_or_else(|| Error::MissingColumn {
                path: table.path.clone(),
                column: "Protein IDs".into(),
            })?;
        let genes = table.require("Gene names")?;
        let score = table.require("Score")?;

        let mut annotated = Vec::new();
        let mut unannotated = Vec::new();
        for (idx, row) in table.rows().enumerate() {
            if !mask[idx] || row[ids].is_missing() {
                continue;
            }
            match row[genes].as_str().map(str::trim).filter(|g| !g.is_empty()) {
                Some(gene_set) => annotated.push(Candidate {
                    row: idx,
                    group: gene_set.to_string(),
                    score: row[score].as_f64(),
                }),
                None => unannotated.push(idx),
            }
        }

        // one protein group per gene set, unannotated groups stay singletons
        let rows = select_max_by(annotated)
            .into_iter()
            .map(|c| c.row)
            .chain(unannotated)
            .collect::<Vec<usize>>();

        let mut selection = Selection::default();
        for idx in rows {
            let row = table.row(idx);
            match self.kind {
                FeatureKind::Genes => {
                    for gene in self.gene_policy.keys(row[genes].as_str()) {
                        selection.keys.push(FeatureKey::Gene(gene));
                    }
                }
                _ => {
                    let id = row[ids].as_str().unwrap_or_default();
                    selection.keys.push(FeatureKey::ProteinGroup(id.into()));
                }
            }
            selection.rows.push(idx);
        }
        Ok(selection)
    }
}

fn select_peptides(table: &Table, mask: &[bool]) -> Result<Selection> {
    let seq = table.require("Sequence")?;
    let mut selection = Selection::default();
    for (idx, row) in table.rows().enumerate() {
        if !mask[idx] {
            continue;
        }
        if let Some(s) = row[seq].as_str() {
            selection.rows.push(idx);
            selection.keys.push(FeatureKey::Peptide(s.into()));
        }
    }
    Ok(selection)
}

/// One row per (sequence, charge), best `Score` first
fn select_evidence(table: &Table, mask: &[bool]) -> Result<Selection> {
    let seq_col = table.require("Sequence")?;
    let charge_col = table.require("Charge")?;
    let score_col = table.require("Score")?;

    let candidates = table
        .rows()
        .enumerate()
        .filter(|(idx, _)| mask[*idx])
        .filter_map(|(idx, row)| {
            let sequence = row[seq_col].as_str()?;
            let charge = u8::try_from(row[charge_col].as_i64()?).ok()?;
            Some(Candidate {
                row: idx,
                group: (sequence.to_string(), charge),
                score: row[score_col].as_f64(),
            })
        })
        .collect::<Vec<_>>();

    let mut selection = Selection::default();
    for c in select_max_by(candidates) {
        let (sequence, charge) = c.group;
        selection.rows.push(c.row);
        selection.keys.push(FeatureKey::Precursor { sequence, charge });
    }
    Ok(selection)
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(kind: FileKind, data: &str) -> Table {
        Table::parse(data.as_bytes(), kind, None, kind.file_name()).unwrap()
    }

    macro_rules! cand {
        ($row:expr, $seq:expr, $z:expr, $score:expr) => {
            Candidate {
                row: $row,
                group: ($seq.to_string(), $z as u8),
                score: Some($score),
            }
        };
    }

    #[test]
    fn max_by_score_per_group() {
        let kept = select_max_by(vec![
            cand!(0, "A", 2, 10.0),
            cand!(1, "A", 2, 30.0),
            cand!(2, "A", 3, 5.0),
        ]);
        assert_eq!(kept.len(), 2);
        let mut rows = kept.iter().map(|c| c.row).collect::<Vec<_>>();
        rows.sort();
        assert_eq!(rows, vec![1, 2]);
    }

    #[test]
    fn ties_keep_first_row() {
        let kept = select_max_by(vec![
            cand!(0, "A", 2, 7.0),
            cand!(1, "A", 2, 7.0),
            Candidate {
                row: 2,
                group: ("A".to_string(), 2u8),
                score: None,
            },
        ]);
        assert_eq!(kept, vec![cand!(0, "A", 2, 7.0)]);
    }

    #[test]
    fn reverse_and_contaminants_dropped() {
        let t = table(
            FileKind::Peptides,
            "Sequence\tIntensity\tReverse\tPotential contaminant\n\
             AAAK\t0\t\t\n\
             REVK\t100\t+\t\n\
             CONK\t100\t\t+\n\
             \t100\t\t\n\
             AAAK\t5\t\t\n",
        );
        let sel = Selector::new(FeatureKind::Peptides).select(&t).unwrap();
        // no intensity threshold: the zero-intensity row counts
        assert_eq!(
            sel.keys,
            vec![FeatureKey::Peptide("AAAK".into()), FeatureKey::Peptide("AAAK".into())]
        );
        assert_eq!(sel.rows, vec![0, 4]);
    }

    #[test]
    fn optional_filters() {
        let t = table(
            FileKind::ProteinGroups,
            "Protein IDs\tGene names\tScore\tIntensity\tOnly identified by site\n\
             P1\tA\t1\t0\t\n\
             P2\tB\t1\t100\t+\n\
             P3\tC\t1\t100\t\n",
        );
        let filter = Filter::standard()
            .add_row_filter(RowFilter::OnlyIdentifiedBySite)
            .add_row_filter(RowFilter::MinIntensity(1));
        assert_eq!(filter.mask(&t), vec![false, false, true]);
        assert_eq!(Filter::standard().mask(&t), vec![true, true, true]);
    }

    #[test]
    fn evidence_best_per_charge() {
        let t = table(
            FileKind::Evidence,
            "Sequence\tCharge\tScore\tReverse\tPotential contaminant\n\
             A\t2\t10\t\t\n\
             A\t2\t30\t\t\n\
             A\t3\t5\t\t\n\
             A\t3\t50\t+\t\n",
        );
        let sel = Selector::new(FeatureKind::Evidence).select(&t).unwrap();
        assert_eq!(sel.len(), 2);
        let mut pairs = sel.rows.iter().copied().zip(sel.keys.iter().cloned()).collect::<Vec<_>>();
        pairs.sort_by_key(|p| p.0);
        assert_eq!(
            pairs,
            vec![
                (
                    1,
                    FeatureKey::Precursor {
                        sequence: "A".into(),
                        charge: 2
                    }
                ),
                (
                    2,
                    FeatureKey::Precursor {
                        sequence: "A".into(),
                        charge: 3
                    }
                ),
            ]
        );
    }

    #[test]
    fn gene_set_dedup() {
        let t = table(
            FileKind::ProteinGroups,
            "Protein IDs\tGene names\tScore\tIntensity\n\
             G1\tACTB\t5\t10\n\
             G2\tACTB\t9\t10\n",
        );
        let genes = Selector::new(FeatureKind::Genes).select(&t).unwrap();
        assert_eq!(genes.keys, vec![FeatureKey::Gene(GeneSet::Named("ACTB".into()))]);
        let score = t.column("Score").unwrap();
        assert_eq!(t.value(genes.rows[0], score), &Value::Float(9.0));

        let groups = Selector::new(FeatureKind::ProteinGroups).select(&t).unwrap();
        assert_eq!(groups.keys, vec![FeatureKey::ProteinGroup("G2".into())]);
    }

    #[test]
    fn unannotated_groups_are_singletons() {
        let t = table(
            FileKind::ProteinGroups,
            "Protein IDs\tGene names\tScore\tIntensity\n\
             P1\t\t5\t10\n\
             P2\t\t9\t10\n\
             P3\tACTB;ACTG1\t1\t10\n",
        );
        let groups = Selector::new(FeatureKind::ProteinGroups).select(&t).unwrap();
        assert_eq!(
            groups.keys,
            vec![
                FeatureKey::ProteinGroup("P3".into()),
                FeatureKey::ProteinGroup("P1".into()),
                FeatureKey::ProteinGroup("P2".into()),
            ]
        );

        let genes = Selector::new(FeatureKind::Genes)
            .with_gene_policy(GenePolicy::Expand)
            .select(&t)
            .unwrap();
        assert_eq!(
            genes.keys,
            vec![
                FeatureKey::Gene(GeneSet::Named("ACTB".into())),
                FeatureKey::Gene(GeneSet::Named("ACTG1".into())),
                FeatureKey::Gene(GeneSet::Unannotated),
                FeatureKey::Gene(GeneSet::Unannotated),
            ]
        );
    }

    #[test]
    fn protein_group_defaults() {
        let t = table(
            FileKind::ProteinGroups,
            "Protein IDs\tGene names\tScore\tIntensity\tOnly identified by site\tReverse\tPotential contaminant\n\
             P1\tA\t1\t100\t\t\t\n\
             P2\tB\t1\t100\t+\t\t\n\
             P3\tC\t1\t0\t\t\t\n\
             P4\tD\t1\t\t\t\t\n\
             P5\tE\t1\t100\t\t+\t\n\
             P6\tF\t9\t100\t\t\t+\n\
             P7\tA\t0.5\t100\t\t\t\n",
        );
        for kind in &[FeatureKind::ProteinGroups, FeatureKind::Genes] {
            let sel = Selector::new(*kind).select(&t).unwrap();
            assert_eq!(sel.rows, vec![0]);
        }
        let genes = Selector::new(FeatureKind::Genes).select(&t).unwrap();
        assert_eq!(genes.keys, vec![FeatureKey::Gene(GeneSet::Named("A".into()))]);

        // peptides and precursors keep zero intensities
        assert_eq!(Filter::for_kind(FeatureKind::Peptides), Filter::standard());
        assert_eq!(Filter::for_kind(FeatureKind::Evidence), Filter::standard());
    }

    #[test]
    fn missing_required_column() {
        let t = table(FileKind::Evidence, "Sequence\tScore\nA\t1\n");
        let err = Selector::new(FeatureKind::Evidence).select(&t).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "Charge"));
        assert!(err.is_recoverable());
    }
}
