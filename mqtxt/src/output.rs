use super::*;

/// Output folder of a single MaxQuant run.
///
/// Tables are loaded on first request and cached by [`FileKind`] for the
/// lifetime of the value.
#[derive(Debug)]
pub struct MaxQuantOutput {
    pub folder: PathBuf,
    tables: HashMap<FileKind, Table>,
}

impl MaxQuantOutput {
    pub fn new<P: AsRef<Path>>(folder: P) -> MaxQuantOutput {
        MaxQuantOutput {
            folder: folder.as_ref().to_path_buf(),
            tables: HashMap::new(),
        }
    }

    pub fn path(&self, kind: FileKind) -> PathBuf {
        self.folder.join(kind.file_name())
    }

    /// Known output files present in the folder
    pub fn files(&self) -> Vec<FileKind> {
        FileKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.path(*kind).is_file())
            .collect()
    }

    /// Typed table for `kind`, loaded with all columns on first access
    pub fn get(&mut self, kind: FileKind) -> Result<&Table> {
        if !kind.is_tabular() {
            return Err(Error::NotFound {
                path: self.path(kind),
            });
        }
        if !self.tables.contains_key(&kind) {
            let path = self.path(kind);
            let table = match kind {
                FileKind::Summary => Table::load_summary(&path)?,
                _ => Table::load(&path, kind, None)?,
            };
            self.tables.insert(kind, table);
        }
        Ok(&self.tables[&kind])
    }

    pub fn peptides(&mut self) -> Result<&Table> {
        self.get(FileKind::Peptides)
    }

    pub fn evidence(&mut self) -> Result<&Table> {
        self.get(FileKind::Evidence)
    }

    pub fn protein_groups(&mut self) -> Result<&Table> {
        self.get(FileKind::ProteinGroups)
    }

    pub fn summary(&mut self) -> Result<&Table> {
        self.get(FileKind::Summary)
    }

    /// Parameter file stored next to the text output. Not cached.
    pub fn parameters(&self) -> Result<Parameters> {
        load_mqpar_xml(self.path(FileKind::Parameters))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cached_access() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("summary.txt"),
            "Raw file\tExperiment\tMS/MS\nrun_01\texp\t1200\nTotal\t\t1200\n",
        )?;

        let mut output = MaxQuantOutput::new(dir.path());
        assert_eq!(output.files(), vec![FileKind::Summary]);

        let summary = output.summary()?;
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.value(0, 0).as_str(), Some("run_01"));

        // served from the cache even once the file is gone
        fs::remove_file(dir.path().join("summary.txt"))?;
        assert_eq!(output.summary()?.len(), 1);

        assert!(matches!(output.peptides(), Err(Error::NotFound { .. })));
        assert!(matches!(output.parameters(), Err(Error::NotFound { .. })));
        Ok(())
    }
}
