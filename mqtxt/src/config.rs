//! Folder registries and fixed on-disk locations of counter state
use super::*;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Known sample folders, name -> path (`file_paths.yaml`)
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FolderRegistry {
    folders: BTreeMap<String, PathBuf>,
}

/// Names of the folders to be counted (`eligable_files.yaml`)
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct EligibleFolders {
    pub files: Vec<String>,
}

fn read_yaml<T, P>(path: P) -> Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    Ok(serde_yaml::from_reader(io::BufReader::new(file))?)
}

impl FolderRegistry {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<FolderRegistry> {
        read_yaml(path)
    }

    pub fn parse(yaml: &str) -> Result<FolderRegistry> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.folders.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Resolve every eligible name, in eligible order. A single unknown name
    /// fails the whole selection.
    pub fn select(&self, eligible: &EligibleFolders) -> Result<Vec<SampleFolder>> {
        eligible
            .files
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|path| SampleFolder::with_id(name.as_str(), path))
                    .ok_or_else(|| Error::UnknownFolder(name.clone()))
            })
            .collect()
    }
}

impl EligibleFolders {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<EligibleFolders> {
        read_yaml(path)
    }

    pub fn parse(yaml: &str) -> Result<EligibleFolders> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Folder id -> sample id, read from a CSV whose first column holds the
/// folder id and whose `new_sample_id` column holds the sample id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleRename {
    pub mapping: HashMap<String, String>,
}

impl SampleRename {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<SampleRename> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let target = rdr
            .headers()?
            .iter()
            .position(|h| h == "new_sample_id")
            .ok_or_else(|| Error::MissingColumn {
                path: path.to_path_buf(),
                column: "new_sample_id".into(),
            })?;

        let mut mapping = HashMap::new();
        for record in rdr.records() {
            let record = record?;
            match (record.get(0), record.get(target)) {
                (Some(old), Some(new)) if !old.is_empty() && !new.is_empty() => {
                    mapping.insert(old.to_string(), new.to_string());
                }
                _ => {}
            }
        }
        Ok(SampleRename { mapping })
    }

    /// Keep only the folders listed in the rename table
    pub fn restrict(&self, folders: Vec<SampleFolder>) -> Vec<SampleFolder> {
        folders
            .into_iter()
            .filter(|f| self.mapping.contains_key(&f.id))
            .collect()
    }
}

/// Every subdirectory of `root` is a sample folder, sorted by id
pub fn scan_directory<P: AsRef<Path>>(root: P) -> Result<Vec<SampleFolder>> {
    let mut v = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            v.push(SampleFolder::new(path));
        }
    }
    v.sort();
    Ok(v)
}

/// Persisted counter state for `kind` below `dir`
pub fn state_file<P: AsRef<Path>>(dir: P, kind: FeatureKind) -> PathBuf {
    dir.as_ref().join(format!("count_{}.json", kind))
}

/// Directory receiving the per-folder dumps for `kind` below `dir`
pub fn dump_dir<P: AsRef<Path>>(dir: P, kind: FeatureKind) -> PathBuf {
    dir.as_ref().join(format!("dumps_{}", kind))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eligible_selection() -> Result<()> {
        let registry = FolderRegistry::parse("run_b: /data/b\nrun_a: /data/a\n")?;
        let eligible = EligibleFolders::parse("files:\n  - run_a\n  - run_b\n")?;
        let folders = registry.select(&eligible)?;
        assert_eq!(
            folders,
            vec![
                SampleFolder::with_id("run_a", "/data/a"),
                SampleFolder::with_id("run_b", "/data/b"),
            ]
        );

        let eligible = EligibleFolders::parse("files: [run_a, run_x]")?;
        match registry.select(&eligible) {
            Err(Error::UnknownFolder(name)) => assert_eq!(name, "run_x"),
            other => panic!("expected unknown folder, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn rename_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rename.csv");
        fs::write(&path, ",new_sample_id,batch\nrun_a,S1,1\nrun_b,S2,1\nrun_c,,2\n")?;
        let rename = SampleRename::from_csv(&path)?;
        assert_eq!(rename.mapping.len(), 2);
        assert_eq!(rename.mapping["run_b"], "S2");

        let kept = rename.restrict(vec![
            SampleFolder::with_id("run_a", "/data/a"),
            SampleFolder::with_id("run_c", "/data/c"),
        ]);
        assert_eq!(kept, vec![SampleFolder::with_id("run_a", "/data/a")]);

        fs::write(&path, "id,sample\nrun_a,S1\n")?;
        assert!(matches!(
            SampleRename::from_csv(&path),
            Err(Error::MissingColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn scanning_and_locations() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("run_b"))?;
        fs::create_dir(dir.path().join("run_a"))?;
        fs::write(dir.path().join("notes.txt"), "")?;
        let ids = scan_directory(dir.path())?
            .into_iter()
            .map(|f| f.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["run_a", "run_b"]);

        assert_eq!(
            state_file("/state", FeatureKind::ProteinGroups),
            PathBuf::from("/state/count_protein_groups.json")
        );
        assert_eq!(
            dump_dir("/state", FeatureKind::Genes),
            PathBuf::from("/state/dumps_genes")
        );
        Ok(())
    }
}
