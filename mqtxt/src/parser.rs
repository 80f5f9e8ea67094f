//! Structs and methods for reading tab-delimited MaxQuant output into typed
//! tables
use super::*;
use memchr::{memchr_iter, Memchr};
use std::fmt;

/// Generalized wrapper around [`Memchr`] iterator for splitting `&[u8]` slices
/// by a byte.
struct Pitchfork<'a> {
    pos: usize,
    haystack: &'a [u8],
    inner: Memchr<'a>,
}

impl<'a> Pitchfork<'a> {
    pub fn new(needle: u8, haystack: &'a [u8]) -> Self {
        Self {
            pos: 0,
            haystack,
            inner: memchr_iter(needle, haystack),
        }
    }
}

impl<'a> Iterator for Pitchfork<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let end = match self.inner.next() {
            Some(e) => e,
            None => {
                if self.pos < self.haystack.len() {
                    self.haystack.len()
                } else {
                    return None;
                }
            }
        };
        let slice = &self.haystack[self.pos..end];
        self.pos = end + 1;
        Some(slice)
    }
}

/// A single typed cell
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        *self == Value::Missing
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers are widened, so scores stored either way compare alike
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Unset flags and missing cells are both `false`
    pub fn as_flag(&self) -> bool {
        match self {
            Value::Flag(b) => *b,
            Value::Text(s) => !s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Missing | Value::Flag(false) => Ok(()),
            Value::Flag(true) => f.write_str("+"),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Cast a raw cell to its declared type. `None` signals a cast failure.
fn parse_cell(raw: &str, ty: ColumnType) -> Option<Value> {
    let raw = raw.trim();
    match ty {
        ColumnType::Text if raw.is_empty() => Some(Value::Missing),
        ColumnType::Text => Some(Value::Text(raw.into())),
        ColumnType::Flag => Some(Value::Flag(!raw.is_empty())),
        _ if raw.is_empty() || raw.eq_ignore_ascii_case("nan") => Some(Value::Missing),
        ColumnType::Integer => {
            // Intensities are written with comma thousands separators
            let digits = raw.replace(',', "");
            digits.parse::<i64>().ok().map(Value::Integer)
        }
        ColumnType::Float => raw.parse::<f64>().ok().map(Value::Float),
    }
}

/// In-memory table loaded from one MaxQuant output file
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub path: PathBuf,
    pub kind: FileKind,
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Load a tab-delimited MaxQuant file, casting declared columns.
    ///
    /// When `use_cols` is given, only those columns are kept (in the given
    /// order); requested columns absent from the file are ignored.
    pub fn load<P: AsRef<Path>>(path: P, kind: FileKind, use_cols: Option<&[&str]>) -> Result<Table> {
        let path = path.as_ref();
        let buffer = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        Table::parse(&buffer, kind, use_cols, path)
    }

    /// Load summary.txt, dropping the trailing `Total` row
    pub fn load_summary<P: AsRef<Path>>(path: P) -> Result<Table> {
        let mut table = Table::load(path, FileKind::Summary, None)?;
        let total = table
            .rows
            .last()
            .and_then(|row| row.first())
            .and_then(Value::as_str)
            .map(|s| s == "Total")
            .unwrap_or(false);
        if total {
            table.rows.pop();
        }
        Ok(table)
    }

    /// Parse already-read file contents. `path` is only used for error
    /// reporting.
    pub fn parse<P: AsRef<Path>>(
        buffer: &[u8],
        kind: FileKind,
        use_cols: Option<&[&str]>,
        path: P,
    ) -> Result<Table> {
        let path = path.as_ref().to_path_buf();
        let mut lines = Pitchfork::new(b'\n', buffer).map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let header = match lines.next() {
            Some(h) => String::from_utf8_lossy(h).into_owned(),
            None => {
                return Ok(Table {
                    path,
                    kind,
                    columns: Vec::new(),
                    types: Vec::new(),
                    rows: Vec::new(),
                })
            }
        };
        let header = header.split('\t').map(|s| s.trim().to_string()).collect::<Vec<_>>();

        // (position in file, column name)
        let selected: Vec<(usize, String)> = match use_cols {
            Some(cols) => cols
                .iter()
                .filter_map(|c| header.iter().position(|h| h == c).map(|idx| (idx, c.to_string())))
                .collect(),
            None => header.iter().cloned().enumerate().collect(),
        };
        let types = selected
            .iter()
            .map(|(_, name)| kind.column_type(name).unwrap_or(ColumnType::Text))
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (lineno, line) in lines.enumerate() {
            if line.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }
            let line = String::from_utf8_lossy(line);
            let fields = line.split('\t').collect::<Vec<&str>>();
            let mut row = Vec::with_capacity(selected.len());
            for ((idx, name), ty) in selected.iter().zip(&types) {
                let raw = fields.get(*idx).copied().unwrap_or("");
                let value = parse_cell(raw, *ty).ok_or_else(|| Error::SchemaMismatch {
                    path: path.clone(),
                    column: name.clone(),
                    // header is line 1
                    line: lineno + 2,
                    value: raw.to_string(),
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Table {
            path,
            kind,
            columns: selected.into_iter().map(|(_, name)| name).collect(),
            types,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`Table::column`], but a missing column is an error
    pub fn require(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| Error::MissingColumn {
            path: self.path.clone(),
            column: name.into(),
        })
    }

    pub fn row(&self, idx: usize) -> &[Value] {
        &self.rows[idx]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.rows[row][column]
    }

    /// Write the given rows, in the given order, as CSV with a header line
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, rows: &[usize]) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(&self.columns)?;
        for &idx in rows {
            wtr.write_record(self.rows[idx].iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PEPTIDES: &str = "Sequence\tLength\tIntensity\tScore\tReverse\tPotential contaminant\tExtra\n\
                            AAAK\t4\t1,234,567,890,123\t55.5\t\t\tfoo\n\
                            CCCR\t4\t0\tNaN\t+\t\t\n\
                            \n\
                            DDDK\t4\t12\t3\t\t+\tbar\n";

    #[test]
    fn pitchfork() {
        let input = "hello\tworld\tfield\t1111";
        let mut pitch = Pitchfork::new(b'\t', input.as_bytes());
        assert_eq!(pitch.next().unwrap(), "hello".as_bytes());
        assert_eq!(pitch.next().unwrap(), "world".as_bytes());
        assert_eq!(pitch.next().unwrap(), "field".as_bytes());
        assert_eq!(pitch.next().unwrap(), "1111".as_bytes());
        assert_eq!(pitch.next(), None);
    }

    #[test]
    fn typed_columns() {
        let t = Table::parse(PEPTIDES.as_bytes(), FileKind::Peptides, None, "peptides.txt").unwrap();
        assert_eq!(t.len(), 3);
        let intensity = t.column("Intensity").unwrap();
        let score = t.column("Score").unwrap();
        let reverse = t.column("Reverse").unwrap();
        let extra = t.column("Extra").unwrap();

        // no precision lost on large thousands-separated integers
        assert_eq!(t.value(0, intensity), &Value::Integer(1_234_567_890_123));
        assert_eq!(t.value(0, score), &Value::Float(55.5));
        assert_eq!(t.value(1, score), &Value::Missing);
        assert_eq!(t.value(1, reverse), &Value::Flag(true));
        assert_eq!(t.value(0, reverse), &Value::Flag(false));
        assert_eq!(t.value(2, extra), &Value::Text("bar".into()));
        assert_eq!(t.value(1, extra), &Value::Missing);
        assert_eq!(t.column_types()[t.column("Length").unwrap()], ColumnType::Integer);
    }

    #[test]
    fn use_cols_subset() {
        let t = Table::parse(
            PEPTIDES.as_bytes(),
            FileKind::Peptides,
            Some(&["Score", "Sequence", "Not in file"]),
            "peptides.txt",
        )
        .unwrap();
        assert_eq!(t.columns(), &["Score".to_string(), "Sequence".to_string()]);
        assert_eq!(t.value(2, 1), &Value::Text("DDDK".into()));
    }

    #[test]
    fn schema_mismatch() {
        let data = "Sequence\tLength\nAAAK\tfour\n";
        match Table::parse(data.as_bytes(), FileKind::Peptides, None, "x/peptides.txt") {
            Err(Error::SchemaMismatch { column, line, value, .. }) => {
                assert_eq!(column, "Length");
                assert_eq!(line, 2);
                assert_eq!(value, "four");
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn not_found() {
        let err = Table::load("/definitely/not/here/peptides.txt", FileKind::Peptides, None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn crlf_and_short_rows() {
        let data = "Sequence\tScore\r\nAAAK\r\nCCCK\t2\r\n";
        let t = Table::parse(data.as_bytes(), FileKind::Evidence, None, "evidence.txt").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(0, 1), &Value::Missing);
        assert_eq!(t.value(1, 1), &Value::Float(2.0));
    }

    #[test]
    fn display_round_trips_flags() {
        assert_eq!(Value::Flag(true).to_string(), "+");
        assert_eq!(Value::Flag(false).to_string(), "");
        assert_eq!(Value::Integer(1200).to_string(), "1200");
    }
}
