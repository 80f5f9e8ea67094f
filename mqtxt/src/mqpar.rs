//! Reading of MaxQuant `mqpar.xml` parameter files into a nested key/value
//! structure.
//!
//! Blocks are not validated against any schema: elements with children become
//! objects, repeated children become arrays, attributes are stored under
//! `@name` and text next to attributes or children under `#text`.
use super::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value as JsonValue};
use std::io::BufReader;

/// Parsed MaxQuant parameter file
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub path: PathBuf,
    pub root: JsonValue,
}

struct Frame {
    name: String,
    map: Map<String, JsonValue>,
    text: String,
}

impl Frame {
    fn open(e: &BytesStart) -> Result<Frame> {
        let mut map = Map::new();
        for attr in e.attributes() {
            let attr = attr?;
            map.insert(
                format!("@{}", String::from_utf8_lossy(attr.key.as_ref())),
                JsonValue::String(attr.unescape_value()?.into_owned()),
            );
        }
        Ok(Frame {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            map,
            text: String::new(),
        })
    }

    fn close(mut self) -> (String, JsonValue) {
        let value = if self.map.is_empty() {
            if self.text.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(self.text)
            }
        } else {
            if !self.text.is_empty() {
                self.map.insert("#text".into(), JsonValue::String(self.text));
            }
            JsonValue::Object(self.map)
        };
        (self.name, value)
    }
}

/// Insert a child, turning repeated names into arrays
fn insert(map: &mut Map<String, JsonValue>, name: String, value: JsonValue) {
    match map.get_mut(&name) {
        Some(JsonValue::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = JsonValue::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

fn parse_xml<R: io::BufRead>(source: R) -> Result<JsonValue> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Map::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(Frame::open(e)?),
            Event::Empty(ref e) => {
                let (name, value) = Frame::open(e)?.close();
                match stack.last_mut() {
                    Some(parent) => insert(&mut parent.map, name, value),
                    None => insert(&mut root, name, value),
                }
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    let (name, value) = frame.close();
                    match stack.last_mut() {
                        Some(parent) => insert(&mut parent.map, name, value),
                        None => insert(&mut root, name, value),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(JsonValue::Object(root))
}

/// Load a MaxQuant parameter file
pub fn load_mqpar_xml<P: AsRef<Path>>(path: P) -> Result<Parameters> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io(e),
    })?;
    Ok(Parameters {
        path: path.to_path_buf(),
        root: parse_xml(BufReader::new(file))?,
    })
}

impl Parameters {
    pub fn parse<P: AsRef<Path>>(xml: &str, path: P) -> Result<Parameters> {
        Ok(Parameters {
            path: path.as_ref().to_path_buf(),
            root: parse_xml(xml.as_bytes())?,
        })
    }

    /// Surface a single named top-level section, e.g. `MaxQuantParams`
    pub fn section(&self, name: &str) -> Result<&JsonValue> {
        self.root.get(name).ok_or_else(|| Error::MissingSection {
            path: self.path.clone(),
            section: name.into(),
        })
    }
}

/// List the `*.xml` parameter files kept in a shared parameter folder
pub fn find_parameter_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut v = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|ext| ext == "xml").unwrap_or(false) {
            v.push(path);
        }
    }
    v.sort();
    Ok(v)
}

#[cfg(test)]
mod test {
    use super::*;

    const MQPAR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MaxQuantParams xmlns:xsd="http://www.w3.org/2001/XMLSchema">
   <fastaFiles>
      <FastaFileInfo>
         <fastaFilePath>/db/human.fasta</fastaFilePath>
         <identifierParseRule>&gt;.*\|(.*)\|</identifierParseRule>
      </FastaFileInfo>
      <FastaFileInfo>
         <fastaFilePath>/db/contaminants.fasta</fastaFilePath>
      </FastaFileInfo>
   </fastaFiles>
   <numThreads>4</numThreads>
   <maxQuantVersion>1.6.12.0</maxQuantVersion>
   <pluginFolder></pluginFolder>
   <restrictMods>
      <string>Oxidation (M)</string>
      <string>Acetyl (Protein N-term)</string>
   </restrictMods>
   <parameterGroups>
      <parameterGroup>
         <enzymes>
            <string>Trypsin/P</string>
         </enzymes>
         <lfqMode unit="mode">1</lfqMode>
      </parameterGroup>
   </parameterGroups>
</MaxQuantParams>
"#;

    #[test]
    fn nested_section() {
        let p = Parameters::parse(MQPAR, "mqpar.xml").unwrap();
        let params = p.section("MaxQuantParams").unwrap();
        assert_eq!(params["numThreads"], JsonValue::String("4".into()));
        assert_eq!(params["maxQuantVersion"], "1.6.12.0");
        assert_eq!(params["pluginFolder"], JsonValue::Null);
        assert_eq!(
            params["@xmlns:xsd"],
            JsonValue::String("http://www.w3.org/2001/XMLSchema".into())
        );

        let fasta = params["fastaFiles"]["FastaFileInfo"].as_array().unwrap();
        assert_eq!(fasta.len(), 2);
        assert_eq!(fasta[1]["fastaFilePath"], "/db/contaminants.fasta");
        assert_eq!(fasta[0]["identifierParseRule"], ">.*\\|(.*)\\|");

        let mods = params["restrictMods"]["string"].as_array().unwrap();
        assert_eq!(mods.len(), 2);

        // single child stays a plain value, attributes sit next to the text
        let group = &params["parameterGroups"]["parameterGroup"];
        assert_eq!(group["enzymes"]["string"], "Trypsin/P");
        assert_eq!(group["lfqMode"]["@unit"], "mode");
        assert_eq!(group["lfqMode"]["#text"], "1");
    }

    #[test]
    fn missing_section() {
        let p = Parameters::parse(MQPAR, "mqpar.xml").unwrap();
        assert!(matches!(
            p.section("Nope"),
            Err(Error::MissingSection { .. })
        ));
    }

    #[test]
    fn missing_file() {
        let err = load_mqpar_xml("/no/such/mqpar.xml").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
