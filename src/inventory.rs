//! Sphinx inventory (`objects.inv`, version 2) reading and writing.

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::domains::ObjectEntry;
use crate::error::BuildError;

pub const INVENTORY_FILE: &str = "objects.inv";

const HEADER_VERSION: &str = "# Sphinx inventory version 2";
const HEADER_COMPRESSED: &str = "# The remainder of this file is compressed using zlib.";

lazy_static! {
    /// `name domain:role priority location dispname`
    static ref ENTRY_REGEX: Regex = Regex::new(r"^(.+?)\s+(\S+)\s+(-?\d+)\s+?(\S*)\s+(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub project: String,
    pub version: String,
    /// Absolute (or base-relative) location including the anchor
    pub uri: String,
    pub dispname: String,
    pub priority: i32,
}

/// Objects of one project, keyed by `domain:role` then by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inventory {
    pub project: String,
    pub version: String,
    items: IndexMap<String, IndexMap<String, InventoryItem>>,
}

impl Inventory {
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            items: IndexMap::new(),
        }
    }

    /// Builds the inventory of a domain's objects. `suffix` is the page file
    /// suffix locations are written with (".html").
    pub fn from_objects<'a>(
        project: &str,
        version: &str,
        domain: &str,
        suffix: &str,
        objects: impl IntoIterator<Item = &'a ObjectEntry>,
    ) -> Self {
        let mut inventory = Self::new(project, version);
        let mut objects: Vec<_> = objects.into_iter().collect();
        objects.sort_by(|a, b| a.name.cmp(&b.name));

        for object in objects {
            let uri = if object.anchor.is_empty() {
                format!("{}{}", object.docname, suffix)
            } else {
                format!("{}{}#{}", object.docname, suffix, object.anchor)
            };
            inventory.insert(
                &format!("{}:{}", domain, object.objtype),
                &object.name,
                InventoryItem {
                    project: project.to_string(),
                    version: version.to_string(),
                    uri,
                    dispname: object.dispname.clone(),
                    priority: object.priority,
                },
            );
        }
        inventory
    }

    /// Adds an item; the first one registered for a name is kept.
    pub fn insert(&mut self, objtype: &str, name: &str, item: InventoryItem) {
        self.items
            .entry(objtype.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert(item);
    }

    pub fn get(&self, objtype: &str, name: &str) -> Option<&InventoryItem> {
        self.items.get(objtype)?.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(objtype, name, item)` for every entry
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &InventoryItem)> {
        self.items.iter().flat_map(|(objtype, entries)| {
            entries
                .iter()
                .map(move |(name, item)| (objtype.as_str(), name.as_str(), item))
        })
    }

    /// Serializes to the version 2 format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildError> {
        let mut out = format!(
            "{}\n# Project: {}\n# Version: {}\n{}\n",
            HEADER_VERSION, self.project, self.version, HEADER_COMPRESSED
        )
        .into_bytes();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        for (objtype, name, item) in self.iter() {
            let uri = match item.uri.split_once('#') {
                Some((page, anchor)) if anchor.ends_with(name) => {
                    format!("{}#{}$", page, &anchor[..anchor.len() - name.len()])
                }
                _ => item.uri.clone(),
            };
            let dispname = if item.dispname == name { "-" } else { item.dispname.as_str() };
            writeln!(encoder, "{} {} {} {} {}", name, objtype, item.priority, uri, dispname)?;
        }
        out.extend(encoder.finish()?);
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<(), BuildError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        debug!("Wrote {} inventory entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Parses a version 2 inventory. Locations are joined to `base_uri`.
    pub fn parse(data: &[u8], base_uri: &str) -> Result<Self, BuildError> {
        let mut rest = data;
        let mut header = Vec::with_capacity(4);
        for _ in 0..4 {
            let end = rest
                .iter()
                .position(|b| *b == b'\n')
                .ok_or_else(|| BuildError::Inventory("truncated inventory header".to_string()))?;
            header.push(String::from_utf8_lossy(&rest[..end]).trim_end().to_string());
            rest = &rest[end + 1..];
        }

        if header[0] != HEADER_VERSION {
            return Err(BuildError::Inventory(format!(
                "unsupported inventory version: {}",
                header[0]
            )));
        }
        if !header[3].contains("zlib") {
            return Err(BuildError::Inventory(
                "invalid inventory header: data is not compressed using zlib".to_string(),
            ));
        }
        let project = header[1].strip_prefix("# Project: ").unwrap_or_default();
        let version = header[2].strip_prefix("# Version: ").unwrap_or_default();
        let mut inventory = Self::new(project, version);

        let mut body = String::new();
        ZlibDecoder::new(rest)
            .read_to_string(&mut body)
            .map_err(|e| BuildError::Inventory(format!("invalid inventory payload: {}", e)))?;

        for line in body.lines() {
            let Some(caps) = ENTRY_REGEX.captures(line) else {
                continue;
            };
            let name = &caps[1];
            let objtype = &caps[2];
            if !objtype.contains(':') {
                continue;
            }
            let priority = caps[3].parse().unwrap_or(-1);
            let mut location = caps[4].to_string();
            if location.ends_with('$') {
                location.pop();
                location.push_str(name);
            }
            let dispname = match &caps[5] {
                "-" => name.to_string(),
                other => other.to_string(),
            };
            inventory.insert(
                objtype,
                name,
                InventoryItem {
                    project: inventory.project.clone(),
                    version: inventory.version.clone(),
                    uri: join_uri(base_uri, &location),
                    dispname,
                    priority,
                },
            );
        }

        Ok(inventory)
    }

    pub fn load(path: &Path, base_uri: &str) -> Result<Self, BuildError> {
        let data = std::fs::read(path)?;
        Self::parse(&data, base_uri)
    }
}

fn join_uri(base: &str, location: &str) -> String {
    if base.is_empty() {
        location.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, location)
    } else {
        format!("{}/{}", base, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, docname: &str) -> ObjectEntry {
        ObjectEntry {
            name: name.to_string(),
            dispname: name.to_string(),
            objtype: "option".to_string(),
            docname: docname.to_string(),
            anchor: name.to_string(),
            priority: -1,
        }
    }

    #[test]
    fn test_written_lines_use_shorthands() {
        let objects = [entry("CONFIG_FOO", "kconfig")];
        let inventory = Inventory::from_objects("Demo", "1.0", "kconfig", ".html", &objects);
        let bytes = inventory.to_bytes().unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("# Sphinx inventory version 2\n# Project: Demo\n# Version: 1.0\n"));

        let header_len = text.match_indices('\n').nth(3).unwrap().0 + 1;
        let mut body = String::new();
        ZlibDecoder::new(&bytes[header_len..]).read_to_string(&mut body).unwrap();
        assert_eq!(body, "CONFIG_FOO kconfig:option -1 kconfig.html#$ -\n");
    }

    #[test]
    fn test_parse_written_inventory() {
        let objects = [entry("CONFIG_B", "ref/kconfig"), entry("CONFIG_A", "ref/kconfig")];
        let written = Inventory::from_objects("Demo", "1.0", "kconfig", ".html", &objects);
        let parsed = Inventory::parse(&written.to_bytes().unwrap(), "https://docs.example.org/").unwrap();

        assert_eq!(parsed.project, "Demo");
        assert_eq!(parsed.len(), 2);
        let item = parsed.get("kconfig:option", "CONFIG_A").unwrap();
        assert_eq!(item.uri, "https://docs.example.org/ref/kconfig.html#CONFIG_A");
        assert_eq!(item.dispname, "CONFIG_A");
        assert_eq!(item.priority, -1);

        let names: Vec<_> = parsed.iter().map(|(_, name, _)| name).collect();
        assert_eq!(names, vec!["CONFIG_A", "CONFIG_B"]);
    }

    #[test]
    fn test_rejects_other_versions() {
        let data = b"# Sphinx inventory version 1\n# Project: X\n# Version: 1\n# zlib\n";
        assert!(matches!(Inventory::parse(data, ""), Err(BuildError::Inventory(_))));
    }
}
