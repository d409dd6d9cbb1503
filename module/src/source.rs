use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};

use common::properties::PROP_VALUE_MAX;
use props::ConfigSource;

/// Configuration laid out as files:
///
/// ```text
/// <root>/properties/<name>   content is the value
/// <root>/packages/<package>  empty marker
/// ```
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().into() }
    }

    fn entries(&self, dir: &str) -> Result<Vec<(String, PathBuf)>> {
        let path = self.root.join(dir);
        let dir = fs::read_dir(&path)
            .with_context(|| format!("failed to open path {}", path.display()))?;

        let entries = dir.flatten()
            .filter_map(|entry| match entry.file_name().into_string() {
                Ok(name) => Some((name, entry.path())),
                Err(name) => {
                    warn!("skipping non UTF-8 entry {name:?}");
                    None
                }
            })
            .collect();

        Ok(entries)
    }
}

fn read_value(path: &Path) -> Result<String> {
    let mut buffer = Vec::with_capacity(PROP_VALUE_MAX);
    File::open(path)?
        .take(PROP_VALUE_MAX as u64)
        .read_to_end(&mut buffer)?;

    if let Some(end) = buffer.iter().position(|&ch| ch == 0) {
        buffer.truncate(end);
    }

    let value = String::from_utf8(buffer)?;
    Ok(value.trim_end_matches(['\n', '\r']).into())
}

impl ConfigSource for DirSource {
    fn for_each_property(&self, handler: &mut dyn FnMut(&str, &str)) -> Result<()> {
        for (name, path) in self.entries("properties")? {
            match read_value(&path) {
                Ok(value) => handler(&name, &value),
                Err(err) => debug!("skipping property {name}: {err}"),
            }
        }

        Ok(())
    }

    fn for_each_package(&self, handler: &mut dyn FnMut(&str)) -> Result<()> {
        for (name, _) in self.entries("packages")? {
            handler(&name);
        }

        Ok(())
    }
}
