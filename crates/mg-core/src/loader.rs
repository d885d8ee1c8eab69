//! Source migration loaders.
//!
//! A [`Loader`] produces the ordered, deduplicated list of source migration
//! definitions the coordinator reconciles against applied history. Ordering is
//! by migration name (names are expected to be timestamp-prefixed) and then by
//! the order the definitions were read in.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::migration::{MigrationDefinition, MigrationKind};
use std::fs;
use std::path::{Path, PathBuf};

/// Produces source migration definitions.
///
/// Implementations either return the complete list or an error; a partial
/// list is never returned.
pub trait Loader {
    /// Load all source migration definitions, ordered by name
    fn load_migrations(&self) -> CoreResult<Vec<MigrationDefinition>>;
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    fn load_migrations(&self) -> CoreResult<Vec<MigrationDefinition>> {
        (**self).load_migrations()
    }
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load_migrations(&self) -> CoreResult<Vec<MigrationDefinition>> {
        (**self).load_migrations()
    }
}

/// Sort definitions by name, keeping read order for equal names.
pub fn sort_definitions(definitions: &mut [MigrationDefinition]) {
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Loader over a fixed, in-memory list of definitions
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    definitions: Vec<MigrationDefinition>,
}

impl StaticLoader {
    /// Create a loader returning `definitions` sorted by name
    pub fn new(definitions: Vec<MigrationDefinition>) -> Self {
        Self { definitions }
    }

    /// Append a definition
    pub fn push(&mut self, definition: MigrationDefinition) {
        self.definitions.push(definition);
    }

    /// Replace the definition with the same identity, or append it
    pub fn upsert(&mut self, definition: MigrationDefinition) {
        match self
            .definitions
            .iter_mut()
            .find(|d| d.key() == definition.key())
        {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }
}

impl Loader for StaticLoader {
    fn load_migrations(&self) -> CoreResult<Vec<MigrationDefinition>> {
        let mut definitions = self.definitions.clone();
        sort_definitions(&mut definitions);
        Ok(definitions)
    }
}

/// Loader reading `<base_location>/<source_dir>/*` for every configured
/// source directory
#[derive(Debug, Clone)]
pub struct DiskLoader {
    base_location: PathBuf,
    groups: Vec<(MigrationKind, Vec<String>)>,
}

impl DiskLoader {
    /// Build a loader from the configured directories, resolving
    /// `baseLocation` against `root`
    pub fn from_config(config: &Config, root: &Path) -> Self {
        Self {
            base_location: config.base_location_absolute(root),
            groups: vec![
                (MigrationKind::SingleMigration, config.single_migrations.clone()),
                (MigrationKind::TenantMigration, config.tenant_migrations.clone()),
                (MigrationKind::SingleScript, config.single_scripts.clone()),
                (MigrationKind::TenantScript, config.tenant_scripts.clone()),
            ],
        }
    }

    fn read_source_dir(
        &self,
        source_dir: &str,
        kind: MigrationKind,
        out: &mut Vec<MigrationDefinition>,
    ) -> CoreResult<()> {
        let dir = self.base_location.join(source_dir);
        let read_err = |path: &Path, source: std::io::Error| CoreError::ReadError {
            path: path.display().to_string(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| read_err(&dir, e))? {
            let entry = entry.map_err(|e| read_err(&dir, e))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let before = out.len();

        for path in files {
            let contents = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(MigrationDefinition::new(name, source_dir, kind, contents));
        }
        log::debug!("Loaded {} {} file(s) from {}", out.len() - before, kind, dir.display());
        Ok(())
    }
}

impl Loader for DiskLoader {
    fn load_migrations(&self) -> CoreResult<Vec<MigrationDefinition>> {
        let mut definitions = Vec::new();
        for (kind, dirs) in &self.groups {
            for source_dir in dirs {
                self.read_source_dir(source_dir, *kind, &mut definitions)?;
            }
        }
        sort_definitions(&mut definitions);
        Ok(definitions)
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
