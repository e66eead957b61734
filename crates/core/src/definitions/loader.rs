use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ArchitectureDefinition, DefinitionBatch, DefinitionError, IsaDefinition};

/// Read a definitions directory into an unvalidated batch.
///
/// Layout: every sub-directory `<dir>/` is an architecture whose record lives
/// next to it in `<dir>.yml` (or `<dir>.yaml`); each regular file inside the
/// sub-directory is one ISA definition. Entries are visited in sorted order so
/// the same tree always yields the same batch. Hidden entries are skipped.
pub fn load_definitions_dir(root: &Path) -> Result<DefinitionBatch, DefinitionError> {
    let mut batch = DefinitionBatch::new();

    for arch_dir in sorted_entries(root, EntryKind::Dir)? {
        let arch_file = architecture_file(root, &arch_dir)?;
        let arch: ArchitectureDefinition = read_yaml(&arch_file)?;
        debug!(architecture = %arch.name, file = %arch_file.display(), "loaded architecture definition");

        let isa_files = sorted_entries(&arch_dir, EntryKind::File)?;
        let arch_name = arch.name.clone();
        batch.add_architecture(arch);
        for isa_file in isa_files {
            let isa: IsaDefinition = read_yaml(&isa_file)?;
            debug!(architecture = %arch_name, isa = %isa.name, "loaded ISA definition");
            batch.add_isa(arch_name.clone(), isa);
        }
    }

    Ok(batch)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

fn sorted_entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>, DefinitionError> {
    let unreadable = |source| DefinitionError::Unreadable { path: dir.to_path_buf(), source };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(unreadable)?;
        let wanted = match kind {
            EntryKind::Dir => file_type.is_dir(),
            EntryKind::File => file_type.is_file(),
        };
        if wanted {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn architecture_file(root: &Path, arch_dir: &Path) -> Result<PathBuf, DefinitionError> {
    let stem = arch_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let yml = root.join(format!("{stem}.yml"));
    if yml.is_file() {
        return Ok(yml);
    }
    let yaml = root.join(format!("{stem}.yaml"));
    if yaml.is_file() {
        return Ok(yaml);
    }
    Err(DefinitionError::Unreadable {
        path: yml,
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "architecture directory has no matching .yml file",
        ),
    })
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, DefinitionError> {
    let body = fs::read_to_string(path)
        .map_err(|source| DefinitionError::Unreadable { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&body)
        .map_err(|source| DefinitionError::Unparsable { path: path.to_path_buf(), source })
}
