#![allow(dead_code)]

use std::fs;
use std::path::Path;

use serde_json::Value;
use tempfile::TempDir;

/// Builder for temporary module directory trees.
///
/// Layout matches what `JsonModuleLoader` expects:
/// - root modules as `<name>.json`
/// - packages under `modules/<identifier>/` with a `package.json` manifest
///
/// The `write_*` methods work after construction too, to simulate on-disk
/// edits in reload tests.
pub struct ModuleDirBuilder {
    dir: TempDir,
}

impl ModuleDirBuilder {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp module dir"),
        }
    }

    /// Add `<name>.json` at the root.
    pub fn with_module(self, name: &str, doc: &Value) -> Self {
        self.write_module(name, doc);
        self
    }

    /// Add a package under `modules/<identifier>/` whose manifest points at
    /// `main`.
    pub fn with_package(self, identifier: &str, main: &str, doc: &Value) -> Self {
        let root = self.dir.path().join("modules").join(identifier);
        fs::create_dir_all(&root).expect("failed to create package dir");
        let manifest = serde_json::json!({ "name": identifier, "main": main });
        write_json(&root.join("package.json"), &manifest);
        write_json(&root.join(main), doc);
        self
    }

    /// Overwrite a root module file.
    pub fn write_module(&self, name: &str, doc: &Value) {
        write_json(&self.dir.path().join(format!("{name}.json")), doc);
    }

    /// Overwrite a file inside a package directory.
    pub fn write_package_file(&self, identifier: &str, rel: &str, doc: &Value) {
        let root = self.dir.path().join("modules").join(identifier);
        write_json(&root.join(rel), doc);
    }

    /// Overwrite a package manifest.
    pub fn write_package_manifest(&self, identifier: &str, manifest: &Value) {
        self.write_package_file(identifier, "package.json", manifest);
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a package root, as the loader will resolve it.
    pub fn package_root(&self, identifier: &str) -> std::path::PathBuf {
        self.dir.path().join("modules").join(identifier)
    }
}

impl Default for ModuleDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_json(path: &Path, doc: &Value) {
    let text = serde_json::to_string_pretty(doc).expect("failed to serialize document");
    fs::write(path, text).unwrap_or_else(|e| panic!("failed to write {path:?}: {e}"));
}
