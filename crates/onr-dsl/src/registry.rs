//! The provider registry (§4.3, §4.3a): loads one `ProviderFile` per file
//! from a directory, hot-reloads by swapping the whole map, and serves
//! lookups lock-free off an `arc_swap::ArcSwap`. Readers never hold a lock
//! across their use of the returned `Arc<ProviderFile>` -- the structure is
//! immutable after construction, so there is nothing left to protect once
//! the reference has been copied out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::build::{build_provider_file, BuildError};
use crate::model::ProviderFile;

const PROVIDER_FILE_EXT: &str = "conf";

/// Why a candidate file did not make it into the reloaded map.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadOutcome {
    #[error("{path}: {source}")]
    ParseError { path: PathBuf, source: Arc<onr_dsl_parser::ParseError> },
    #[error("{path}: {source}")]
    BuildError { path: PathBuf, source: Arc<BuildError> },
    #[error("{path}: provider name {name:?} already loaded from {first:?}")]
    DuplicateName { path: PathBuf, name: String, first: PathBuf },
}

/// Outcome of one `reload_from_dir`/`reload_from_file` call.
#[derive(Debug, Clone, Default)]
pub struct ReloadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Many-readers/rare-writer provider map (§5). Reload is an atomic
/// whole-map swap; in-flight requests holding an `Arc<ProviderFile>` from
/// before the swap keep running against their own snapshot (§9 "Registry
/// reload does not cancel in-flight requests").
#[derive(Default)]
pub struct Registry {
    inner: ArcSwap<HashMap<String, Arc<ProviderFile>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { inner: ArcSwap::from_pointee(HashMap::new()) }
    }

    /// List `*.conf` files directly under `dir` (non-recursive), parse and
    /// validate each independently, and atomically swap in a fresh map.
    /// A file that fails to parse/validate, or whose provider name
    /// duplicates an already-accepted file, is skipped with a diagnostic;
    /// it never aborts the reload of the other files (§4.3, §9 "directory
    /// mode: later duplicates are skipped with a diagnostic").
    pub fn reload_from_dir(&self, dir: &Path) -> std::io::Result<ReloadReport> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(PROVIDER_FILE_EXT))
            .collect();
        entries.sort();

        let mut map = HashMap::new();
        let mut first_seen: HashMap<String, PathBuf> = HashMap::new();
        let mut report = ReloadReport::default();

        for path in entries {
            match load_one(&path) {
                Ok((name, file)) => {
                    if let Some(first) = first_seen.get(&name) {
                        tracing::warn!(provider = %name, path = %path.display(), first = %first.display(), "duplicate provider name, skipping");
                        report.skipped.push((path.clone(), format!("duplicate provider name {name:?}, first loaded from {}", first.display())));
                        continue;
                    }
                    first_seen.insert(name.clone(), path.clone());
                    report.loaded.push(name.clone());
                    map.insert(name, Arc::new(file));
                }
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "provider file skipped on reload");
                    report.skipped.push((path, reason));
                }
            }
        }

        self.inner.store(Arc::new(map));
        Ok(report)
    }

    /// Merged-file variant (§4.3): a single file may declare multiple
    /// `provider` blocks. Unlike directory mode, a duplicate name *within*
    /// this file is fatal for the whole reload -- nothing is swapped in.
    pub fn reload_from_file(&self, path: &Path) -> Result<ReloadReport, LoadOutcome> {
        let doc = onr_dsl_parser::parse_file(path)
            .map_err(|e| LoadOutcome::ParseError { path: path.to_path_buf(), source: Arc::new(e) })?;

        let mut map = HashMap::new();
        let mut report = ReloadReport::default();
        for raw in &doc.providers {
            let file = build_provider_file(raw, &raw.name)
                .map_err(|e| LoadOutcome::BuildError { path: path.to_path_buf(), source: Arc::new(e) })?;
            if map.contains_key(&raw.name) {
                return Err(LoadOutcome::DuplicateName {
                    path: path.to_path_buf(),
                    name: raw.name.clone(),
                    first: path.to_path_buf(),
                });
            }
            report.loaded.push(raw.name.clone());
            map.insert(raw.name.clone(), Arc::new(file));
        }

        self.inner.store(Arc::new(map));
        Ok(report)
    }

    /// Single `Guard` load plus a cloned `Arc` -- no lock held across the
    /// caller's use of the returned provider file (§4.3a).
    pub fn get(&self, name: &str) -> Option<Arc<ProviderFile>> {
        self.inner.load().get(name).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.inner.load().keys().cloned().collect()
    }
}

/// Read one file, discover its declared provider name, verify it matches
/// the file's basename, parse, build, and validate (§4.3: "verify it
/// matches the filename stem").
fn load_one(path: &Path) -> Result<(String, ProviderFile), String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "non-UTF8 or missing file stem".to_string())?
        .to_string();

    let doc = onr_dsl_parser::parse_file(path).map_err(|e| e.to_string())?;
    let raw = doc
        .providers
        .first()
        .ok_or_else(|| "file declares no provider block".to_string())?;

    if raw.name != stem {
        return Err(format!("provider name {:?} does not match file name {:?}", raw.name, stem));
    }

    let file = build_provider_file(raw, &stem).map_err(|e| e.to_string())?;
    Ok((stem, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{name}.conf")), body).unwrap();
    }

    #[test]
    fn loads_all_valid_files_in_a_directory() {
        let dir = tempdir();
        write(
            dir.path(),
            "openai",
            r#"
provider "openai" {
  defaults {
    upstream_config { base_url "https://api.openai.com"; }
  }
}
"#,
        );
        write(
            dir.path(),
            "anthropic",
            r#"
provider "anthropic" {
  defaults {
    upstream_config { base_url "https://api.anthropic.com"; }
  }
}
"#,
        );

        let reg = Registry::new();
        let report = reg.reload_from_dir(dir.path()).unwrap();
        assert_eq!(report.loaded.len(), 2);
        assert!(report.skipped.is_empty());
        assert!(reg.get("openai").is_some());
        assert!(reg.get("anthropic").is_some());
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn name_mismatch_with_filename_is_skipped_not_fatal() {
        let dir = tempdir();
        write(
            dir.path(),
            "openai",
            r#"
provider "not-openai" {
  defaults { upstream_config { base_url "https://api.openai.com"; } }
}
"#,
        );
        write(
            dir.path(),
            "anthropic",
            r#"
provider "anthropic" {
  defaults { upstream_config { base_url "https://api.anthropic.com"; } }
}
"#,
        );

        let reg = Registry::new();
        let report = reg.reload_from_dir(dir.path()).unwrap();
        assert_eq!(report.loaded, vec!["anthropic".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert!(reg.get("openai").is_none());
    }

    #[test]
    fn file_whose_declared_name_does_not_match_its_stem_is_skipped() {
        // The basename/name invariant means a real duplicate-name collision
        // across two distinct filenames cannot occur in directory mode (each
        // file's name is pinned to its own stem) -- so this covers the
        // mismatch branch that guards it, and `merged_file_rejects_duplicate_names_fatally`
        // below covers the one place true name collisions are actually possible.
        let dir = tempdir();
        write(
            dir.path(),
            "mirror",
            r#"
provider "openai" {
  defaults { upstream_config { base_url "https://mirror.example.com"; } }
}
"#,
        );

        let reg = Registry::new();
        let report = reg.reload_from_dir(dir.path()).unwrap();
        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(reg.get("openai").is_none());
    }

    #[test]
    fn reload_swaps_the_whole_map_atomically() {
        let dir = tempdir();
        write(
            dir.path(),
            "openai",
            r#"
provider "openai" {
  defaults { upstream_config { base_url "https://api.openai.com"; } }
}
"#,
        );
        let reg = Registry::new();
        reg.reload_from_dir(dir.path()).unwrap();
        assert!(reg.get("openai").is_some());

        std::fs::remove_file(dir.path().join("openai.conf")).unwrap();
        write(
            dir.path(),
            "anthropic",
            r#"
provider "anthropic" {
  defaults { upstream_config { base_url "https://api.anthropic.com"; } }
}
"#,
        );
        reg.reload_from_dir(dir.path()).unwrap();
        assert!(reg.get("openai").is_none());
        assert!(reg.get("anthropic").is_some());
    }

    #[test]
    fn merged_file_rejects_duplicate_names_fatally() {
        let dir = tempdir();
        let path = dir.path().join("merged.conf");
        std::fs::write(
            &path,
            r#"
provider "openai" {
  defaults { upstream_config { base_url "https://api.openai.com"; } }
}
provider "openai" {
  defaults { upstream_config { base_url "https://api.openai.com"; } }
}
"#,
        )
        .unwrap();

        let reg = Registry::new();
        let err = reg.reload_from_file(&path).unwrap_err();
        assert!(matches!(err, LoadOutcome::DuplicateName { .. }));
    }

    #[test]
    fn merged_file_loads_multiple_distinct_providers() {
        let dir = tempdir();
        let path = dir.path().join("merged.conf");
        std::fs::write(
            &path,
            r#"
provider "openai" {
  defaults { upstream_config { base_url "https://api.openai.com"; } }
}
provider "anthropic" {
  defaults { upstream_config { base_url "https://api.anthropic.com"; } }
}
"#,
        )
        .unwrap();

        let reg = Registry::new();
        let report = reg.reload_from_file(&path).unwrap();
        assert_eq!(report.loaded.len(), 2);
        assert!(reg.get("openai").is_some());
        assert!(reg.get("anthropic").is_some());
    }

    /// Minimal self-cleaning temp dir -- avoids pulling in a dev-dependency
    /// just for this crate's registry tests.
    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    fn tempdir() -> TempDir {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("onr-dsl-registry-test-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
