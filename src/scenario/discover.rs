//! Scenario file discovery

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Every `*.toml` under `base`, sorted, keeping only paths whose location
/// relative to `base` contains `filter`
pub fn discover_scenarios(base: &Path, filter: Option<&str>) -> Vec<PathBuf> {
    let mut scenarios = Vec::new();
    discover_recursive(base, base, filter, &mut scenarios);
    scenarios.sort();
    scenarios
}

fn discover_recursive(base: &Path, current: &Path, filter: Option<&str>, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(current) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", current.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            discover_recursive(base, &path, filter, found);
        } else if path.extension().is_some_and(|e| e == "toml") {
            if let Some(f) = filter {
                let rel = relative(base, &path);
                if !rel.contains(f) {
                    continue;
                }
            }
            found.push(path);
        }
    }
}

/// Path relative to `base` with `/` separators
pub fn relative(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();
        touch(&base.join("signals/pulse.toml"));
        touch(&base.join("items/land.toml"));
        touch(&base.join("items/nested/deep.toml"));
        touch(&base.join("items/notes.md"));

        let all: Vec<String> = discover_scenarios(base, None)
            .iter()
            .map(|p| relative(base, p))
            .collect();
        assert_eq!(all, ["items/land.toml", "items/nested/deep.toml", "signals/pulse.toml"]);

        let items = discover_scenarios(base, Some("items/"));
        assert_eq!(items.len(), 2);
        assert!(discover_scenarios(base, Some("nothing")).is_empty());
    }

    #[test]
    fn test_missing_dir_finds_nothing() {
        assert!(discover_scenarios(Path::new("no/such/dir"), None).is_empty());
    }
}
