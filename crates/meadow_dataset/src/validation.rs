//! Source dataset validation: image/index pair consistency.
//!
//! Tiling and training assume every image raster has a same-named index
//! raster. `summarize_pairs` reports orphan files that exist on only one
//! side; `delete_orphans` removes them (callers default to dry-run).

use crate::types::{DatasetError, DatasetResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// How filenames are compared across the image/ and index/ directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairKeyOptions {
    /// Compare stems only, for pairs stored with different extensions.
    pub ignore_ext: bool,
    /// Case-insensitive comparison, for datasets that crossed a
    /// case-preserving filesystem.
    pub ignore_case: bool,
}

impl PairKeyOptions {
    fn key(&self, name: &str) -> String {
        let name = if self.ignore_ext {
            Path::new(name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name)
        } else {
            name
        };
        if self.ignore_case {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }
}

/// Orphans found under one `<site>/<split>` directory.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub site: String,
    pub split: String,
    pub paired: usize,
    pub orphan_images: Vec<PathBuf>,
    pub orphan_indices: Vec<PathBuf>,
}

impl PairReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_images.is_empty() && self.orphan_indices.is_empty()
    }
}

fn list_files(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| DatasetError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn key_map(files: Vec<PathBuf>, opts: &PairKeyOptions) -> BTreeMap<String, Vec<PathBuf>> {
    let mut map: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let Some(name) = file.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        map.entry(opts.key(name)).or_default().push(file);
    }
    map
}

/// Scan `<root>/<site>/<split>/{image,index}` for every site directory and
/// report orphans per (site, split).
pub fn summarize_pairs(
    root: &Path,
    splits: &[String],
    opts: PairKeyOptions,
) -> DatasetResult<Vec<PairReport>> {
    let mut reports = Vec::new();
    let mut sites = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| DatasetError::Io {
        path: root.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| DatasetError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        if entry.path().is_dir() {
            sites.push(entry.path());
        }
    }
    sites.sort();

    for site in sites {
        let site_name = site
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        for split in splits {
            let split_dir = site.join(split);
            if !split_dir.is_dir() {
                continue;
            }
            let images = key_map(list_files(&split_dir.join("image"))?, &opts);
            let indices = key_map(list_files(&split_dir.join("index"))?, &opts);

            let paired = images.keys().filter(|k| indices.contains_key(*k)).count();
            let orphan_images: Vec<PathBuf> = images
                .iter()
                .filter(|(k, _)| !indices.contains_key(*k))
                .flat_map(|(_, files)| files.clone())
                .collect();
            let orphan_indices: Vec<PathBuf> = indices
                .iter()
                .filter(|(k, _)| !images.contains_key(*k))
                .flat_map(|(_, files)| files.clone())
                .collect();

            reports.push(PairReport {
                site: site_name.clone(),
                split: split.clone(),
                paired,
                orphan_images,
                orphan_indices,
            });
        }
    }
    Ok(reports)
}

/// Delete every orphan file in the reports; returns the number removed.
pub fn delete_orphans(reports: &[PairReport]) -> DatasetResult<usize> {
    let mut removed = 0usize;
    for report in reports {
        for path in report
            .orphan_images
            .iter()
            .chain(report.orphan_indices.iter())
        {
            fs::remove_file(path).map_err(|e| DatasetError::Io {
                path: path.clone(),
                source: e,
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn setup(root: &Path) {
        touch(&root.join("beaufort/train/image/beaufort_a_2022.png"));
        touch(&root.join("beaufort/train/index/beaufort_a_2022.png"));
        touch(&root.join("beaufort/train/image/beaufort_b_2022.png"));
        touch(&root.join("beaufort/train/index/beaufort_c_2022.png"));
    }

    #[test]
    fn orphans_are_reported_per_side() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        let reports = summarize_pairs(
            tmp.path(),
            &["train".to_string()],
            PairKeyOptions::default(),
        )
        .unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.paired, 1);
        assert_eq!(report.orphan_images.len(), 1);
        assert_eq!(report.orphan_indices.len(), 1);
        assert!(report.orphan_images[0].ends_with("beaufort_b_2022.png"));
    }

    #[test]
    fn ignore_ext_pairs_across_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("beaufort/train/image/beaufort_a_2022.png"));
        touch(&tmp.path().join("beaufort/train/index/beaufort_a_2022.tif"));
        let strict = summarize_pairs(
            tmp.path(),
            &["train".to_string()],
            PairKeyOptions::default(),
        )
        .unwrap();
        assert!(!strict[0].is_clean());
        let relaxed = summarize_pairs(
            tmp.path(),
            &["train".to_string()],
            PairKeyOptions {
                ignore_ext: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(relaxed[0].is_clean());
    }

    #[test]
    fn delete_removes_only_orphans() {
        let tmp = tempfile::tempdir().unwrap();
        setup(tmp.path());
        let reports = summarize_pairs(
            tmp.path(),
            &["train".to_string()],
            PairKeyOptions::default(),
        )
        .unwrap();
        let removed = delete_orphans(&reports).unwrap();
        assert_eq!(removed, 2);
        assert!(tmp
            .path()
            .join("beaufort/train/image/beaufort_a_2022.png")
            .exists());
        assert!(!tmp
            .path()
            .join("beaufort/train/image/beaufort_b_2022.png")
            .exists());
    }
}
