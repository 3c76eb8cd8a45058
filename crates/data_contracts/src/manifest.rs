//! Tile manifest (CSV) and tiling-run metadata (JSON).
//!
//! The manifest is the single source of truth mapping tile identifiers to
//! tile files. The dataset loader consumes only this file and never
//! re-derives tile coordinates, so the writer and the loader cannot drift.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column order is part of the format; rows are written and parsed in
/// exactly this order.
pub const MANIFEST_HEADER: &str = "basename,row,col,image_path,label_path";

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest parse error at {path}:{line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest field {field} contains a reserved character: {value:?}")]
    ReservedCharacter { field: &'static str, value: String },
}

/// One row of the tile manifest. Paths are relative to the manifest's
/// directory so a tiled dataset can be moved wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub basename: String,
    pub row: u32,
    pub col: u32,
    pub image_path: PathBuf,
    pub label_path: PathBuf,
}

impl TileRecord {
    /// The CSV is unquoted; commas or newlines in any field would corrupt it.
    fn validate(&self) -> ManifestResult<()> {
        let fields: [(&'static str, String); 3] = [
            ("basename", self.basename.clone()),
            ("image_path", self.image_path.display().to_string()),
            ("label_path", self.label_path.display().to_string()),
        ];
        for (field, value) in fields {
            if value.contains(',') || value.contains('\n') {
                return Err(ManifestError::ReservedCharacter { field, value });
            }
        }
        Ok(())
    }

    fn to_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.basename,
            self.row,
            self.col,
            self.image_path.display(),
            self.label_path.display()
        )
    }
}

/// In-memory tile manifest; append-only during a tiling run, read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct TileManifest {
    records: Vec<TileRecord>,
}

impl TileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TileRecord) -> ManifestResult<()> {
        record.validate()?;
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn save(&self, path: &Path) -> ManifestResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ManifestError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut out = String::with_capacity(64 * (self.records.len() + 1));
        out.push_str(MANIFEST_HEADER);
        out.push('\n');
        for record in &self.records {
            out.push_str(&record.to_line());
            out.push('\n');
        }
        fs::write(path, out).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> ManifestResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let parse = |line: usize, msg: String| ManifestError::Parse {
            path: path.to_path_buf(),
            line,
            msg,
        };
        let mut lines = raw.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header == MANIFEST_HEADER => {}
            Some((_, header)) => {
                return Err(parse(1, format!("unexpected header {header:?}")));
            }
            None => return Err(parse(1, "empty manifest".to_string())),
        }
        let mut records = Vec::new();
        for (idx, line) in lines {
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() != 5 {
                return Err(parse(idx + 1, format!("expected 5 columns, got {}", cols.len())));
            }
            let row: u32 = cols[1]
                .parse()
                .map_err(|_| parse(idx + 1, format!("bad row {:?}", cols[1])))?;
            let col: u32 = cols[2]
                .parse()
                .map_err(|_| parse(idx + 1, format!("bad col {:?}", cols[2])))?;
            records.push(TileRecord {
                basename: cols[0].to_string(),
                row,
                col,
                image_path: PathBuf::from(cols[3]),
                label_path: PathBuf::from(cols[4]),
            });
        }
        Ok(Self { records })
    }
}

/// Per-raster outcome of a tiling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterReport {
    pub basename: String,
    pub tiles: usize,
    /// Set when this raster aborted; other rasters are unaffected.
    pub error: Option<String>,
}

/// JSON sidecar written next to each manifest, recording the configuration a
/// run was produced with and its per-raster outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingRunMeta {
    pub source_root: String,
    pub split: String,
    pub tile_size: u32,
    pub overlap: f32,
    pub stride: u32,
    /// Hex-encoded SHA-256 of (source_root, split, tile_size, overlap,
    /// code_version); identical inputs always produce the same key.
    pub version: String,
    pub code_version: String,
    pub rasters: Vec<RasterReport>,
}

impl TilingRunMeta {
    pub fn default_code_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Resolve code version with optional override (e.g., git hash).
    pub fn resolve_code_version() -> String {
        if let Ok(val) = std::env::var("CODE_VERSION") {
            if !val.trim().is_empty() {
                return val;
            }
        }
        Self::default_code_version()
    }

    pub fn compute_version(
        source_root: &Path,
        split: &str,
        tile_size: u32,
        overlap: f32,
        code_version: &str,
    ) -> String {
        #[derive(Serialize)]
        struct VersionTuple<'a> {
            source_root: &'a str,
            split: &'a str,
            tile_size: u32,
            overlap: f32,
            code_version: &'a str,
        }
        let tuple = VersionTuple {
            source_root: &source_root.display().to_string(),
            split,
            tile_size,
            overlap,
            code_version,
        };
        let bytes = serde_json::to_vec(&tuple).unwrap_or_default();
        use sha2::Digest;
        let hash = sha2::Sha256::digest(bytes);
        format!("{:x}", hash)
    }

    pub fn save(&self, path: &Path) -> ManifestResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ManifestError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let data = serde_json::to_vec_pretty(self).map_err(|e| ManifestError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, data).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> ManifestResult<Self> {
        let raw = fs::read(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_slice(&raw).map_err(|e| ManifestError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: u32, col: u32) -> TileRecord {
        TileRecord {
            basename: "beaufort_middle_2022".to_string(),
            row,
            col,
            image_path: PathBuf::from(format!(
                "image/beaufort_middle_2022/beaufort_middle_2022_row{row:02}_col{col:02}.png"
            )),
            label_path: PathBuf::from(format!(
                "index/beaufort_middle_2022/beaufort_middle_2022_row{row:02}_col{col:02}.png"
            )),
        }
    }

    #[test]
    fn save_load_round_trips_in_column_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.csv");
        let mut manifest = TileManifest::new();
        manifest.push(record(0, 0)).unwrap();
        manifest.push(record(0, 1)).unwrap();
        manifest.push(record(1, 0)).unwrap();
        manifest.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with(MANIFEST_HEADER));

        let loaded = TileManifest::load(&path).unwrap();
        assert_eq!(loaded.records(), manifest.records());
    }

    #[test]
    fn rewriting_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.csv");
        let mut manifest = TileManifest::new();
        manifest.push(record(0, 0)).unwrap();
        manifest.save(&path).unwrap();
        let first = fs::read(&path).unwrap();
        manifest.save(&path).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());
    }

    #[test]
    fn push_rejects_comma_in_path() {
        let mut manifest = TileManifest::new();
        let mut bad = record(0, 0);
        bad.image_path = PathBuf::from("image/a,b.png");
        assert!(matches!(
            manifest.push(bad),
            Err(ManifestError::ReservedCharacter { field: "image_path", .. })
        ));
    }

    #[test]
    fn load_rejects_bad_header_and_short_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.csv");
        fs::write(&path, "nope\n").unwrap();
        assert!(matches!(
            TileManifest::load(&path),
            Err(ManifestError::Parse { line: 1, .. })
        ));
        fs::write(&path, format!("{MANIFEST_HEADER}\na,0,1\n")).unwrap();
        assert!(matches!(
            TileManifest::load(&path),
            Err(ManifestError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn version_key_is_deterministic_and_config_sensitive() {
        let root = Path::new("/data/eelgrass");
        let a = TilingRunMeta::compute_version(root, "train", 512, 0.3, "0.3.1");
        let b = TilingRunMeta::compute_version(root, "train", 512, 0.3, "0.3.1");
        let c = TilingRunMeta::compute_version(root, "train", 512, 0.25, "0.3.1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
