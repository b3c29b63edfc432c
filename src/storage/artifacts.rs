//! Training artifacts on disk: model and metrics JSON, exported tables, model registry.

use super::FeatureStore;
use crate::error::{ChurnError, Result};
use crate::features::{FeatureTable, UserFeatureSnapshot};
use crate::model::LogisticModel;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_FILE: &str = "model.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const FEATURE_STORE_FILE: &str = "features.db";
pub const REGISTERED_MODEL_FILE: &str = "latest_model.json";

/// A registry entry written by [`ArtifactStore::register_model`].
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredModel {
    pub path: PathBuf,
    pub sha256: String,
}

pub struct ArtifactStore {
    artifacts_dir: PathBuf,
    registry_dir: PathBuf,
}

impl ArtifactStore {
    /// Create both directories if needed.
    pub fn open(artifacts_dir: &Path, registry_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(artifacts_dir)?;
        std::fs::create_dir_all(registry_dir)?;
        Ok(Self {
            artifacts_dir: artifacts_dir.to_path_buf(),
            registry_dir: registry_dir.to_path_buf(),
        })
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifacts_dir.join(MODEL_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.artifacts_dir.join(METRICS_FILE)
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{}.jsonl", name))
    }

    pub fn feature_store(&self) -> Result<FeatureStore> {
        FeatureStore::open(&self.artifacts_dir.join(FEATURE_STORE_FILE))
    }

    /// Write any fitted model as pretty JSON to `model.json`.
    pub fn save_model(&self, model: &impl Serialize) -> Result<PathBuf> {
        let path = self.model_path();
        std::fs::write(&path, serde_json::to_string_pretty(model)?)?;
        Ok(path)
    }

    pub fn load_model(&self) -> Result<LogisticModel> {
        load_model(&self.model_path())
    }

    pub fn save_metrics(&self, metrics: &BTreeMap<String, f64>) -> Result<PathBuf> {
        let path = self.metrics_path();
        std::fs::write(&path, serde_json::to_string_pretty(metrics)?)?;
        Ok(path)
    }

    pub fn load_metrics(&self) -> Result<BTreeMap<String, f64>> {
        load_metrics(&self.metrics_path())
    }

    /// Write `table` as `<name>.jsonl` and into the feature store under `name`.
    pub fn export_table(&self, name: &str, table: &FeatureTable) -> Result<PathBuf> {
        let path = self.table_path(name);
        write_jsonl(&path, table)?;
        self.feature_store()?.save_table(name, table)?;
        info!(table = name, rows = table.len(), path = %path.display(), "table exported");
        Ok(path)
    }

    /// Copy the current model into the registry and record its SHA-256 digest.
    pub fn register_model(&self) -> Result<RegisteredModel> {
        let bytes = std::fs::read(self.model_path())?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let path = self.registry_dir.join(REGISTERED_MODEL_FILE);
        std::fs::write(&path, &bytes)?;
        std::fs::write(path.with_extension("sha256"), format!("{}\n", sha256))?;
        info!(path = %path.display(), sha256 = %sha256, "model registered");
        Ok(RegisteredModel { path, sha256 })
    }
}

pub fn load_model(path: &Path) -> Result<LogisticModel> {
    if !path.exists() {
        return Err(ChurnError::Model(format!(
            "model artifact not found at {}; run training first",
            path.display()
        )));
    }
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

pub fn load_metrics(path: &Path) -> Result<BTreeMap<String, f64>> {
    let raw: BTreeMap<String, Option<f64>> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    // NaN metrics are written as null
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
        .collect())
}

fn write_jsonl(path: &Path, table: &FeatureTable) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in table.rows() {
        serde_json::to_writer(&mut w, row)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

fn read_jsonl(path: &Path) -> Result<FeatureTable> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str::<UserFeatureSnapshot>(&line)?);
    }
    Ok(FeatureTable::new(rows))
}

/// Load a feature table by extension: `.jsonl` files, or the `features` table
/// of a `.db` / `.sqlite` store.
pub fn load_table(path: &Path) -> Result<FeatureTable> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl") => read_jsonl(path),
        Some("db") | Some("sqlite") => {
            if !path.exists() {
                return Err(ChurnError::DatasetNotFound(path.to_path_buf()));
            }
            FeatureStore::open(path)?.load_table("features")
        }
        _ => Err(ChurnError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sample_row;

    #[test]
    fn metrics_round_trip_with_nan_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&dir.path().join("a"), &dir.path().join("m")).unwrap();
        let mut m = BTreeMap::new();
        m.insert("f1".to_string(), 0.5);
        m.insert("roc_auc".to_string(), f64::NAN);
        store.save_metrics(&m).unwrap();
        let back = store.load_metrics().unwrap();
        assert_eq!(back["f1"], 0.5);
        assert!(back["roc_auc"].is_nan());
    }

    #[test]
    fn exported_table_loads_from_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), &dir.path().join("registry")).unwrap();
        let table = FeatureTable::new(vec![sample_row("a", 0, 0), sample_row("b", 10, 1)]);
        let jsonl = store.export_table("features", &table).unwrap();
        assert_eq!(load_table(&jsonl).unwrap(), table);
        assert_eq!(load_table(&dir.path().join(FEATURE_STORE_FILE)).unwrap(), table);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let r = load_table(Path::new("features.parquet"));
        assert!(matches!(r, Err(ChurnError::UnsupportedFormat(_))));
    }

    #[test]
    fn registry_copy_has_digest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), &dir.path().join("registry")).unwrap();
        std::fs::write(store.model_path(), b"{}").unwrap();
        let reg = store.register_model().unwrap();
        assert_eq!(std::fs::read(&reg.path).unwrap(), b"{}");
        assert_eq!(
            reg.sha256,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }
}
