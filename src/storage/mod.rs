//! Persistence for feature tables, model and metrics artifacts.

mod artifacts;
mod feature_store;

pub use artifacts::{
    load_metrics, load_model, load_table, ArtifactStore, RegisteredModel, FEATURE_STORE_FILE,
    METRICS_FILE, MODEL_FILE, REGISTERED_MODEL_FILE,
};
pub use feature_store::FeatureStore;
