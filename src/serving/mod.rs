//! Single-user churn prediction over a fitted model, plus the process-wide
//! service slot installed once at startup.

use crate::config::FeatureConfig;
use crate::error::{ChurnError, Result};
use crate::events::{EventLog, RawEvent};
use crate::features::FeatureBuilder;
use crate::model::TrainedModel;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

static SERVICE: OnceLock<PredictionService> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub user_id: String,
    pub churn_probability: f64,
    pub churn_label: u8,
}

pub struct PredictionService {
    builder: FeatureBuilder,
    model: Box<dyn TrainedModel>,
    decision_threshold: f64,
}

impl PredictionService {
    pub fn new(
        feature_config: FeatureConfig,
        model: Box<dyn TrainedModel>,
        decision_threshold: f64,
    ) -> Self {
        Self {
            builder: FeatureBuilder::new(feature_config),
            model,
            decision_threshold,
        }
    }

    /// Make `service` the process-wide instance. Only the first call succeeds.
    pub fn install(service: PredictionService) -> Result<&'static PredictionService> {
        SERVICE
            .set(service)
            .map_err(|_| ChurnError::Configuration("prediction service already installed".into()))?;
        SERVICE
            .get()
            .ok_or_else(|| ChurnError::Configuration("prediction service not installed".into()))
    }

    pub fn global() -> Option<&'static PredictionService> {
        SERVICE.get()
    }

    /// Score one user's events. The batch must carry exactly one distinct userId
    /// and yield a feature row under the configured thresholds.
    pub fn predict(&self, events: &[RawEvent]) -> Result<PredictionResponse> {
        let (log, _) = EventLog::clean(events.to_vec());
        let user_id = match log.user_ids().as_slice() {
            [only] => only.to_string(),
            [] => return Err(ChurnError::InvalidRequest("no events with a userId".into())),
            many => {
                return Err(ChurnError::InvalidRequest(format!(
                    "events must belong to a single userId, got {}",
                    many.len()
                )))
            }
        };

        let table = self.builder.build(&log)?;
        // churned and label_ts are never part of the model's columns
        let x = table.design_matrix(self.model.feature_names());
        let proba = self
            .model
            .predict_proba(&x)?
            .first()
            .copied()
            .ok_or_else(|| ChurnError::Model("model returned no scores".into()))?;
        let churn_label = u8::from(proba >= self.decision_threshold);
        debug!(user_id = %user_id, proba, churn_label, "prediction");

        Ok(PredictionResponse {
            user_id,
            churn_probability: proba,
            churn_label,
        })
    }
}
