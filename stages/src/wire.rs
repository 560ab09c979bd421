//! Request and response bodies exchanged with the analysis service.
//!
//! Every request carries `schemaVersion`. Every response carries `success`
//! plus either the stage payload or an `error`, which the service sends
//! either as a bare string or as `{ message, suggestions }`.

use petriflow_config::{SimulateConfig, ValidateConfig};
use petriflow_types::{DagProjection, IntentSpec, PetriNet, SimulationResult, ValidationResult};
use serde::{Deserialize, Serialize};

use crate::StageCallError;

/// Verifier options sent with a validate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOptions {
    pub k_bound: u32,
    pub max_millis: u64,
    pub enable_deadlock_check: bool,
    pub enable_reachability_check: bool,
}

impl From<&ValidateConfig> for ValidateOptions {
    fn from(config: &ValidateConfig) -> Self {
        Self {
            k_bound: config.k_bound,
            max_millis: config.max_millis,
            enable_deadlock_check: config.enable_deadlock_check,
            enable_reachability_check: config.enable_reachability_check,
        }
    }
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self::from(&ValidateConfig::default())
    }
}

/// Simulator options sent with a simulate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub mode: String,
    pub max_steps: u32,
    pub enable_trace: bool,
}

impl From<&SimulateConfig> for SimulateOptions {
    fn from(config: &SimulateConfig) -> Self {
        Self {
            seed: config.seed,
            mode: config.mode.clone(),
            max_steps: config.max_steps,
            enable_trace: config.enable_trace,
        }
    }
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self::from(&SimulateConfig::default())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest<'a> {
    pub text: &'a str,
    pub schema_version: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest<'a> {
    pub intent: &'a IntentSpec,
    pub schema_version: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest<'a> {
    pub petri_net: &'a PetriNet,
    pub config: &'a ValidateOptions,
    pub schema_version: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest<'a> {
    pub petri_net: &'a PetriNet,
    pub config: &'a SimulateOptions,
    pub schema_version: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagRequest<'a> {
    pub petri_net: &'a PetriNet,
    pub schema_version: &'a str,
}

/// Error payload of a failed stage call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireError {
    Message(String),
    Detailed {
        message: String,
        #[serde(default)]
        suggestions: Vec<String>,
    },
}

impl From<WireError> for StageCallError {
    fn from(error: WireError) -> Self {
        match error {
            WireError::Message(message) => StageCallError::Rejected {
                message,
                suggestions: Vec::new(),
            },
            WireError::Detailed {
                message,
                suggestions,
            } => StageCallError::Rejected {
                message,
                suggestions,
            },
        }
    }
}

/// Body of a non-2xx response, when the service explains itself.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(alias = "detail")]
    pub error: Option<WireError>,
}

/// A stage response that settles into its payload or a rejection.
pub trait StageResponse {
    type Output;

    fn settle(self) -> Result<Self::Output, StageCallError>;
}

fn settle<T>(
    success: bool,
    payload: Option<T>,
    error: Option<WireError>,
    field: &'static str,
) -> Result<T, StageCallError> {
    if let Some(error) = error.filter(|_| !success) {
        return Err(error.into());
    }
    match (success, payload) {
        (true, Some(payload)) => Ok(payload),
        (true, None) => Err(StageCallError::Decode(format!(
            "response reported success without `{field}`"
        ))),
        (false, _) => Err(StageCallError::Rejected {
            message: "the service reported failure without details".to_string(),
            suggestions: Vec::new(),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    #[serde(default)]
    pub success: bool,
    pub intent: Option<IntentSpec>,
    pub confidence: Option<f64>,
    pub error: Option<WireError>,
}

/// Successful parse payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub intent: IntentSpec,
    /// Parser confidence in `[0, 1]`, when reported.
    pub confidence: Option<f64>,
}

impl StageResponse for ParseResponse {
    type Output = ParseOutcome;

    fn settle(self) -> Result<ParseOutcome, StageCallError> {
        let confidence = self.confidence;
        settle(self.success, self.intent, self.error, "intent").map(|intent| ParseOutcome {
            intent,
            confidence,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    #[serde(default)]
    pub success: bool,
    pub petri_net: Option<PetriNet>,
    pub error: Option<WireError>,
}

impl StageResponse for BuildResponse {
    type Output = PetriNet;

    fn settle(self) -> Result<PetriNet, StageCallError> {
        settle(self.success, self.petri_net, self.error, "petriNet")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    #[serde(default)]
    pub success: bool,
    pub validation_result: Option<ValidationResult>,
    pub error: Option<WireError>,
}

impl StageResponse for ValidateResponse {
    type Output = ValidationResult;

    fn settle(self) -> Result<ValidationResult, StageCallError> {
        settle(
            self.success,
            self.validation_result,
            self.error,
            "validationResult",
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    #[serde(default)]
    pub success: bool,
    pub result: Option<SimulationResult>,
    pub error: Option<WireError>,
}

impl StageResponse for SimulateResponse {
    type Output = SimulationResult;

    fn settle(self) -> Result<SimulationResult, StageCallError> {
        settle(self.success, self.result, self.error, "result")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagResponse {
    #[serde(default)]
    pub success: bool,
    pub dag: Option<DagProjection>,
    pub error: Option<WireError>,
}

impl StageResponse for DagResponse {
    type Output = DagProjection;

    fn settle(self) -> Result<DagProjection, StageCallError> {
        settle(self.success, self.dag, self.error, "dag")
    }
}
