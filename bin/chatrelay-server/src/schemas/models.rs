use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Response body for `GET /api/models`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelsResponse {
    /// Names of the models installed on the backend.
    pub models: Vec<String>,
}
