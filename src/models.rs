/// The model registry and the data for the /v1/models endpoints.
///
/// The set of models is fixed: every request is forwarded to the same upstream, so the
/// registry only decides which identifiers we are willing to put in front of it.
use serde::{Deserialize, Serialize};

/// Model used when a chat-completions, responses or legacy request names none.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Every model identifier the relay accepts, in listing order.
pub const KNOWN_MODELS: [&str; 6] = [
    "gpt-4o-mini",
    "gpt-3.5-turbo",
    "gpt-4.1-mini",
    "gpt-4.1-nano",
    "gpt-5-mini",
    "gpt-5-nano",
];

const OWNED_BY: &str = "intapi";

pub fn is_known(id: &str) -> bool {
    KNOWN_MODELS.contains(&id)
}

pub fn list_all() -> &'static [&'static str] {
    &KNOWN_MODELS
}

pub fn default_model() -> &'static str {
    DEFAULT_MODEL
}

/// A single entry of the /v1/models listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    /// The model identifier, which can be referenced in the API endpoints.
    pub id: String,
    /// The object type, which is always "model".
    pub object: String,
    /// The organization that owns the model.
    pub owned_by: String,
}

impl Model {
    /// Looks `id` up in the registry.
    pub fn lookup(id: &str) -> Option<Self> {
        is_known(id).then(|| Model {
            id: id.to_owned(),
            object: "model".into(),
            owned_by: OWNED_BY.into(),
        })
    }
}

/// The response from the /v1/models endpoint, which is a list of models.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListModelResponse {
    /// The object type, which is always "list".
    pub object: String,
    /// A list of model objects.
    pub data: Vec<Model>,
}

impl ListModelResponse {
    pub fn from_registry() -> Self {
        let data = list_all()
            .iter()
            .filter_map(|id| Model::lookup(id))
            .collect::<Vec<_>>();
        ListModelResponse {
            object: "list".into(),
            data,
        }
    }
}
