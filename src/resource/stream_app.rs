use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Spec of a `StreamApp`: the registered image for one app name/type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamAppSpec {
    pub image: String,
    /// Property metadata published by the app; carried but not interpreted.
    #[serde(default, rename = "app-properties")]
    pub app_properties: Vec<BTreeMap<String, Value>>,
}
