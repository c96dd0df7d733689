use serde::{Deserialize, Serialize};

/// JSON part sent alongside the CSV file in a mass update upload.
/// Carries the option names selected by the user.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UploadOptions {
    #[serde(default)]
    pub options: Vec<String>,
}

/// Request payload for toggling a single update option.
#[derive(Debug, Deserialize, Serialize)]
pub struct ToggleOptionRequest {
    pub name: String,
    pub checked: bool,
}
