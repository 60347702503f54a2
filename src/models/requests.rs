use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    /// Optional start URL - if not provided, records against the already
    /// attached session.
    pub start_url: Option<String>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    720
}

#[derive(Debug, Deserialize, Default)]
pub struct StartReplayRequest {
    #[serde(default)]
    pub headless: bool,
}

#[derive(Debug, Deserialize)]
pub struct InsertWaitRequest {
    pub seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct InsertScreenshotRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveScriptRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadScriptRequest {
    pub path: String,
}
