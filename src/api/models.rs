//! HTTP contract for the upload, export, profile, and health endpoints.
//!
//! The WebSocket message vocabulary lives next to the socket handler in
//! [`super::ws`]; generation results never travel over plain HTTP.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::export::ExportRecord;

/// One stored upload, echoed back with its servable path
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadedFile {
    pub filename: String,
    /// URL path the image is served from, also the id used in generation
    /// requests and events
    pub path: String,
    pub size: u64,
}

/// One upload the server refused, with the reason
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

/// Batch upload outcome (POST /upload). Partial success is normal: good
/// files land in `files`, bad ones in `skipped`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// CSV export request (POST /export)
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default = "default_profile_id")]
    pub profile: String,
    pub records: Vec<ExportRecord>,
}

pub fn default_profile_id() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileCreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
