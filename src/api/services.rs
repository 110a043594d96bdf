use std::collections::HashMap;

use axum::{
    Json,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};

use super::{
    models::{
        ExportRequest, HealthResponse, ProfileCreatedResponse, SkippedFile, UploadResponse,
        UploadedFile,
    },
    state::AppState,
    utils,
};
use crate::api::error::ApiError;
use crate::export;
use crate::profiles::ProcessingProfile;

/// Batch image upload endpoint (POST /upload)
///
/// Accepts a multipart form with any number of file parts and stores each
/// accepted image under the configured upload directory. Files are judged
/// independently: a rejected file (bad extension, oversized, undecodable)
/// goes into `skipped` with a reason and never fails the batch. Stored
/// filenames are sanitized basenames; a name collision gets a random prefix
/// instead of overwriting the existing file.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload_dir = &state.config.server.upload_dir;
    let max_bytes = state.config.server.max_upload_bytes.as_usize();
    let allowed = &state.config.server.allowed_extensions;

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidPayload(format!("malformed multipart body: {e}")))?
    {
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        saw_file = true;

        let Some(filename) = utils::sanitize_filename(&original_name) else {
            skipped.push(SkippedFile {
                filename: original_name,
                reason: "unusable filename".to_string(),
            });
            continue;
        };

        let extension_ok = utils::extension_of(&filename)
            .is_some_and(|ext| allowed.iter().any(|a| a == &ext));
        if !extension_ok {
            skipped.push(SkippedFile {
                filename: original_name,
                reason: format!("extension not allowed (accepted: {})", allowed.join(", ")),
            });
            continue;
        }

        // A declared non-image media type is rejected up front; an absent or
        // unparseable one falls through to the decode check below
        let declared_image = field
            .content_type()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .is_none_or(|media_type| media_type.type_() == mime::IMAGE);
        if !declared_image {
            skipped.push(SkippedFile {
                filename: original_name,
                reason: "content type is not an image".to_string(),
            });
            continue;
        }

        let data: bytes::Bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidPayload(format!("failed to read file part: {e}")))?;

        if utils::validate_body_size(&data, max_bytes).is_err() {
            skipped.push(SkippedFile {
                filename: original_name,
                reason: format!("file exceeds {} byte limit", max_bytes),
            });
            continue;
        }

        // Decode check: the extension alone proves nothing about the bytes
        if image::load_from_memory(&data).is_err() {
            skipped.push(SkippedFile {
                filename: original_name,
                reason: "not a decodable image".to_string(),
            });
            continue;
        }

        let target = unique_target(upload_dir, &filename).await;
        let stored_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(filename);

        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;

        info!(filename = %stored_name, size = data.len(), "Image stored");
        files.push(UploadedFile {
            path: format!("/static/images/{stored_name}"),
            filename: stored_name,
            size: data.len() as u64,
        });
    }

    if !saw_file {
        return Err(ApiError::InvalidPayload(
            "no file parts in request".to_string(),
        ));
    }

    Ok((StatusCode::OK, Json(UploadResponse { files, skipped })))
}

/// Pick a path under `dir` that does not collide with an existing file
async fn unique_target(dir: &std::path::Path, filename: &str) -> std::path::PathBuf {
    let candidate = dir.join(filename);
    if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        let prefix = uuid::Uuid::new_v4().simple().to_string();
        return dir.join(format!("{}_{filename}", &prefix[..8]));
    }
    candidate
}

/// CSV export endpoint (POST /export)
///
/// Renders client-held metadata records as a downloadable CSV whose columns
/// come from the named profile.
pub async fn export_csv(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .profiles
        .get(&request.profile)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("profile {}", request.profile)))?;

    let csv = export::to_csv(&profile, &request.records);
    let filename = format!(
        "metadata_{}.csv",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    ))
}

/// Profile listing endpoint (GET /profiles)
pub async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    let profiles = state.profiles.list().await;
    (StatusCode::OK, Json(profiles))
}

/// Profile upsert endpoint (POST /profiles)
///
/// Validates and persists the profile atomically: on a persistence failure
/// the in-memory registry keeps its previous state and the client gets a 500.
pub async fn create_profile(
    State(state): State<AppState>,
    Json(profile): Json<ProcessingProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let id = profile.id.clone();
    state.profiles.upsert(profile).await.map_err(|e| {
        warn!(profile = %id, error = %e, "Profile upsert rejected");
        ApiError::from(e)
    })?;

    info!(profile = %id, "Profile stored");
    Ok((StatusCode::CREATED, Json(ProfileCreatedResponse { id })))
}

/// Health check endpoint (GET /health)
///
/// Reports per-component status: the worker pool, the profile registry, and
/// whether a server-side model credential is configured. A missing credential
/// is reported but does not degrade overall health, since clients may supply
/// their own key per request.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    components.insert("api".to_string(), "healthy".to_string());

    let workers_healthy = state.broker.health_check();
    components.insert(
        "worker_pool".to_string(),
        if workers_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
    );

    let profiles_loaded = state.profiles.count().await > 0;
    components.insert(
        "profiles".to_string(),
        if profiles_loaded {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
    );

    components.insert(
        "credential".to_string(),
        if state.config.model.api_key.is_some() {
            "configured".to_string()
        } else {
            "not_configured".to_string()
        },
    );

    let all_healthy = workers_healthy && profiles_loaded;
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "healthy".to_string()
        } else {
            "unhealthy".to_string()
        },
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
