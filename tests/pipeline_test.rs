//! End-to-end pipeline tests with a scripted model and a recording notifier.
//!
//! These drive `ProcessingPipeline::process` directly: real registry, cache,
//! and preprocessing over a temp directory, with only the model call
//! substituted. No network, no sleeping (expiry is driven by a manual clock).

use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use tagmill::clock::ManualClock;
use tagmill::observability::Metrics;
use tagmill::pipeline::{
    ClassifiedError, ContentCache, ErrorKind, GenerateError, ImagePreprocessor, Metadata,
    MetadataGenerator, Notifier, ProcessingPipeline, ProcessingRequest,
};
use tagmill::profiles::{ProcessingProfile, ProfileRegistry};

/// Replays a fixed list of model responses and counts calls
struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Result<String, GenerateError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _profile: &ProcessingProfile,
        _jpeg: &[u8],
        _api_key: &str,
    ) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerateError("script exhausted".to_string())))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Recorded {
    Started(String),
    Result {
        image: String,
        cached: bool,
        metadata: Metadata,
    },
    Failed {
        image: String,
        error: ClassifiedError,
    },
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn processing_started(&self, image: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Started(image.to_string()));
    }

    async fn result(&self, image: &str, cached: bool, metadata: &Metadata) {
        self.events.lock().unwrap().push(Recorded::Result {
            image: image.to_string(),
            cached,
            metadata: metadata.clone(),
        });
    }

    async fn error(&self, image: &str, error: &ClassifiedError) {
        self.events.lock().unwrap().push(Recorded::Failed {
            image: image.to_string(),
            error: error.clone(),
        });
    }
}

fn plain_profile() -> ProcessingProfile {
    ProcessingProfile {
        id: "plain".to_string(),
        prompt: "Describe the image.".to_string(),
        required_fields: vec!["title".to_string(), "tags".to_string()],
        categories: BTreeSet::new(),
        csv_columns: vec![],
    }
}

fn wallpaper_profile() -> ProcessingProfile {
    ProcessingProfile {
        id: "wallpaper".to_string(),
        prompt: "Tag this wallpaper.".to_string(),
        required_fields: vec![
            "title".to_string(),
            "description".to_string(),
            "tags".to_string(),
            "category".to_string(),
        ],
        categories: ["Animals", "Nature", "Other"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        csv_columns: vec![],
    }
}

struct Harness {
    tmp: TempDir,
    pipeline: ProcessingPipeline,
    clock: Arc<ManualClock>,
    generator: Arc<ScriptedGenerator>,
    image_path: PathBuf,
}

impl Harness {
    fn request(&self, profile_id: &str) -> ProcessingRequest {
        ProcessingRequest {
            image_path: self.image_path.clone(),
            display_path: "/static/images/fox.png".to_string(),
            profile_id: profile_id.to_string(),
            api_key: "sk-test".to_string(),
            connection_id: Uuid::new_v4(),
        }
    }

    async fn process(&self, profile_id: &str) -> Vec<Recorded> {
        let notifier = Arc::new(RecordingNotifier::default());
        self.pipeline
            .process(self.request(profile_id), notifier.clone())
            .await;
        notifier.events()
    }
}

async fn harness(responses: Vec<Result<String, GenerateError>>) -> Harness {
    let tmp = TempDir::new().unwrap();

    let registry = Arc::new(ProfileRegistry::load(tmp.path().join("profiles.json")).unwrap());
    registry.upsert(plain_profile()).await.unwrap();
    registry.upsert(wallpaper_profile()).await.unwrap();

    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(ContentCache::new(Duration::from_secs(3600), clock.clone()));
    let generator = ScriptedGenerator::new(responses);

    let pipeline = ProcessingPipeline::new(
        registry,
        cache,
        generator.clone(),
        ImagePreprocessor::new(1024, 85),
        Arc::new(Metrics::new()),
    );

    let image_path = tmp.path().join("fox.png");
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8));
    image.save(&image_path).unwrap();

    Harness {
        tmp,
        pipeline,
        clock,
        generator,
        image_path,
    }
}

fn fox_response() -> Result<String, GenerateError> {
    Ok(r#"{
        "title": "Red Fox Resting in Snowy Forest Clearing",
        "description": "A red fox curls up on fresh snow among pine trees, a warm splash of color in a quiet winter scene.",
        "tags": "fox,red,snow,winter,forest,wildlife,animal,nature,pine,rest",
        "category": "Animals"
    }"#
    .to_string())
}

#[tokio::test]
async fn successful_run_emits_start_then_result() {
    let h = harness(vec![fox_response()]).await;

    let events = h.process("wallpaper").await;

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        Recorded::Started("/static/images/fox.png".to_string())
    );
    let Recorded::Result {
        image,
        cached,
        metadata,
    } = &events[1]
    else {
        panic!("expected a result event, got {:?}", events[1]);
    };
    assert_eq!(image, "/static/images/fox.png");
    assert!(!cached);
    assert_eq!(metadata["category"], "Animals");
    assert!(metadata["title"].contains("Red Fox"));
    assert_eq!(metadata.len(), 4);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let h = harness(vec![fox_response(), fox_response()]).await;

    let first = h.process("wallpaper").await;
    let second = h.process("wallpaper").await;

    assert!(matches!(first[1], Recorded::Result { cached: false, .. }));
    assert!(matches!(second[1], Recorded::Result { cached: true, .. }));
    assert_eq!(h.generator.calls(), 1);
}

#[tokio::test]
async fn cache_expires_after_ttl() {
    let h = harness(vec![fox_response(), fox_response()]).await;

    h.process("wallpaper").await;
    h.clock.advance(Duration::from_secs(3600));
    let events = h.process("wallpaper").await;

    assert!(matches!(events[1], Recorded::Result { cached: false, .. }));
    assert_eq!(h.generator.calls(), 2);
}

#[tokio::test]
async fn profiles_do_not_share_cache_entries() {
    let h = harness(vec![
        fox_response(),
        Ok(r#"{"title": "A fox", "tags": "fox"}"#.to_string()),
    ])
    .await;

    h.process("wallpaper").await;
    let events = h.process("plain").await;

    assert!(matches!(events[1], Recorded::Result { cached: false, .. }));
    assert_eq!(h.generator.calls(), 2);
}

#[tokio::test]
async fn unknown_category_is_rewritten_to_other() {
    let mut response = fox_response().unwrap();
    response = response.replace("Animals", "Landscapes");
    let h = harness(vec![Ok(response)]).await;

    let events = h.process("wallpaper").await;

    let Recorded::Result { metadata, .. } = &events[1] else {
        panic!("expected a result event, got {:?}", events[1]);
    };
    assert_eq!(metadata["category"], "Other");
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let h = harness(vec![Ok(
        r#"{"title": "", "category": "Animals"}"#.to_string()
    )])
    .await;

    let events = h.process("wallpaper").await;

    assert_eq!(events.len(), 2);
    let Recorded::Failed { error, .. } = &events[1] else {
        panic!("expected an error event, got {:?}", events[1]);
    };
    assert_eq!(error.category, ErrorKind::MissingFields);
    assert!(error.message.contains("title"));
    assert!(error.message.contains("description"));
    assert!(error.message.contains("tags"));
    assert!(error.retry_allowed);
}

#[tokio::test]
async fn malformed_output_is_an_error_event() {
    let h = harness(vec![Ok("this is not json".to_string())]).await;

    let events = h.process("plain").await;

    let Recorded::Failed { error, .. } = &events[1] else {
        panic!("expected an error event, got {:?}", events[1]);
    };
    assert_eq!(error.category, ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn unknown_profile_is_a_configuration_error() {
    let h = harness(vec![]).await;

    let events = h.process("nonexistent").await;

    assert_eq!(events.len(), 2);
    let Recorded::Failed { error, .. } = &events[1] else {
        panic!("expected an error event, got {:?}", events[1]);
    };
    assert_eq!(error.category, ErrorKind::Configuration);
    assert!(error.message.contains("nonexistent"));
    assert!(!error.retry_allowed);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn model_auth_failure_is_classified() {
    let h = harness(vec![Err(GenerateError(
        "HTTP 401: Incorrect API key provided".to_string(),
    ))])
    .await;

    let events = h.process("plain").await;

    assert_eq!(events.len(), 2);
    let Recorded::Failed { error, .. } = &events[1] else {
        panic!("expected an error event, got {:?}", events[1]);
    };
    assert_eq!(error.category, ErrorKind::Auth);
    assert!(!error.retry_allowed);
}

#[tokio::test]
async fn unreadable_image_reports_an_error() {
    let mut h = harness(vec![]).await;
    h.image_path = h.tmp.path().join("missing.png");

    let events = h.process("plain").await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Recorded::Started(_)));
    assert!(matches!(events[1], Recorded::Failed { .. }));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn failed_runs_are_not_cached() {
    let h = harness(vec![
        Ok("garbage".to_string()),
        Ok(r#"{"title": "A fox", "tags": "fox"}"#.to_string()),
    ])
    .await;

    let first = h.process("plain").await;
    let second = h.process("plain").await;

    assert!(matches!(first[1], Recorded::Failed { .. }));
    assert!(matches!(second[1], Recorded::Result { cached: false, .. }));
    assert_eq!(h.generator.calls(), 2);
}
