//! HTTP ingestion boundary
//!
//! Accepts a multipart form with a `name` field and a single `image` file,
//! hands it to the orchestrator and reports the outcome as JSON.

use crate::models::{OutcomeReport, SourceImage};
use crate::orchestrator::Orchestrator;
use crate::Error;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const ERR_FORM_NOT_PRESENT: &str = "multipart form expected, none given";
const ERR_IMAGE_MISSING: &str = r#"key "image" is missing from form files"#;
const ERR_INVALID_FILES: &str = r#"there should be exactly one file given under the "image" key"#;
const ERR_NAME_MISSING: &str = r#"key "name" is missing from form values"#;
const ERR_NAME_EMPTY: &str = r#"key "name" must not be empty"#;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub request_timeout: Duration,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", post(upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(Arc::new(state))
}

async fn health() -> &'static str {
    "ok"
}

async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<OutcomeReport>) {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            warn!("Rejected upload without multipart form: {}", e);
            return rejected(Error::InvalidInput(ERR_FORM_NOT_PRESENT.to_string()));
        }
    };

    let source = match read_form(multipart).await {
        Ok(source) => source,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            return rejected(e);
        }
    };

    match state
        .orchestrator
        .process_with_timeout(source, state.request_timeout)
        .await
    {
        Ok(outcome) => {
            let status = if outcome.is_success() {
                StatusCode::OK
            } else if outcome.is_source_rejected() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(outcome.report()))
        }
        Err(e) => rejected(e),
    }
}

fn rejected(error: Error) -> (StatusCode, Json<OutcomeReport>) {
    let status = match error {
        Error::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(OutcomeReport::rejected(&error)))
}

/// Pull `name` and exactly one `image` out of the form. Other fields are ignored.
async fn read_form(mut multipart: Multipart) -> crate::Result<SourceImage> {
    let mut name: Option<String> = None;
    let mut image: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("failed to read multipart form: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("failed to read name: {}", e)))?;
                name = Some(value);
            }
            "image" => {
                if image.is_some() {
                    return Err(Error::InvalidInput(ERR_INVALID_FILES.to_string()));
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("error reading uploaded file: {}", e)))?;
                image = Some(data);
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| Error::InvalidInput(ERR_NAME_MISSING.to_string()))?;
    if name.is_empty() {
        return Err(Error::InvalidInput(ERR_NAME_EMPTY.to_string()));
    }
    let image = image.ok_or_else(|| Error::InvalidInput(ERR_IMAGE_MISSING.to_string()))?;

    Ok(SourceImage::new(name, image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BucketConfig, MockBlobStore, Uploader};
    use crate::transform::{CodecRegistry, TransformConfig, TransformEngine};
    use axum::body::Body;
    use axum::http::{header, Request};
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "relay-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a [u8]),
    }

    fn create_test_image() -> Vec<u8> {
        let img = RgbImage::from_pixel(40, 20, image::Rgb([0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n",
                            name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn test_router(store: &MockBlobStore) -> Router {
        let engine =
            TransformEngine::new(&TransformConfig::default(), &CodecRegistry::default()).unwrap();
        let uploader = Uploader::new(Arc::new(store.clone()), &BucketConfig::default()).unwrap();
        let orchestrator = Orchestrator::new(engine, uploader, 2).unwrap();

        router(
            AppState {
                orchestrator,
                request_timeout: Duration::from_secs(30),
            },
            1024 * 1024,
        )
    }

    async fn send(app: Router, parts: &[Part<'_>]) -> (StatusCode, OutcomeReport) {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_upload_stores_both_artifacts() {
        let store = MockBlobStore::new();
        let image = create_test_image();

        let (status, report) = send(
            test_router(&store),
            &[Part::Text("name", "dress.jpg"), Part::File("image", &image)],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(report.success);
        assert_eq!(report.pipelines.len(), 2);
        assert!(store.get_object("images", "dress.jpg").is_some());
        assert!(store.get_object("thumbnails", "dress.jpg").is_some());
    }

    #[tokio::test]
    async fn test_partial_failure_returns_report() {
        let store = MockBlobStore::new().with_failing_bucket("thumbnails");
        let image = create_test_image();

        let (status, report) = send(
            test_router(&store),
            &[Part::Text("name", "dress.jpg"), Part::File("image", &image)],
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!report.success);
        assert!(report.pipelines[0].success);
        assert_eq!(report.pipelines[1].kind.as_deref(), Some("upload"));
        assert!(store.get_object("images", "dress.jpg").is_some());
    }

    #[tokio::test]
    async fn test_undecodable_image_is_unprocessable() {
        let store = MockBlobStore::new();

        let (status, report) = send(
            test_router(&store),
            &[
                Part::Text("name", "notes.txt"),
                Part::File("image", b"plain text, not pixels"),
            ],
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!report.success);
        assert!(report
            .pipelines
            .iter()
            .all(|p| p.kind.as_deref() == Some("decode")));
        assert_eq!(store.get_put_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_name_is_unprocessable() {
        let store = MockBlobStore::new();
        let image = create_test_image();

        let (status, report) = send(test_router(&store), &[Part::File("image", &image)]).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(report.error.unwrap().contains(ERR_NAME_MISSING));
        assert_eq!(store.get_put_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_is_unprocessable() {
        let store = MockBlobStore::new();
        let image = create_test_image();

        let (status, report) = send(
            test_router(&store),
            &[Part::Text("name", ""), Part::File("image", &image)],
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(report.error.unwrap().contains(ERR_NAME_EMPTY));
    }

    #[tokio::test]
    async fn test_two_images_are_rejected() {
        let store = MockBlobStore::new();
        let image = create_test_image();

        let (status, report) = send(
            test_router(&store),
            &[
                Part::Text("name", "dress.jpg"),
                Part::File("image", &image),
                Part::File("image", &image),
            ],
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(report.error.unwrap().contains(ERR_INVALID_FILES));
    }

    #[tokio::test]
    async fn test_missing_image_is_unprocessable() {
        let store = MockBlobStore::new();

        let (status, report) = send(test_router(&store), &[Part::Text("name", "dress.jpg")]).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(report.error.unwrap().contains(ERR_IMAGE_MISSING));
    }

    #[tokio::test]
    async fn test_non_multipart_request_is_unprocessable() {
        let store = MockBlobStore::new();
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = test_router(&store).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_health() {
        let store = MockBlobStore::new();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = test_router(&store).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
