//! Download endpoints. Failures answer with a bare `{"error": ...}` body.

use super::SharedApp;
use crate::Error;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

pub fn download_routes() -> Router<SharedApp> {
    Router::new()
        .route("/api/download/all", get(download_all))
        .route("/api/download/{id}", get(download_one))
}

async fn download_one(State(app): State<SharedApp>, Path(id): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid image ID");
    };

    match app.download_image(id).await {
        Ok(download) => attachment(download.content_type, &download.filename, download.data),
        Err(Error::NotFound(_)) => json_error(StatusCode::NOT_FOUND, "Image not found"),
        Err(e @ (Error::Fetch(_) | Error::Http(_))) => {
            tracing::error!("Download of {} failed: {}", id, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch image")
        }
        Err(e) => {
            tracing::error!("Download of {} failed: {}", id, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to download image")
        }
    }
}

async fn download_all(State(app): State<SharedApp>) -> Response {
    match app.export_all().await {
        Ok(export) => attachment("application/zip".to_string(), &export.filename, export.data),
        Err(Error::NotFound(_)) => json_error(StatusCode::NOT_FOUND, "No images to download"),
        Err(e) => {
            tracing::error!("Bulk download failed: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to download images")
        }
    }
}

fn attachment(content_type: String, filename: &str, data: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        data,
    )
        .into_response()
}

/// `attachment; filename="..."` with characters that cannot appear in a
/// quoted header value replaced.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::db::MockMetadataStore;
    use crate::export::MockArtifactFetcher;
    use crate::models::ProcessedImage;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use std::io::Cursor;
    use tower::ServiceExt;

    fn row(name: &str) -> ProcessedImage {
        ProcessedImage {
            id: Uuid::new_v4(),
            original_name: name.to_string(),
            original_url: format!("https://blob.test/originals/{}", name),
            processed_url: format!("https://blob.test/processed/{}", name),
            original_blob_path: format!("originals/{}", name),
            processed_blob_path: format!("processed/{}", name),
            created_at: Utc::now(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("roi_my \"best\".png"),
            "attachment; filename=\"roi_my _best_.png\""
        );
        assert_eq!(
            content_disposition("roi_café.jpg"),
            "attachment; filename=\"roi_caf_.jpg\""
        );
    }

    #[tokio::test]
    async fn test_download_returns_attachment() {
        let image = row("cat.png");
        let server = test_server(
            MockMetadataStore::new().with_row(image.clone()),
            MockArtifactFetcher::new().with_artifact(
                &image.processed_url,
                vec![1, 2, 3],
                Some("image/png"),
            ),
        );

        let response = server
            .router
            .oneshot(get(&format!("/api/download/{}", image.id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"roi_cat.png\""
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(body_bytes(response.into_body()).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_download_unknown_id_is_404() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());

        let response = server
            .router
            .oneshot(get(&format!("/api/download/{}", Uuid::new_v4())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response.into_body()).await,
            json!({"error": "Image not found"})
        );
        assert_eq!(server.fetcher.get_fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_download_malformed_id_is_400() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());

        let response = server
            .router
            .oneshot(get("/api/download/not-a-uuid"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_fetch_failure_is_500() {
        let image = row("gone.png");
        let server = test_server(
            MockMetadataStore::new().with_row(image.clone()),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .oneshot(get(&format!("/api/download/{}", image.id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response.into_body()).await,
            json!({"error": "Failed to fetch image"})
        );
    }

    #[tokio::test]
    async fn test_download_all_with_no_rows_is_404() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());

        let response = server
            .router
            .oneshot(get("/api/download/all"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response.into_body()).await,
            json!({"error": "No images to download"})
        );
    }

    #[tokio::test]
    async fn test_download_all_returns_zip() {
        let a = row("a.jpg");
        let b = row("b.jpg");
        let server = test_server(
            MockMetadataStore::new().with_row(a.clone()).with_row(b.clone()),
            MockArtifactFetcher::new()
                .with_artifact(&a.processed_url, vec![1], None)
                .with_artifact(&b.processed_url, vec![2], None),
        );

        let response = server
            .router
            .oneshot(get("/api/download/all"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"roi_images_"));

        let data = body_bytes(response.into_body()).await;
        let archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);
    }
}
