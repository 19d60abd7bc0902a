//! JSON actions over the image gallery. Every response is an
//! [`ActionResponse`] envelope.

use super::{ActionError, SharedApp};
use crate::models::{ActionResponse, DeleteReport, DownloadTarget, ProcessedImage, UploadFile};
use crate::roi::mime::{detect_image_format, mime_for_format};
use crate::Error;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

/// Multipart field carrying the uploaded files. Repeatable.
pub const UPLOAD_FIELD: &str = "files";

type ActionResult<T> = Result<Json<ActionResponse<T>>, ActionError>;

pub fn image_routes(max_upload_bytes: usize) -> Router<SharedApp> {
    Router::new()
        .route(
            "/api/images",
            get(list_images)
                .post(upload_images)
                .delete(delete_all_images),
        )
        .route("/api/images/{id}", delete(delete_image))
        .route("/api/images/{id}/download", get(resolve_download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

async fn list_images(State(app): State<SharedApp>) -> ActionResult<Vec<ProcessedImage>> {
    let images = app.list_images().await?;
    Ok(Json(ActionResponse::ok(images)))
}

async fn upload_images(
    State(app): State<SharedApp>,
    mut multipart: Multipart,
) -> ActionResult<Vec<ProcessedImage>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or("image").to_string();
        let declared_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Validation(format!("Failed to read upload {}: {}", name, e)))?;

        let content_type = declared_type.unwrap_or_else(|| sniff_content_type(&data));
        files.push(UploadFile::new(name, data.to_vec(), content_type));
    }

    tracing::info!("Received {} file(s) for upload", files.len());
    let processed = app.process_images(files).await?;
    Ok(Json(ActionResponse::ok(processed)))
}

async fn resolve_download(
    State(app): State<SharedApp>,
    Path(id): Path<String>,
) -> ActionResult<DownloadTarget> {
    let target = app.resolve_download(parse_id(&id)?).await?;
    Ok(Json(ActionResponse::ok(target)))
}

async fn delete_image(
    State(app): State<SharedApp>,
    Path(id): Path<String>,
) -> ActionResult<DeleteReport> {
    let report = app.delete_image(parse_id(&id)?).await?;
    Ok(Json(ActionResponse::ok(report)))
}

async fn delete_all_images(State(app): State<SharedApp>) -> ActionResult<DeleteReport> {
    let report = app.delete_all_images().await?;
    Ok(Json(ActionResponse::ok(report)))
}

fn parse_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|_| Error::Validation(format!("Invalid image ID: {}", raw)))
}

fn sniff_content_type(data: &[u8]) -> String {
    detect_image_format(data)
        .map(mime_for_format)
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::db::MockMetadataStore;
    use crate::export::MockArtifactFetcher;
    use crate::models::ProcessedImage;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "roi-gallery-test-boundary";

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

    fn multipart_body(parts: &[(&str, &str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, file_name, content_type, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field, file_name
                )
                .as_bytes(),
            );
            if let Some(content_type) = content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::post("/api/images")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_processes_every_file_field() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());
        let body = multipart_body(&[
            ("files", "a.jpg", Some("image/jpeg"), &b"jpeg-bytes"[..]),
            ("other", "ignored.txt", Some("text/plain"), &b"nope"[..]),
            ("files", "b.png", None, &b"\x89PNG\r\n\x1a\nrest"[..]),
        ]);

        let response = server.router.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["success"], json!(true));
        let names: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["originalName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert_eq!(server.metadata.get_rows().len(), 2);
        assert_eq!(server.blob.get_put_count(), 4);
    }

    #[tokio::test]
    async fn test_upload_without_files_is_400() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());
        let body = multipart_body(&[("other", "x.txt", None, &b"x"[..])]);

        let response = server.router.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["success"], json!(false));
        assert!(json["error"].as_str().unwrap().contains("No files provided"));
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn test_list_images_envelope() {
        let image = row("a.jpg");
        let server = test_server(
            MockMetadataStore::new().with_row(image.clone()),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .oneshot(Request::get("/api/images").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response.into_body()).await;
        assert_eq!(json["data"][0]["id"], json!(image.id.to_string()));
        assert_eq!(json["data"][0]["processedUrl"], json!(image.processed_url));
    }

    #[tokio::test]
    async fn test_list_failure_is_500_envelope() {
        let server = test_server(
            MockMetadataStore::new().with_query_failure(true),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .oneshot(Request::get("/api/images").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response.into_body()).await["success"], json!(false));
    }

    #[tokio::test]
    async fn test_resolve_download_target() {
        let image = row("a.jpg");
        let server = test_server(
            MockMetadataStore::new().with_row(image.clone()),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .oneshot(
                Request::get(format!("/api/images/{}/download", image.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response.into_body()).await,
            json!({
                "success": true,
                "data": {"url": image.processed_url, "filename": "roi_a.jpg"}
            })
        );
    }

    #[tokio::test]
    async fn test_delete_image_and_unknown_id() {
        let image = row("a.jpg");
        let server = test_server(
            MockMetadataStore::new().with_row(image.clone()),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .clone()
            .oneshot(
                Request::delete(format!("/api/images/{}", image.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response.into_body()).await["data"],
            json!({"rowsDeleted": 1, "blobsOrphaned": 0})
        );

        let response = server
            .router
            .oneshot(
                Request::delete(format!("/api/images/{}", image.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_malformed_id_is_400() {
        let server = test_server(MockMetadataStore::new(), MockArtifactFetcher::new());

        let response = server
            .router
            .oneshot(
                Request::delete("/api/images/42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_all_images() {
        let server = test_server(
            MockMetadataStore::new()
                .with_row(row("a.jpg"))
                .with_row(row("b.jpg")),
            MockArtifactFetcher::new(),
        );

        let response = server
            .router
            .oneshot(Request::delete("/api/images").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response.into_body()).await["data"]["rowsDeleted"],
            json!(2)
        );
        assert!(server.metadata.get_rows().is_empty());
    }
}
