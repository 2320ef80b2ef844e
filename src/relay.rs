use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::Deserialize;
use thiserror::Error;

use crate::server::AppState;

pub static DEFAULT_FILENAME: &str = "video.mp4";
static VIDEO_CONTENT_TYPE: &str = "video/mp4";

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    url: String,
    filename: Option<String>,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid filename")]
    Filename,
    #[error("Download failed")]
    Params(#[source] QueryRejection),
    #[error("Download failed")]
    Upstream(#[source] reqwest::Error),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Filename => StatusCode::BAD_REQUEST,
            Self::Params(_) | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Stream `url` back to the client as an attachment named `filename`.
///
/// Neither the origin nor the content type of `url` is checked. The upstream
/// body is only polled when the client connection is ready for more, so a slow
/// reader holds back the upstream instead of filling memory.
pub async fn download(
    State(state): State<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, RelayError> {
    let Query(params) = params.map_err(|e| {
        tracing::warn!("malformed relay request: {}", e.body_text());
        RelayError::Params(e)
    })?;
    let filename = params
        .filename
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_owned());
    let disposition = content_disposition(&filename)?;

    let response = state
        .relay_client
        .get(&params.url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| {
            tracing::warn!(url = %params.url, "relay request failed: {e}");
            RelayError::Upstream(e)
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(VIDEO_CONTENT_TYPE));
    headers.insert(CONTENT_DISPOSITION, disposition);
    if let Some(length) = response.content_length() {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }

    let url = params.url;
    let stream = response.bytes_stream().inspect_err(move |e| {
        tracing::warn!(%url, "relay aborted mid-stream: {e}");
    });

    tracing::info!(%filename, "relaying download");
    Ok((headers, Body::from_stream(stream)).into_response())
}

fn content_disposition(filename: &str) -> Result<HeaderValue, RelayError> {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_bytes(format!("attachment; filename=\"{escaped}\"").as_bytes())
        .map_err(|_| RelayError::Filename)
}

#[cfg(test)]
mod test {
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use futures::StreamExt;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::server;

    static CLIP: &[u8] = b"\x00\x00\x00\x18ftypmp42 not really a video";

    async fn upstream() -> SocketAddr {
        let app = Router::new()
            .route("/clip.mp4", get(|| async { CLIP }))
            .route("/broken.mp4", get(broken));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    /// Promises 1000 bytes, sends a few, then fails
    async fn broken() -> impl IntoResponse {
        let chunks = futures::stream::once(async {
            Ok::<_, io::Error>(Bytes::from_static(b"partial"))
        })
        .chain(futures::stream::once(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Err(io::Error::new(io::ErrorKind::Other, "upstream went away"))
        }));
        ([(CONTENT_LENGTH, "1000")], Body::from_stream(chunks))
    }

    async fn relay(url: &str, filename: Option<&str>) -> Response {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", url);
        if let Some(filename) = filename {
            query.append_pair("filename", filename);
        }
        let request = Request::builder()
            .uri(format!("/dl?{}", query.finish()))
            .body(Body::empty())
            .unwrap();
        let state = AppState::new(&Config::default()).unwrap();
        server::router(state).oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn filename_round_trip() {
        let addr = upstream().await;
        let filename = "My Clip (720p).final.mp4";
        let response = relay(&format!("http://{addr}/clip.mp4"), Some(filename)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], VIDEO_CONTENT_TYPE);
        assert_eq!(
            response.headers()[CONTENT_LENGTH],
            CLIP.len().to_string().as_str()
        );
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION].as_bytes(),
            format!("attachment; filename=\"{filename}\"").as_bytes()
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], CLIP);
    }

    #[tokio::test]
    async fn default_filename() {
        let addr = upstream().await;
        let response = relay(&format!("http://{addr}/clip.mp4"), Some("")).await;
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"video.mp4\""
        );

        let response = relay(&format!("http://{addr}/clip.mp4"), None).await;
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"video.mp4\""
        );
    }

    #[tokio::test]
    async fn unreachable_upstream() {
        let response = relay("http://127.0.0.1:1/clip.mp4", Some("a.mp4")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(CONTENT_DISPOSITION).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Download failed");
    }

    #[tokio::test]
    async fn upstream_error_status() {
        let addr = upstream().await;
        let response = relay(&format!("http://{addr}/missing.mp4"), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn mid_stream_failure_aborts_body() {
        let addr = upstream().await;
        let response = relay(&format!("http://{addr}/broken.mp4"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "1000");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_err());
    }

    #[tokio::test]
    async fn missing_url_parameter() {
        let request = Request::builder()
            .uri("/dl?filename=a.mp4")
            .body(Body::empty())
            .unwrap();
        let state = AppState::new(&Config::default()).unwrap();
        let response = server::router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Download failed");
    }

    #[test]
    fn quoted_filenames() {
        assert_eq!(
            content_disposition(r#"a "b".mp4"#).unwrap(),
            r#"attachment; filename="a \"b\".mp4""#
        );
        assert!(matches!(
            content_disposition("evil\r\nSet-Cookie: x=1"),
            Err(RelayError::Filename)
        ));
    }
}
