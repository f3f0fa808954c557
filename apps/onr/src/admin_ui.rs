use axum::extract::Path;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "frontend/dist"]
struct AdminUi;

fn serve(path: &str) -> Response {
    match AdminUi::get(path).or_else(|| AdminUi::get("index.html")) {
        Some(content) => {
            let body = axum::body::Body::from(content.data);
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            let mut response = Response::new(body);
            response.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_str(mime.as_ref())
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            );
            response
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

pub async fn index() -> Response {
    serve("index.html")
}

pub async fn asset(Path(path): Path<String>) -> Response {
    serve(&format!("assets/{path}"))
}
