use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use std::path::{Path, PathBuf};

/// Map a request path onto a file below `root`.
///
/// Hidden files and parent-directory segments are refused, which keeps
/// server-side settings next to the client files out of reach.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}index.html")
    } else {
        relative.to_string()
    };

    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment.starts_with('.') || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// Serve the web client from `static_dir`
pub async fn serve_static(uri: Uri, static_dir: Option<PathBuf>) -> Response {
    let Some(dir) = static_dir else {
        return not_found();
    };
    let Some(file_path) = resolve(&dir, uri.path()) else {
        return not_found();
    };

    match tokio::fs::read(&file_path).await {
        Ok(content) => {
            let mime = from_path(&file_path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                Body::from(content),
            )
                .into_response()
        }
        Err(_) => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index() {
        let root = Path::new("/srv/speedtest");
        assert_eq!(
            resolve(root, "/"),
            Some(PathBuf::from("/srv/speedtest/index.html"))
        );
        assert_eq!(
            resolve(root, "/results/"),
            Some(PathBuf::from("/srv/speedtest/results/index.html"))
        );
    }

    #[test]
    fn test_resolve_rejects_hidden_and_parent_segments() {
        let root = Path::new("/srv/speedtest");
        assert_eq!(resolve(root, "/../etc/passwd"), None);
        assert_eq!(resolve(root, "/.env"), None);
        assert_eq!(resolve(root, "/assets/.git/config"), None);
        assert_eq!(resolve(root, "/a//b.js"), None);
        assert_eq!(resolve(root, "/a\\..\\b"), None);
    }

    #[tokio::test]
    async fn test_serve_static_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("speedtest.js"), "var s;").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();

        let root = Some(dir.path().to_path_buf());
        let ok = serve_static("/speedtest.js".parse().unwrap(), root.clone()).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(ok.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .contains("javascript"));

        let hidden = serve_static("/.env".parse().unwrap(), root.clone()).await;
        assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

        let missing = serve_static("/missing.html".parse().unwrap(), root).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let disabled = serve_static("/speedtest.js".parse().unwrap(), None).await;
        assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
    }
}
