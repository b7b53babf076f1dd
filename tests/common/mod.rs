//! Shared fixtures for integration tests.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt;

use appboot::ProjectLayout;

/// A throwaway project directory with a manifest and config units.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create a project whose manifest declares `dependencies`.
    pub fn new(dependencies: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();

        let mut manifest = String::from("[package]\nname = \"fixture\"\n\n[dependencies]\n");
        for dep in dependencies {
            manifest.push_str(&format!("{dep} = \"1\"\n"));
        }
        fs::write(dir.path().join("Cargo.toml"), manifest).unwrap();

        Self { dir }
    }

    /// Write `config/<name>` (file name including extension).
    pub fn config(self, file: &str, content: &str) -> Self {
        self.write_config(file, content);
        self
    }

    pub fn write_config(&self, file: &str, content: &str) {
        fs::write(self.dir.path().join("config").join(file), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(self.dir.path())
    }
}

/// Send `GET path` to `router` as if it came from `peer`.
#[allow(dead_code)]
pub async fn get_from(router: &Router, path: &str, peer: &str) -> (StatusCode, String) {
    get_with_headers(router, path, peer, &[]).await
}

/// Like [`get_from`], with extra request headers.
#[allow(dead_code)]
pub async fn get_with_headers(
    router: &Router,
    path: &str,
    peer: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, String) {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut builder = Request::builder().uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Poll `check` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}
