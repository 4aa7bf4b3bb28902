use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Every file one request placed in the staging or output area.
///
/// Dropping the ledger deletes its files right away; handing it to
/// [`RequestFiles::defer`] postpones deletion until the response body is done.
#[derive(Debug, Default)]
pub struct RequestFiles {
    paths: Vec<PathBuf>,
}

impl RequestFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file now
    pub async fn purge(mut self) {
        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Cleaned up: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Error cleaning up {}: {}", path.display(), e),
            }
        }
    }

    /// Turn the ledger into a guard that deletes the files `grace` after it is dropped
    pub fn defer(mut self, grace: Duration) -> DeferredCleanup {
        DeferredCleanup {
            paths: std::mem::take(&mut self.paths),
            grace,
        }
    }
}

impl Drop for RequestFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove_file(&path);
        }
    }
}

/// Owned by a response body; schedules deletion when the body finishes or is dropped
#[derive(Debug)]
pub struct DeferredCleanup {
    paths: Vec<PathBuf>,
    grace: Duration,
}

impl Drop for DeferredCleanup {
    fn drop(&mut self) {
        let paths = std::mem::take(&mut self.paths);
        if paths.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let grace = self.grace;
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    for path in &paths {
                        match tokio::fs::remove_file(path).await {
                            Ok(()) => debug!("Cleaned up: {}", path.display()),
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => warn!("Error cleaning up {}: {}", path.display(), e),
                        }
                    }
                });
            }
            // No runtime left (shutdown): delete synchronously instead
            Err(_) => {
                for path in &paths {
                    remove_file(path);
                }
            }
        }
    }
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Cleaned up: {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Error cleaning up {}: {}", path.display(), e),
    }
}
