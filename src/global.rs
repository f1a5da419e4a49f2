//! Opt-in process-wide default router
//!
//! Nothing in the pipeline depends on this module. Applications that want a
//! single shared router install it once at startup.

use crate::core::{Level, PipelineError, Result, Router};
use std::sync::OnceLock;
use std::time::Duration;

static DEFAULT_ROUTER: OnceLock<Router> = OnceLock::new();

/// Install `router` as the process-wide default. Fails if one is already set.
pub fn set_default(router: Router) -> Result<()> {
    DEFAULT_ROUTER
        .set(router)
        .map_err(|_| PipelineError::config("global", "default router already initialized"))
}

/// The default router, if one was installed
pub fn router() -> Option<&'static Router> {
    DEFAULT_ROUTER.get()
}

/// Log through the default router. Fails with `NotStarted` if none is set.
pub fn log(name: &str, level: Level, message: impl Into<String>) -> Result<()> {
    match router() {
        Some(router) => router.log(name, level, message),
        None => Err(PipelineError::NotStarted),
    }
}

/// Close the default router.
///
/// The static is never dropped, so call this before exit to deliver buffered
/// events. Returns `true` when no router is installed.
pub fn close(timeout: Duration) -> bool {
    router().map_or(true, |router| router.close(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LevelFilter, OutputAppender, PublisherConfig};
    use crate::encoders::TextEncoder;
    use crate::outputs::MemoryOutput;

    // One test owns the process-wide slot
    #[test]
    fn test_default_router_lifecycle() {
        assert!(matches!(
            log("app", Level::Info, "before install"),
            Err(PipelineError::NotStarted)
        ));

        let output = MemoryOutput::new();
        let handle = output.handle();
        let installed = Router::builder()
            .root_level(LevelFilter::Info)
            .appender(OutputAppender::new("memory", TextEncoder::plain(), output))
            .publisher(PublisherConfig::queue())
            .build()
            .unwrap();
        set_default(installed).unwrap();

        let second = Router::builder().build().unwrap();
        assert!(set_default(second).is_err());

        log("app", Level::Info, "through the default").unwrap();
        assert!(close(Duration::from_secs(5)));
        assert!(handle.text().contains("through the default"));
        assert!(matches!(
            log("app", Level::Info, "after close"),
            Err(PipelineError::Closed)
        ));
    }
}
