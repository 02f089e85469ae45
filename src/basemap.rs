use crate::core::surface::MapSurface;
use crate::errors::{reporter::ErrorReporter, ErrorCategory, ErrorRecord, Severity};
use crate::events::{EventBus, HostEvent};
use crate::HostError;
use instant::Instant;
use std::sync::Arc;

/// Outcome of one basemap swap attempt, produced exactly once per attempt
#[derive(Debug, Clone)]
pub struct BasemapSwapResult {
    pub success: bool,
    /// Custom layers re-registered after the swap
    pub reapplied_layers: usize,
    pub duration_ms: f64,
    /// The first failure encountered, when `success` is false
    pub error: Option<ErrorRecord>,
}

/// Swaps the underlying style document while preserving the custom sources
/// and layers the host and plugins added on top of it.
///
/// The renderer destroys custom content when its style document is replaced,
/// so the controller snapshots every custom source and layer beforehand and
/// re-registers them, in their original relative order, once the new style
/// has loaded. Failures are returned as a result value, never thrown.
///
/// Concurrent calls are not deduplicated; callers serialize their own swaps.
/// There is no rollback when re-registration fails partway: remaining
/// entries are still attempted and the map keeps whatever state the renderer
/// reached.
pub struct BasemapTransitionController {
    map: Arc<dyn MapSurface>,
    events: EventBus,
    reporter: ErrorReporter,
}

impl BasemapTransitionController {
    pub fn new(map: Arc<dyn MapSurface>, events: EventBus, reporter: ErrorReporter) -> Self {
        Self {
            map,
            events,
            reporter,
        }
    }

    /// Swaps the style document underneath the running map.
    pub async fn set_basemap(&self, style_url: &str) -> BasemapSwapResult {
        let sources = self.map.custom_sources();
        let layers = self.map.custom_layers();
        let start = Instant::now();

        log::info!(
            "basemap swap to '{}' ({} sources, {} layers to preserve)",
            style_url,
            sources.len(),
            layers.len()
        );

        if let Err(error) = self.map.set_style(style_url).await {
            return self.failed(style_url, start, error);
        }
        if let Err(error) = self.map.wait_style_loaded().await {
            return self.failed(style_url, start, error);
        }

        let mut reapplied_layers = 0;
        let mut first_failure: Option<ErrorRecord> = None;

        for source in sources {
            let id = source.id.clone();
            if let Err(error) = self.map.add_source(source) {
                let source_name = format!("re-register source '{}'", id);
                self.reporter
                    .report(&source_name, ErrorCategory::Style, &error);
                first_failure.get_or_insert_with(|| self.last_record());
            }
        }
        for layer in layers {
            let id = layer.id.clone();
            match self.map.add_layer(layer) {
                Ok(()) => reapplied_layers += 1,
                Err(error) => {
                    let source_name = format!("re-register layer '{}'", id);
                    self.reporter
                        .report(&source_name, ErrorCategory::Layer, &error);
                    first_failure.get_or_insert_with(|| self.last_record());
                }
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let success = first_failure.is_none();

        if success {
            log::info!(
                "basemap swap to '{}' done in {:.1}ms, {} layers reapplied",
                style_url,
                duration_ms,
                reapplied_layers
            );
            self.events.emit(&HostEvent::BasemapChanged {
                style_url: style_url.to_string(),
                reapplied_layers,
            });
        }

        BasemapSwapResult {
            success,
            reapplied_layers,
            duration_ms,
            error: first_failure,
        }
    }

    fn failed(&self, style_url: &str, start: Instant, error: HostError) -> BasemapSwapResult {
        let error = match error {
            wrapped @ HostError::BasemapSwap(_) => wrapped,
            other => HostError::BasemapSwap(other.to_string()),
        };
        let source = format!("basemap swap to '{}'", style_url);
        self.reporter.report(&source, ErrorCategory::Style, &error);

        BasemapSwapResult {
            success: false,
            reapplied_layers: 0,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            error: Some(self.last_record()),
        }
    }

    fn last_record(&self) -> ErrorRecord {
        self.reporter.history().pop().unwrap_or(ErrorRecord {
            id: 0,
            category: ErrorCategory::Style,
            severity: Severity::Error,
            source: "basemap swap".to_string(),
            message: "unrecorded failure".to_string(),
            timestamp: std::time::SystemTime::now(),
        })
    }
}
