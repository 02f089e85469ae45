use crate::basemap::{BasemapSwapResult, BasemapTransitionController};
use crate::core::builder::HostOptions;
use crate::core::surface::MapSurface;
use crate::core::viewport::ViewportState;
use crate::errors::reporter::ErrorReporter;
use crate::events::{EventBus, HostEvent};
use crate::input::{
    CursorArbiter, InteractionEvent, InteractionModeStore, KeyEvent, KeyboardArbiter,
};
use crate::layers::registry::LayerRegistry;
use crate::net::pipeline::RequestPipeline;
use crate::persist::migrate::MigrationRegistry;
use crate::persist::serializer::{RestoreReport, StateSerializer};
use crate::plugins::base::Plugin;
use crate::plugins::manager::PluginManager;
use crate::sync::SyncCoordinator;
use crate::Result;
use std::sync::Arc;

/// The host controller: owns one map surface and coordinates every
/// registered extension.
///
/// Construction wires the components together: the cursor arbiter pushes the
/// effective cursor to the surface, handler failures anywhere flow into the
/// error reporter, and arbitration state changes are announced on the event
/// bus. The embedding shell forwards renderer pointer and key events into
/// [`handle_interaction`](Self::handle_interaction) and
/// [`handle_key`](Self::handle_key).
pub struct MapHost {
    map: Arc<dyn MapSurface>,
    options: HostOptions,
    events: EventBus,
    reporter: ErrorReporter,
    cursor: CursorArbiter,
    keyboard: KeyboardArbiter,
    modes: InteractionModeStore,
    pipeline: RequestPipeline,
    plugins: PluginManager,
    serializer: StateSerializer,
    basemap: BasemapTransitionController,
    sync: SyncCoordinator,
}

impl MapHost {
    pub fn new(map: Arc<dyn MapSurface>, layers: Arc<dyn LayerRegistry>) -> Self {
        Self::with_options(map, layers, HostOptions::default())
    }

    pub fn with_options(
        map: Arc<dyn MapSurface>,
        layers: Arc<dyn LayerRegistry>,
        options: HostOptions,
    ) -> Self {
        let events = EventBus::new();
        let reporter = ErrorReporter::new(options.error_history_cap);
        events.set_reporter(reporter.clone());
        reporter.attach_events(events.clone());

        let cursor = CursorArbiter::new();
        {
            let surface = map.clone();
            let bus = events.clone();
            cursor.set_sink(move |value| {
                surface.set_cursor(value);
                bus.emit(&HostEvent::CursorChanged {
                    cursor: value.to_string(),
                });
            });
        }

        let modes = InteractionModeStore::new();
        modes.attach_events(events.clone());

        let keyboard = KeyboardArbiter::new();
        let pipeline = RequestPipeline::new();

        let plugins = PluginManager::new(
            map.clone(),
            events.clone(),
            modes.clone(),
            cursor.clone(),
            keyboard.clone(),
            reporter.clone(),
        );

        let serializer = StateSerializer::new(
            map.clone(),
            layers,
            plugins.clone(),
            Arc::new(MigrationRegistry::builtin()),
            events.clone(),
            reporter.clone(),
        );

        let basemap =
            BasemapTransitionController::new(map.clone(), events.clone(), reporter.clone());

        let sync = SyncCoordinator::new();
        sync.attach_events(events.clone());

        Self {
            map,
            options,
            events,
            reporter,
            cursor,
            keyboard,
            modes,
            pipeline,
            plugins,
            serializer,
            basemap,
            sync,
        }
    }

    pub fn map(&self) -> &Arc<dyn MapSurface> {
        &self.map
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub fn cursor(&self) -> &CursorArbiter {
        &self.cursor
    }

    pub fn keyboard(&self) -> &KeyboardArbiter {
        &self.keyboard
    }

    pub fn modes(&self) -> &InteractionModeStore {
        &self.modes
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn serializer(&self) -> &StateSerializer {
        &self.serializer
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Registers a plugin and awaits its activation
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        self.plugins.register(plugin).await
    }

    /// Unregisters a plugin; unknown ids are a no-op
    pub async fn unregister_plugin(&self, id: &str) -> Result<()> {
        self.plugins.unregister(id).await
    }

    /// Routes a pointer interaction to the active exclusive mode.
    /// Returns whether the mode consumed it.
    pub fn handle_interaction(&self, event: &InteractionEvent) -> bool {
        self.modes.handle_interaction(event)
    }

    /// Routes a key-down event through the shortcut arbiter.
    /// Returns whether default behavior should be suppressed.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        if !self.options.keyboard_enabled {
            return false;
        }
        self.keyboard.dispatch(event)
    }

    /// Announces a view change on the bus; the embedding shell calls this
    /// when the renderer finishes a camera move.
    pub fn handle_view_changed(&self) {
        self.events.emit(&HostEvent::ViewChanged {
            viewport: ViewportState::capture(self.map.as_ref()),
        });
    }

    /// Broadcasts the current view to a sync group, skipping `origin`
    pub fn broadcast_view(&self, group: &str, origin: &str) -> usize {
        let view = ViewportState::capture(self.map.as_ref());
        self.sync.broadcast(group, origin, &view)
    }

    /// Serializes the full workspace to a JSON string
    pub fn save_workspace(&self) -> Result<String> {
        self.serializer.to_json()
    }

    /// Restores a workspace previously produced by
    /// [`save_workspace`](Self::save_workspace)
    pub fn restore_workspace(&self, json: &str) -> Result<RestoreReport> {
        self.serializer.restore_from_json(json)
    }

    /// Swaps the basemap style, preserving custom sources and layers
    pub async fn set_basemap(&self, style_url: &str) -> BasemapSwapResult {
        self.basemap.set_basemap(style_url).await
    }

    /// Tears the host down: unregisters every plugin (most recent first),
    /// destroys the keyboard arbiter and releases all cursor claims.
    /// Always completes; failures are reported, never raised.
    pub async fn teardown(&self) {
        log::info!("host teardown");
        self.plugins.teardown().await;
        self.keyboard.destroy();
        self.cursor.clear_all();
        self.modes.clear();
    }
}
