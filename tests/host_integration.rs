//! End-to-end scenarios exercising the host runtime over a headless
//! in-memory surface: plugin lifecycle, arbitration, persistence and
//! basemap swaps working together.

use async_trait::async_trait;
use maphost::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn headless_host() -> (MapHost, Arc<MemorySurface>, Arc<MemoryLayerRegistry>) {
    let surface = Arc::new(MemorySurface::new(LngLat::new(13.4, 52.5), 11.0));
    let layers = Arc::new(MemoryLayerRegistry::new());
    let host = HostBuilder::new()
        .with_surface(surface.clone())
        .with_layer_registry(layers.clone())
        .build()
        .expect("host builds");
    (host, surface, layers)
}

/// A drawing extension using the full plugin surface: an exclusive mode, a
/// hotkey, a cursor claim and bus announcements.
struct DrawPlugin {
    finished_shapes: Arc<AtomicUsize>,
}

#[async_trait]
impl Plugin for DrawPlugin {
    fn id(&self) -> &str {
        "@demo/draw"
    }

    async fn on_register(&self, ctx: &PluginContext) -> maphost::Result<()> {
        ctx.state().set("shapes", json!([]));

        let events = ctx.events().clone();
        let shapes = self.finished_shapes.clone();
        ctx.modes().register(
            "draw",
            ModeOptions {
                exclusive: true,
                priority: 10,
            },
            Some(move |_: &InteractionEvent| {
                shapes.fetch_add(1, Ordering::SeqCst);
                events.emit(&HostEvent::custom("draw:finished", json!({})));
                true
            }),
        );

        let modes = ctx.modes().clone();
        ctx.keyboard()
            .register("@demo/draw", KeyCombo::parse("Ctrl+d").unwrap(), 0, move |_| {
                modes.set_active("draw", true);
                true
            });

        ctx.cursor().set("@demo/draw", "crosshair", 10);
        Ok(())
    }

    async fn on_unregister(&self, ctx: &PluginContext) -> maphost::Result<()> {
        ctx.modes().set_active("draw", false);
        ctx.cursor().clear("@demo/draw");
        Ok(())
    }
}

#[tokio::test]
async fn test_plugin_state_bucket_serialization() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    struct StatefulPlugin;
    #[async_trait]
    impl Plugin for StatefulPlugin {
        fn id(&self) -> &str {
            "p1"
        }
        async fn on_register(&self, ctx: &PluginContext) -> maphost::Result<()> {
            ctx.state().set("foo", json!("bar"));
            Ok(())
        }
    }

    host.register_plugin(Arc::new(StatefulPlugin)).await.unwrap();
    assert_eq!(
        host.plugins().serialize_plugin("p1").unwrap(),
        json!({ "foo": "bar" })
    );
}

#[tokio::test]
async fn test_exclusive_mode_scenario() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    for id in ["inspect", "draw", "measure"] {
        host.modes().register(
            id,
            ModeOptions {
                exclusive: true,
                priority: 0,
            },
            None::<fn(&InteractionEvent) -> bool>,
        );
    }

    host.modes().set_active("inspect", true);
    host.modes().set_active("draw", true);

    assert!(!host.modes().is_active("inspect"));
    assert!(host.modes().is_active("draw"));
    assert_eq!(host.modes().active_mode(), Some("draw".to_string()));
}

#[tokio::test]
async fn test_hotkey_scenario() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    host.keyboard().register(
        "undo",
        KeyCombo::parse("Ctrl+Shift+z").unwrap(),
        0,
        move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            true
        },
    );

    assert!(host.handle_key(&KeyEvent::new("z").with_ctrl().with_shift()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Missing shift: not a match.
    assert!(!host.handle_key(&KeyEvent::new("z").with_ctrl()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_draw_plugin_full_lifecycle() {
    init_logging();
    let (host, surface, _layers) = headless_host();

    let finished = Arc::new(AtomicUsize::new(0));
    host.register_plugin(Arc::new(DrawPlugin {
        finished_shapes: finished.clone(),
    }))
    .await
    .unwrap();

    // Activation claimed the cursor through the host sink.
    assert_eq!(surface.cursor(), "crosshair");

    // Another plugin observes draw completion over the bus, never directly.
    let observed = Arc::new(AtomicUsize::new(0));
    let observed_clone = observed.clone();
    host.events()
        .on(EventKind::custom("draw:finished"), move |_| {
            observed_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    // The hotkey activates the draw mode; clicks then reach its handler.
    host.handle_key(&KeyEvent::new("d").with_ctrl());
    assert_eq!(host.modes().active_mode(), Some("draw".to_string()));
    assert!(host.handle_interaction(&InteractionEvent::click(LngLat::new(13.4, 52.5))));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    // Unregistering runs the deactivation hook, which releases everything.
    host.unregister_plugin("@demo/draw").await.unwrap();
    assert_eq!(surface.cursor(), "");
    assert_eq!(host.modes().active_mode(), None);
    assert!(!host.plugins().has("@demo/draw"));
}

#[tokio::test]
async fn test_workspace_round_trip() {
    init_logging();
    let (host, surface, layers) = headless_host();

    layers.upsert(
        LayerDescriptor::new("tracks", "line")
            .with_order(1)
            .with_opacity(0.8),
    );
    layers.upsert(LayerDescriptor::new("basemap", "raster").with_order(0));

    struct NotesPlugin;
    #[async_trait]
    impl Plugin for NotesPlugin {
        fn id(&self) -> &str {
            "@demo/notes"
        }
        async fn on_register(&self, ctx: &PluginContext) -> maphost::Result<()> {
            ctx.state().set("notes", json!(["first visit"]));
            Ok(())
        }
    }
    host.register_plugin(Arc::new(NotesPlugin)).await.unwrap();

    let saved = host.save_workspace().unwrap();

    // The user wanders off and the plugin state drifts.
    surface.set_view(LngLat::new(2.35, 48.86), 5.0);
    host.plugins()
        .hydrate_plugin("@demo/notes", json!({ "notes": ["drifted"] }), None)
        .unwrap();

    let report = host.restore_workspace(&saved).unwrap();
    assert!(report.migration.is_none());
    assert_eq!(report.plugins_hydrated, 1);

    assert_eq!(surface.center(), LngLat::new(13.4, 52.5));
    assert_eq!(surface.zoom(), 11.0);
    assert_eq!(
        host.plugins().serialize_plugin("@demo/notes").unwrap()["notes"],
        json!(["first visit"])
    );

    // Round-trip equivalence of the snapshot itself.
    let snapshot = host.serializer().serialize_state();
    let value = serde_json::to_value(&snapshot).unwrap();
    let (decoded, migration) = host.serializer().deserialize_state(value).unwrap();
    assert_eq!(decoded, snapshot);
    assert!(migration.is_none());
}

#[tokio::test]
async fn test_legacy_workspace_migrates_on_restore() {
    init_logging();
    let (host, surface, _layers) = headless_host();

    let legacy = json!({
        "version": 1,
        "viewport": { "center": [-122.4194, 37.7749], "zoom": 12.0 },
        "layers": [],
        "extensions": {}
    })
    .to_string();

    let report = host.restore_workspace(&legacy).unwrap();
    let migration = report.migration.expect("migration ran");
    assert_eq!(migration.from_version, 1);
    assert_eq!(migration.to_version, SCHEMA_VERSION);

    assert_eq!(surface.center(), LngLat::new(-122.4194, 37.7749));
    assert_eq!(surface.bearing(), 0.0);
}

#[tokio::test]
async fn test_plugin_payload_version_triggers_plugin_migration() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    struct VersionedPersistence {
        migrations: AtomicUsize,
    }
    impl PluginPersistence for VersionedPersistence {
        fn schema_version(&self) -> u32 {
            2
        }
        fn migrate(&self, mut data: Value, _from_version: u32) -> maphost::Result<Value> {
            self.migrations.fetch_add(1, Ordering::SeqCst);
            data["upgraded"] = json!(true);
            Ok(data)
        }
    }
    struct VersionedPlugin {
        persistence: VersionedPersistence,
    }
    #[async_trait]
    impl Plugin for VersionedPlugin {
        fn id(&self) -> &str {
            "@demo/versioned"
        }
        fn persistence(&self) -> Option<&dyn PluginPersistence> {
            Some(&self.persistence)
        }
    }

    let plugin = Arc::new(VersionedPlugin {
        persistence: VersionedPersistence {
            migrations: AtomicUsize::new(0),
        },
    });
    host.register_plugin(plugin.clone()).await.unwrap();

    let workspace = json!({
        "version": SCHEMA_VERSION,
        "viewport": { "center": [0.0, 0.0], "zoom": 1.0 },
        "layers": [],
        "plugins": { "@demo/versioned": { "_version": 1, "unit": "imperial" } }
    })
    .to_string();

    host.restore_workspace(&workspace).unwrap();
    assert_eq!(plugin.persistence.migrations.load(Ordering::SeqCst), 1);
    let payload = host.plugins().serialize_plugin("@demo/versioned").unwrap();
    assert_eq!(payload["upgraded"], json!(true));

    // Restoring a current-version payload must not migrate again.
    let workspace = json!({
        "version": SCHEMA_VERSION,
        "viewport": { "center": [0.0, 0.0], "zoom": 1.0 },
        "layers": [],
        "plugins": { "@demo/versioned": { "_version": 2, "unit": "metric" } }
    })
    .to_string();
    host.restore_workspace(&workspace).unwrap();
    assert_eq!(plugin.persistence.migrations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_basemap_swap_preserves_plugin_layers() {
    init_logging();
    let (host, surface, _layers) = headless_host();

    surface
        .add_source(SourceSpec::new("annotations", "geojson", Value::Null))
        .unwrap();
    for id in ["annotations-fill", "annotations-line", "annotations-labels"] {
        surface
            .add_layer(LayerSpec::new(id, "line", Some("annotations")))
            .unwrap();
    }

    let announced = Arc::new(Mutex::new(Vec::new()));
    let announced_clone = announced.clone();
    host.events().on(EventKind::BasemapChanged, move |event| {
        if let HostEvent::BasemapChanged {
            style_url,
            reapplied_layers,
        } = event
        {
            announced_clone
                .lock()
                .unwrap()
                .push((style_url.clone(), *reapplied_layers));
        }
        Ok(())
    });

    let result = host.set_basemap("https://tiles.test/dark.json").await;
    assert!(result.success);
    assert_eq!(result.reapplied_layers, 3);
    assert!(surface.has_layer("annotations-labels"));
    assert_eq!(
        *announced.lock().unwrap(),
        vec![("https://tiles.test/dark.json".to_string(), 3)]
    );

    // A failed swap surfaces as a value, and the host keeps running.
    surface.fail_next_style_swap();
    let result = host.set_basemap("https://tiles.test/broken.json").await;
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(host.reporter().count() > 0);
}

#[tokio::test]
async fn test_failed_activation_leaves_host_usable() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    struct Broken;
    #[async_trait]
    impl Plugin for Broken {
        fn id(&self) -> &str {
            "@demo/broken"
        }
        async fn on_register(&self, _ctx: &PluginContext) -> maphost::Result<()> {
            Err(HostError::Caught("missing capability".to_string()))
        }
    }

    let errors_seen = Arc::new(AtomicUsize::new(0));
    let errors_clone = errors_seen.clone();
    host.events().on(EventKind::CoreError, move |_| {
        errors_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(host.register_plugin(Arc::new(Broken)).await.is_err());
    assert!(errors_seen.load(Ordering::SeqCst) >= 1);
    assert!(!host.plugins().has("@demo/broken"));

    // Partial failure is the default mode: other plugins still register.
    let finished = Arc::new(AtomicUsize::new(0));
    host.register_plugin(Arc::new(DrawPlugin {
        finished_shapes: finished,
    }))
    .await
    .unwrap();
    assert!(host.plugins().has("@demo/draw"));
}

#[tokio::test]
async fn test_view_sync_between_hosts() {
    init_logging();
    let (host, surface, _layers) = headless_host();

    let follower_view = Arc::new(Mutex::new(None));
    let follower_clone = follower_view.clone();
    host.sync().join("linked", "follower", move |view| {
        *follower_clone.lock().unwrap() = Some(view.clone());
    });
    host.sync().join("linked", "leader", |_| {
        panic!("originator must not be notified");
    });

    surface.set_view(LngLat::new(9.99, 53.55), 13.0);
    let notified = host.broadcast_view("linked", "leader");

    assert_eq!(notified, 1);
    let view = follower_view.lock().unwrap().clone().unwrap();
    assert_eq!(view.center, LngLat::new(9.99, 53.55));
    assert_eq!(view.zoom, 13.0);
}

#[tokio::test]
async fn test_request_pipeline_chain() {
    init_logging();
    let (host, _surface, _layers) = headless_host();

    struct ApiKeyTransform;
    #[async_trait]
    impl RequestTransform for ApiKeyTransform {
        fn id(&self) -> &str {
            "api-key"
        }
        fn transform_map_request(
            &self,
            params: &RequestParameters,
            resource: ResourceType,
        ) -> Option<RequestParameters> {
            if resource != ResourceType::Tile {
                return None;
            }
            let mut next = params.clone();
            next.url = format!("{}?key=secret", params.url);
            Some(next)
        }
    }

    host.pipeline().add(Arc::new(ApiKeyTransform));
    let params = host
        .pipeline()
        .transform_map_request("https://tiles.test/1/2/3.pbf", ResourceType::Tile);
    assert_eq!(params.url, "https://tiles.test/1/2/3.pbf?key=secret");

    let untouched = host
        .pipeline()
        .transform_map_request("https://tiles.test/style.json", ResourceType::Style);
    assert_eq!(untouched.url, "https://tiles.test/style.json");
}
