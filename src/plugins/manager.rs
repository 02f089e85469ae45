use crate::core::surface::MapSurface;
use crate::errors::{reporter::ErrorReporter, ErrorCategory};
use crate::events::{EventBus, HostEvent};
use crate::input::{CursorArbiter, InteractionModeStore, KeyboardArbiter};
use crate::plugins::base::Plugin;
use crate::plugins::context::{PluginContext, StateBucket};
use crate::prelude::HashMap;
use crate::{HostError, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

struct PluginInstance {
    plugin: Arc<dyn Plugin>,
    context: PluginContext,
    active: bool,
}

#[derive(Default)]
struct Registry {
    instances: HashMap<String, PluginInstance>,
    order: Vec<String>,
}

/// Registers and unregisters extensions, drives their lifecycle hooks, owns
/// each plugin's private state bucket and applies its persistence policy.
///
/// Per-plugin lifecycle: `unregistered → activating → active → deactivating
/// → unregistered`. An instance is committed to the registry only after its
/// activation hook fully resolves, so a failed activation leaves no partial
/// entry behind. The activation window is not internally locked: issuing a
/// duplicate `register` for the same id while its activation is in flight is
/// a race the caller must avoid.
#[derive(Clone)]
pub struct PluginManager {
    registry: Arc<Mutex<Registry>>,
    map: Arc<dyn MapSurface>,
    events: EventBus,
    modes: InteractionModeStore,
    cursor: CursorArbiter,
    keyboard: KeyboardArbiter,
    reporter: ErrorReporter,
}

impl PluginManager {
    pub fn new(
        map: Arc<dyn MapSurface>,
        events: EventBus,
        modes: InteractionModeStore,
        cursor: CursorArbiter,
        keyboard: KeyboardArbiter,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            map,
            events,
            modes,
            cursor,
            keyboard,
            reporter,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build_context(&self, state: StateBucket) -> PluginContext {
        PluginContext::new(
            self.map.clone(),
            self.events.clone(),
            self.modes.clone(),
            self.cursor.clone(),
            self.keyboard.clone(),
            state,
        )
    }

    /// Registers a plugin and awaits its activation.
    ///
    /// Fails with [`HostError::DuplicateRegistration`] when the id is taken
    /// and with [`HostError::ActivationFailure`] when the activation hook
    /// errors; both are also reported centrally.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> Result<()> {
        let id = plugin.id().to_string();
        if self.registry().instances.contains_key(&id) {
            let error = HostError::DuplicateRegistration { id: id.clone() };
            self.reporter
                .report("plugin registry", ErrorCategory::Plugin, &error);
            return Err(error);
        }

        let context = self.build_context(StateBucket::new());
        log::debug!("activating plugin '{}'", id);

        if let Err(cause) = plugin.on_register(&context).await {
            let error = HostError::ActivationFailure {
                plugin_id: id.clone(),
                source: Box::new(cause),
            };
            self.reporter
                .report("plugin registry", ErrorCategory::Plugin, &error);
            return Err(error);
        }

        {
            let mut registry = self.registry();
            // Activation suspended; a concurrent duplicate may have landed.
            if registry.instances.contains_key(&id) {
                let error = HostError::DuplicateRegistration { id: id.clone() };
                self.reporter
                    .report("plugin registry", ErrorCategory::Plugin, &error);
                return Err(error);
            }
            registry.instances.insert(
                id.clone(),
                PluginInstance {
                    plugin,
                    context,
                    active: true,
                },
            );
            registry.order.push(id.clone());
        }

        log::info!("plugin '{}' registered", id);
        self.events
            .emit(&HostEvent::PluginRegistered { plugin_id: id });
        Ok(())
    }

    /// Unregisters a plugin, awaiting its deactivation hook.
    ///
    /// Unknown ids are a silent no-op. Deactivation failures are reported,
    /// never propagated: teardown always completes and the instance is
    /// always removed.
    pub async fn unregister(&self, id: &str) -> Result<()> {
        let handles = {
            let mut registry = self.registry();
            match registry.instances.get_mut(id) {
                None => {
                    log::debug!("unregister of unknown plugin '{}'", id);
                    return Ok(());
                }
                Some(instance) => {
                    instance.active = false;
                    (instance.plugin.clone(), instance.context.clone())
                }
            }
        };

        let (plugin, context) = handles;
        if let Err(cause) = plugin.on_unregister(&context).await {
            let error = HostError::DeactivationFailure {
                plugin_id: id.to_string(),
                source: Box::new(cause),
            };
            self.reporter
                .report("plugin registry", ErrorCategory::Plugin, &error);
        }

        {
            let mut registry = self.registry();
            registry.instances.remove(id);
            registry.order.retain(|entry| entry != id);
        }

        log::info!("plugin '{}' unregistered", id);
        self.events.emit(&HostEvent::PluginUnregistered {
            plugin_id: id.to_string(),
        });
        Ok(())
    }

    /// A plugin's persisted payload: its custom `serialize` when the
    /// persistence capability is present, otherwise a plain object view of
    /// its state bucket.
    pub fn serialize_plugin(&self, id: &str) -> Result<Value> {
        let (plugin, context) = self.active_handles(id)?;
        match plugin.persistence() {
            Some(persistence) => persistence.serialize(&context),
            None => Ok(context.state().to_object()),
        }
    }

    /// Applies a persisted payload to a plugin.
    ///
    /// When `from_version` is older than the plugin's declared schema
    /// version and the plugin carries the persistence capability, the
    /// payload passes through `migrate` first. A `from_version` that is
    /// absent or equal to the current schema version skips migration
    /// entirely.
    pub fn hydrate_plugin(&self, id: &str, data: Value, from_version: Option<u32>) -> Result<()> {
        let (plugin, context) = self.active_handles(id)?;
        match plugin.persistence() {
            Some(persistence) => {
                let data = match from_version {
                    Some(from) if from < persistence.schema_version() => {
                        log::debug!(
                            "migrating plugin '{}' payload from v{} to v{}",
                            id,
                            from,
                            persistence.schema_version()
                        );
                        persistence.migrate(data, from)?
                    }
                    _ => data,
                };
                persistence.hydrate(&context, data)
            }
            None => {
                if !data.is_object() && !data.is_null() {
                    return Err(HostError::InvalidConfig(format!(
                        "plugin '{}' payload is not an object",
                        id
                    )));
                }
                context.state().populate_from(&data);
                Ok(())
            }
        }
    }

    /// Ids of all registered plugins, in registration order
    pub fn all_plugins(&self) -> Vec<String> {
        self.registry().order.clone()
    }

    /// Whether a plugin id is registered
    pub fn has(&self, id: &str) -> bool {
        self.registry().instances.contains_key(id)
    }

    /// Unregisters every plugin, most recently registered first
    pub async fn teardown(&self) {
        let ids: Vec<String> = {
            let registry = self.registry();
            registry.order.iter().rev().cloned().collect()
        };
        for id in ids {
            // Errors are reported inside unregister; teardown keeps going.
            let _ = self.unregister(&id).await;
        }
    }

    fn active_handles(&self, id: &str) -> Result<(Arc<dyn Plugin>, PluginContext)> {
        let registry = self.registry();
        match registry.instances.get(id) {
            Some(instance) if instance.active => {
                Ok((instance.plugin.clone(), instance.context.clone()))
            }
            Some(_) => Err(HostError::InvalidConfig(format!(
                "plugin '{}' is deactivating",
                id
            ))),
            None => Err(HostError::InvalidConfig(format!("unknown plugin '{}'", id))),
        }
    }
}
