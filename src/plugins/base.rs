use crate::plugins::context::PluginContext;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// An extension unit registered with the host.
///
/// The id must be globally unique and should be namespaced
/// (e.g. `"@acme/draw"`). Both lifecycle hooks default to no-ops; a plugin
/// overrides the ones it needs. Hooks may suspend; registration resolves
/// only after `on_register` settles.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    /// Invoked once when the plugin is registered
    async fn on_register(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Invoked once when the plugin is unregistered or the host tears down
    async fn on_unregister(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// The persistence capability, when this plugin participates in
    /// workspace snapshots beyond the default state-bucket copy
    fn persistence(&self) -> Option<&dyn PluginPersistence> {
        None
    }
}

/// Optional persistence capability of a plugin.
///
/// `serialize` and `hydrate` default to the plain state-bucket behavior the
/// lifecycle manager applies for plugins without this capability; `migrate`
/// defaults to identity. The manager invokes `migrate` only for payloads
/// whose recorded version is older than [`schema_version`](Self::schema_version),
/// never redundantly.
pub trait PluginPersistence: Send + Sync {
    /// Current schema version of this plugin's persisted payload
    fn schema_version(&self) -> u32 {
        1
    }

    /// Produces the payload stored in a workspace snapshot
    fn serialize(&self, ctx: &PluginContext) -> Result<Value> {
        Ok(ctx.state().to_object())
    }

    /// Applies a (migrated) payload to the plugin's state
    fn hydrate(&self, ctx: &PluginContext, data: Value) -> Result<()> {
        ctx.state().populate_from(&data);
        Ok(())
    }

    /// Upgrades a payload recorded at `from_version` to the current schema
    fn migrate(&self, data: Value, from_version: u32) -> Result<Value> {
        let _ = from_version;
        Ok(data)
    }
}
