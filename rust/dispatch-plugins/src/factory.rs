// dispatch-plugins: the plugin artifact contract (§6 "well-known
// exported symbol", §4.E).
//
// A plugin is a `cdylib` that exports `dispatch_plugin_entry`, returning
// a boxed `PluginFactory`. `set_logger` is optional — plugins that don't
// export it simply use their own default `tracing` subscriber, if any.

use dispatch_core::{ModelRegistry, Workflow};
use std::sync::Arc;

/// Implemented by the type a plugin's `dispatch_plugin_entry` hands
/// back. `build()` may be called more than once if the plugin is
/// reloaded without being unloaded first (shouldn't happen, but the
/// contract doesn't rely on it not happening).
pub trait PluginFactory: Send + Sync {
    /// The name the built workflow will register under. Must agree
    /// with `build().name()` — the loader trusts this value for
    /// bookkeeping before `build()` is ever called.
    fn name(&self) -> &str;

    /// Builds the workflow, resolving any `pool:<name>` model
    /// references against the gateway's configured model pools.
    fn build(&self, models: &ModelRegistry) -> Arc<dyn Workflow>;
}

/// Symbol name for a plugin's entry point. Exported as
/// `#[no_mangle] extern "C" fn dispatch_plugin_entry() -> *mut dyn PluginFactory`.
pub const ENTRY_SYMBOL: &[u8] = b"dispatch_plugin_entry";

/// Symbol name for a plugin's optional logger hookup. Exported as
/// `#[no_mangle] extern "C" fn dispatch_plugin_set_logger(tracing::Dispatch)`.
pub const SET_LOGGER_SYMBOL: &[u8] = b"dispatch_plugin_set_logger";

pub type EntrySymbol = unsafe extern "C" fn() -> *mut dyn PluginFactory;
pub type SetLoggerSymbol = unsafe extern "C" fn(tracing::Dispatch);
