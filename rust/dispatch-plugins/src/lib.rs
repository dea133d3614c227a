//! Native plugin workflows: the FFI artifact contract and a directory
//! watcher that loads/unloads them into a `dispatch_core::Registry` as
//! files appear, change, or disappear.

mod factory;
mod loader;

pub use factory::{EntrySymbol, PluginFactory, SetLoggerSymbol, ENTRY_SYMBOL, SET_LOGGER_SYMBOL};
pub use loader::PluginLoader;
