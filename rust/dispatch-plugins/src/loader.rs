// dispatch-plugins: load/unload native workflows and watch the plugin
// directory for drop-in changes (§4.E). The watch loop mirrors
// `knhk-test-cache::watcher::FileWatcher`'s shape: one `notify` watcher
// feeding a bounded channel, drained by an async loop that dispatches
// on event kind.

use crate::factory::{EntrySymbol, PluginFactory, SetLoggerSymbol, ENTRY_SYMBOL, SET_LOGGER_SYMBOL};
use dispatch_core::{CoreError, ModelRegistry, Registry};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

/// Keeps a loaded plugin's dylib mapped for as long as its workflow is
/// registered — dropping the `Library` would unmap code the workflow's
/// vtable still points into.
struct LoadedPlugin {
    _library: libloading::Library,
    workflow_name: String,
}

pub struct PluginLoader {
    plugin_dir: PathBuf,
    registry: Arc<Registry>,
    models: Arc<ModelRegistry>,
    loaded: Mutex<HashMap<PathBuf, LoadedPlugin>>,
}

fn is_plugin_artifact(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == std::env::consts::DLL_EXTENSION)
        .unwrap_or(false)
}

impl PluginLoader {
    pub fn new(
        plugin_dir: impl Into<PathBuf>,
        registry: Arc<Registry>,
        models: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            registry,
            models,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Loads every plugin artifact already present in the plugin
    /// directory at startup, skipping and logging anything that fails
    /// to load rather than aborting the rest (§4.E: a bad plugin never
    /// crashes the process).
    pub async fn scan_and_load_all(&self) -> std::io::Result<()> {
        let mut entries = tokio::fs::read_dir(&self.plugin_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_plugin_artifact(&path) {
                if let Err(err) = self.load_path(&path).await {
                    warn!(path = %path.display(), error = %err, "failed to load plugin, skipping");
                }
            }
        }
        Ok(())
    }

    /// Opens the dylib at `path`, resolves its entry symbol, builds and
    /// registers the workflow it produces. Replaces any plugin already
    /// loaded from the same path.
    pub async fn load_path(&self, path: &Path) -> Result<(), CoreError> {
        let workflow_name = unsafe {
            let library = libloading::Library::new(path)
                .map_err(|e| CoreError::PluginLoad(format!("{}: {e}", path.display())))?;

            if let Ok(set_logger) = library.get::<SetLoggerSymbol>(SET_LOGGER_SYMBOL) {
                set_logger(tracing::dispatcher::get_default(|d| d.clone()));
            }

            let entry: libloading::Symbol<EntrySymbol> =
                library.get(ENTRY_SYMBOL).map_err(|e| {
                    CoreError::PluginLoad(format!(
                        "{}: missing {} symbol: {e}",
                        path.display(),
                        String::from_utf8_lossy(ENTRY_SYMBOL)
                    ))
                })?;

            let factory_ptr = entry();
            if factory_ptr.is_null() {
                return Err(CoreError::PluginLoad(format!(
                    "{}: entry point returned null",
                    path.display()
                )));
            }
            let factory: Box<dyn PluginFactory> = Box::from_raw(factory_ptr);
            let workflow = factory.build(&self.models);
            let workflow_name = workflow.name().to_string();
            self.registry.register(workflow);

            let mut loaded = self.loaded.lock().await;
            if let Some(previous) = loaded.insert(
                path.to_path_buf(),
                LoadedPlugin {
                    _library: library,
                    workflow_name: workflow_name.clone(),
                },
            ) {
                self.registry.unregister(&previous.workflow_name);
            }
            workflow_name
        };

        info!(path = %path.display(), workflow = %workflow_name, "loaded plugin");
        Ok(())
    }

    /// Unregisters the workflow loaded from `path`, if any, and drops
    /// its dylib handle.
    pub async fn unload_path(&self, path: &Path) {
        let mut loaded = self.loaded.lock().await;
        if let Some(plugin) = loaded.remove(path) {
            self.registry.unregister(&plugin.workflow_name);
            info!(path = %path.display(), workflow = %plugin.workflow_name, "unloaded plugin");
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.try_lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Watches `plugin_dir` for new/changed/removed artifacts and keeps
    /// the registry in sync until the underlying watcher errors out or
    /// the channel closes. Runs until cancelled by its caller (the
    /// gateway spawns this as a background task and aborts it on
    /// shutdown).
    pub async fn watch(self: Arc<Self>) -> notify::Result<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(32);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.blocking_send(event);
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.plugin_dir, RecursiveMode::NonRecursive)?;

        while let Some(event) = rx.recv().await {
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    for path in &event.paths {
                        if is_plugin_artifact(path) {
                            if let Err(err) = self.load_path(path).await {
                                warn!(path = %path.display(), error = %err, "plugin reload failed, keeping previous version");
                            }
                        }
                    }
                }
                EventKind::Remove(_) => {
                    for path in &event.paths {
                        self.unload_path(path).await;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}
