//! Plugin registry for loading plugins and dispatching their operations.

use abi_stable::library::{lib_header_from_path, LibraryError};
use abi_stable::sabi_trait::TD_Opaque;
use abi_stable::std_types::{RResult, RSlice};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};
use vaccel_plugin_api::{
	version_compatible, OpRegistrar, OpRegistrar_TO, PluginModuleRef, Session, VaccelError,
	VaccelOp, VaccelOpType, VaccelResult, VACCEL_VERSION,
};

/// A plugin whose `init` succeeded and whose `fini` is still pending.
pub struct LoadedPlugin {
	pub name: String,
	pub version: String,
	pub vaccel_version: String,
	fini: extern "C" fn() -> VaccelResult,
}

/// An operation descriptor together with the plugin that registered it.
#[derive(Debug, Clone)]
pub struct RegisteredOp {
	pub plugin: String,
	pub op: VaccelOp,
}

type OpTable = HashMap<VaccelOpType, Vec<RegisteredOp>>;

/// Registration facility handed to a single plugin's `init`.
struct HostRegistrar {
	plugin: String,
	table: Arc<Mutex<OpTable>>,
}

impl OpRegistrar for HostRegistrar {
	fn register_ops(&self, ops: RSlice<'_, VaccelOp>) -> VaccelResult {
		if ops.is_empty() {
			warn!(plugin.name = %self.plugin, "Plugin registered an empty operation table");
			return RResult::RErr(VaccelError::invalid("no operations to register"));
		}

		let Ok(mut table) = self.table.lock() else {
			return RResult::RErr(VaccelError::internal("operation table lock poisoned"));
		};

		for op in ops.iter() {
			debug!(plugin.name = %self.plugin, op = %op.op_type, "Registered operation");
			table.entry(op.op_type).or_default().push(RegisteredOp {
				plugin: self.plugin.clone(),
				op: *op,
			});
		}

		info!(plugin.name = %self.plugin, ops = ops.len(), "Registered plugin operations");
		RResult::ROk(())
	}
}

/// Registry for loaded plugins and the operations they implement.
pub struct PluginRegistry {
	plugins: Vec<LoadedPlugin>,
	ops: Arc<Mutex<OpTable>>,
}

impl PluginRegistry {
	/// Create a new empty plugin registry.
	pub fn new() -> Self {
		Self {
			plugins: Vec::new(),
			ops: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Load a plugin from a shared library path.
	///
	/// # Returns
	/// The plugin name if successful.
	pub fn load_plugin(&mut self, path: &Path) -> Result<String, PluginLoadError> {
		let header = lib_header_from_path(path).map_err(|e| PluginLoadError::LoadFailed {
			path: path.display().to_string(),
			source: e,
		})?;

		let module = header
			.init_root_module::<PluginModuleRef>()
			.map_err(|e| PluginLoadError::InitFailed {
				path: path.display().to_string(),
				source: e,
			})?;

		self.register_module(module)
	}

	/// Initialize an already resolved plugin module and record it.
	///
	/// Operations are only kept if the plugin's `init` succeeds.
	pub fn register_module(&mut self, module: PluginModuleRef) -> Result<String, PluginLoadError> {
		let name = (module.name())().to_string();
		let version = (module.version())().to_string();
		let vaccel_version = (module.vaccel_version())().to_string();

		if !version_compatible(&vaccel_version) {
			return Err(PluginLoadError::IncompatibleVersion {
				plugin: name,
				found: vaccel_version,
				expected: VACCEL_VERSION,
			});
		}

		if self.plugins.iter().any(|plugin| plugin.name == name) {
			return Err(PluginLoadError::AlreadyLoaded { plugin: name });
		}

		let registrar = OpRegistrar_TO::from_value(
			HostRegistrar {
				plugin: name.clone(),
				table: Arc::clone(&self.ops),
			},
			TD_Opaque,
		);

		if let Err(source) = (module.init())(&registrar).into_result() {
			self.remove_ops(&name);
			return Err(PluginLoadError::InitializationFailed {
				plugin: name,
				source,
			});
		}

		info!(
			plugin.name = %name,
			plugin.version = %version,
			plugin.vaccel_version = %vaccel_version,
			"Loaded plugin"
		);

		self.plugins.push(LoadedPlugin {
			name: name.clone(),
			version,
			vaccel_version,
			fini: module.fini(),
		});
		Ok(name)
	}

	/// Run the first handler registered for `op_type`.
	pub fn dispatch(&self, op_type: VaccelOpType, session: &Session) -> Result<(), DispatchError> {
		let handler = {
			let table = self.ops.lock().map_err(|_| DispatchError::Poisoned)?;
			table
				.get(&op_type)
				.and_then(|ops| ops.first())
				.map(|registered| registered.op.func)
		}
		.ok_or(DispatchError::Unsupported { op_type })?;

		debug!(op = %op_type, session.id = session.id(), "Dispatching operation");
		handler(session)
			.into_result()
			.map_err(|source| DispatchError::Operation { op_type, source })
	}

	/// Every registered operation, grouped by kind in registration order.
	pub fn operations(&self) -> Vec<RegisteredOp> {
		let Ok(table) = self.ops.lock() else {
			warn!("Operation table lock poisoned; reporting no operations");
			return Vec::new();
		};
		VaccelOpType::ALL
			.iter()
			.filter_map(|op_type| table.get(op_type))
			.flatten()
			.cloned()
			.collect()
	}

	/// List all loaded plugins.
	pub fn list_plugins(&self) -> impl Iterator<Item = &LoadedPlugin> {
		self.plugins.iter()
	}

	/// Finalize every loaded plugin in reverse load order.
	///
	/// Plugins are dropped from the registry afterwards, so each `fini` runs
	/// at most once.
	pub fn finalize_all(&mut self) {
		while let Some(plugin) = self.plugins.pop() {
			self.remove_ops(&plugin.name);
			match (plugin.fini)().into_result() {
				Ok(()) => info!(plugin.name = %plugin.name, "Finalized plugin"),
				Err(error) => warn!(plugin.name = %plugin.name, "Plugin finalization failed: {error}"),
			}
		}
	}

	fn remove_ops(&self, plugin: &str) {
		let Ok(mut table) = self.ops.lock() else {
			warn!(plugin.name = %plugin, "Operation table lock poisoned; operations not removed");
			return;
		};
		for ops in table.values_mut() {
			ops.retain(|registered| registered.plugin != plugin);
		}
		table.retain(|_, ops| !ops.is_empty());
	}
}

impl Default for PluginRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for PluginRegistry {
	fn drop(&mut self) {
		self.finalize_all();
	}
}

/// Errors that can occur when loading plugins.
#[derive(Debug, Error)]
pub enum PluginLoadError {
	#[error("Failed to load plugin library at {path}: {source}")]
	LoadFailed { path: String, source: LibraryError },

	#[error("Failed to initialize plugin module at {path}: {source}")]
	InitFailed { path: String, source: LibraryError },

	#[error("Plugin {plugin} targets vAccel {found}, this runner provides {expected}")]
	IncompatibleVersion {
		plugin: String,
		found: String,
		expected: &'static str,
	},

	#[error("Plugin {plugin} is already loaded")]
	AlreadyLoaded { plugin: String },

	#[error("Plugin {plugin} initialization failed: {source}")]
	InitializationFailed { plugin: String, source: VaccelError },
}

/// Errors that can occur when dispatching an operation.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("No loaded plugin implements {op_type}")]
	Unsupported { op_type: VaccelOpType },

	#[error("Operation {op_type} failed: {source}")]
	Operation {
		op_type: VaccelOpType,
		source: VaccelError,
	},

	#[error("Operation table lock poisoned")]
	Poisoned,
}
