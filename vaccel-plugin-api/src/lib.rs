//! vAccel Plugin API
//!
//! This crate defines the FFI-safe boundary between the vAccel framework and
//! its plugins. Plugin authors depend on this crate, keep a static table of
//! [`VaccelOp`] descriptors and export it with [`declare_plugin!`].
//!
//! # Example
//!
//! ```ignore
//! use vaccel_plugin_api::prelude::*;
//!
//! extern "C" fn my_noop(session: &Session) -> VaccelResult {
//!     eprintln!("noop for session {}", session.id());
//!     RResult::ROk(())
//! }
//!
//! static OPS: [VaccelOp; 1] = [VaccelOp::new(VaccelOpType::Noop, my_noop)];
//!
//! fn init(registrar: &OpRegistrarBox) -> VaccelResult {
//!     registrar.register_ops(RSlice::from_slice(&OPS))
//! }
//!
//! declare_plugin! {
//!     name: "my plugin",
//!     version: env!("CARGO_PKG_VERSION"),
//!     init: init,
//!     fini: || RResult::ROk(()),
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

use abi_stable::{
	library::RootModule, package_version_strings, sabi_types::VersionStrings,
	std_types::RString, StableAbi,
};

pub mod registrar;
pub mod types;

pub use registrar::{OpRegistrar, OpRegistrarBox, OpRegistrar_TO};
pub use types::*;

/// Version of the framework this crate describes.
///
/// Plugins report the version they were built against through
/// [`PluginModule::vaccel_version`].
pub const VACCEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
	pub use crate::registrar::{OpRegistrar, OpRegistrarBox};
	pub use crate::types::*;
	pub use crate::{declare_plugin, PluginModule, PluginModuleRef, VACCEL_VERSION};

	pub use abi_stable::std_types::{RResult, RSlice, RString};
}

/// Root module that plugins must export.
///
/// This is the plugin descriptor the host reads to identify a plugin and to
/// drive its lifecycle.
#[repr(C)]
#[derive(StableAbi)]
#[sabi(kind(Prefix(prefix_ref = PluginModuleRef)))]
#[sabi(missing_field(panic))]
pub struct PluginModule {
	/// Returns the human readable plugin name.
	pub name: extern "C" fn() -> RString,

	/// Returns the plugin version.
	pub version: extern "C" fn() -> RString,

	/// Returns the framework version the plugin was built against.
	pub vaccel_version: extern "C" fn() -> RString,

	/// Initialize the plugin.
	///
	/// Called once after the plugin is loaded and before any of its operations
	/// is dispatched. Plugins register their operations here.
	pub init: extern "C" fn(registrar: &OpRegistrarBox) -> VaccelResult,

	/// Finalize the plugin.
	///
	/// Called once before the plugin is unloaded.
	#[sabi(last_prefix_field)]
	pub fini: extern "C" fn() -> VaccelResult,
}

impl RootModule for PluginModuleRef {
	abi_stable::declare_root_module_statics! {PluginModuleRef}

	const BASE_NAME: &'static str = "vaccel_plugin";
	const NAME: &'static str = "vaccel_plugin";
	const VERSION_STRINGS: VersionStrings = package_version_strings!();
}

fn major_minor(version: &str) -> Option<(&str, &str)> {
	let mut parts = version.trim().split('.');
	let major = parts.next().filter(|part| !part.is_empty())?;
	let minor = parts.next().filter(|part| !part.is_empty())?;
	Some((major, minor))
}

/// Check whether a plugin built against `version` can be driven by this
/// framework version. Major and minor components must match.
pub fn version_compatible(version: &str) -> bool {
	match (major_minor(version), major_minor(VACCEL_VERSION)) {
		(Some(plugin), Some(host)) => plugin == host,
		_ => false,
	}
}

/// Helper macro for declaring a plugin.
///
/// This macro generates the required `get_root_module` function that
/// the host uses to load the plugin. `init` must be a
/// `fn(&OpRegistrarBox) -> VaccelResult` and `fini` a `fn() -> VaccelResult`.
///
/// # Example
///
/// ```ignore
/// declare_plugin! {
///     name: "my plugin",
///     version: "0.1",
///     init: |registrar| registrar.register_ops(RSlice::from_slice(&OPS)),
///     fini: || RResult::ROk(()),
/// }
/// ```
#[macro_export]
macro_rules! declare_plugin {
	(
        name: $name:expr,
        version: $version:expr,
        init: $init:expr,
        fini: $fini:expr $(,)?
    ) => {
		/// Plugin entry point.
		///
		/// This function is called by the host to get the plugin descriptor.
		#[::abi_stable::export_root_module]
		pub fn get_root_module() -> $crate::PluginModuleRef {
			use ::abi_stable::prefix_type::PrefixTypeTrait;

			extern "C" fn plugin_name() -> ::abi_stable::std_types::RString {
				::abi_stable::std_types::RString::from($name)
			}

			extern "C" fn plugin_version() -> ::abi_stable::std_types::RString {
				::abi_stable::std_types::RString::from($version)
			}

			extern "C" fn plugin_vaccel_version() -> ::abi_stable::std_types::RString {
				::abi_stable::std_types::RString::from($crate::VACCEL_VERSION)
			}

			extern "C" fn plugin_init(registrar: &$crate::OpRegistrarBox) -> $crate::VaccelResult {
				let init_fn: fn(&$crate::OpRegistrarBox) -> $crate::VaccelResult = $init;
				init_fn(registrar)
			}

			extern "C" fn plugin_fini() -> $crate::VaccelResult {
				let fini_fn: fn() -> $crate::VaccelResult = $fini;
				fini_fn()
			}

			$crate::PluginModule {
				name: plugin_name,
				version: plugin_version,
				vaccel_version: plugin_vaccel_version,
				init: plugin_init,
				fini: plugin_fini,
			}
			.leak_into_prefix()
		}
	};
}
