//! Operation registration facility offered by the host.

use abi_stable::{
	sabi_trait,
	std_types::{RBox, RSlice},
};

use crate::types::{VaccelOp, VaccelResult};

/// FFI-safe registration facility.
///
/// The host passes one of these to a plugin's `init` entry point. The plugin
/// submits its operation table through it, usually exactly once.
#[sabi_trait]
pub trait OpRegistrar: Send + Sync {
	/// Registers every descriptor in `ops` for the calling plugin.
	///
	/// The number of registered operations is the length of the slice.
	/// Whatever this returns is what the plugin's `init` should return.
	#[sabi(last_prefix_field)]
	fn register_ops(&self, ops: RSlice<'_, VaccelOp>) -> VaccelResult;
}

/// Boxed registrar as passed across the plugin boundary.
pub type OpRegistrarBox = OpRegistrar_TO<'static, RBox<()>>;
