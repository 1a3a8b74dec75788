//! FFI-safe type definitions shared by the host and its plugins.
//!
//! All types crossing the FFI boundary must be `#[repr(C)]` and derive `StableAbi`.

use abi_stable::{
	std_types::{RResult, RString},
	StableAbi,
};
use std::fmt::{Display, Formatter};

// ============================================================================
// Errors
// ============================================================================

/// FFI-safe error type for plugin operations.
#[repr(C)]
#[derive(StableAbi, Clone, Debug, PartialEq, Eq)]
pub struct VaccelError {
	pub code: VaccelErrorCode,
	pub message: RString,
}

impl VaccelError {
	pub fn new(code: VaccelErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: RString::from(message.into()),
		}
	}

	pub fn invalid(message: impl Into<String>) -> Self {
		Self::new(VaccelErrorCode::Invalid, message)
	}

	pub fn not_supported(message: impl Into<String>) -> Self {
		Self::new(VaccelErrorCode::NotSupported, message)
	}

	pub fn backend(message: impl Into<String>) -> Self {
		Self::new(VaccelErrorCode::Backend, message)
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(VaccelErrorCode::Internal, message)
	}
}

impl Display for VaccelError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}: {}", self.code, self.message)
	}
}

impl std::error::Error for VaccelError {}

/// Error codes reported through the framework's result type.
#[repr(C)]
#[derive(StableAbi, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaccelErrorCode {
	/// Invalid argument
	Invalid,
	/// Out of memory
	NoMemory,
	/// No plugin implements the requested operation
	NotSupported,
	/// Entry already exists
	Exists,
	/// Entry does not exist
	NoEntry,
	/// Failure inside the acceleration backend
	Backend,
	/// Internal framework or plugin error
	Internal,
}

/// FFI-safe result type returned by every lifecycle callback and handler.
pub type VaccelResult = RResult<(), VaccelError>;

// ============================================================================
// Operations
// ============================================================================

/// Operation kinds known to the framework.
#[repr(u8)]
#[derive(StableAbi, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VaccelOpType {
	Noop,
	BlasSgemm,
	ImageClassify,
	ImageDetect,
	ImageSegment,
	ImagePose,
	ImageDepth,
	Exec,
	TfSessionLoad,
	TfSessionRun,
	TfSessionDelete,
	Minmax,
	FpgaArrayCopy,
	FpgaMatMul,
	FpgaParallel,
	FpgaVectorAdd,
	ExecWithResource,
	TorchJitloadForward,
	TorchSgemm,
	Opencv,
	TfliteSessionLoad,
	TfliteSessionRun,
	TfliteSessionDelete,
}

impl VaccelOpType {
	pub const ALL: [Self; 23] = [
		Self::Noop,
		Self::BlasSgemm,
		Self::ImageClassify,
		Self::ImageDetect,
		Self::ImageSegment,
		Self::ImagePose,
		Self::ImageDepth,
		Self::Exec,
		Self::TfSessionLoad,
		Self::TfSessionRun,
		Self::TfSessionDelete,
		Self::Minmax,
		Self::FpgaArrayCopy,
		Self::FpgaMatMul,
		Self::FpgaParallel,
		Self::FpgaVectorAdd,
		Self::ExecWithResource,
		Self::TorchJitloadForward,
		Self::TorchSgemm,
		Self::Opencv,
		Self::TfliteSessionLoad,
		Self::TfliteSessionRun,
		Self::TfliteSessionDelete,
	];

	/// Short name used in logs and diagnostics.
	pub const fn name(self) -> &'static str {
		match self {
			Self::Noop => "noop",
			Self::BlasSgemm => "sgemm",
			Self::ImageClassify => "image-classification",
			Self::ImageDetect => "image-detection",
			Self::ImageSegment => "image-segmentation",
			Self::ImagePose => "image-pose-estimation",
			Self::ImageDepth => "image-depth-estimation",
			Self::Exec => "exec",
			Self::TfSessionLoad => "tf-session-load",
			Self::TfSessionRun => "tf-session-run",
			Self::TfSessionDelete => "tf-session-delete",
			Self::Minmax => "minmax",
			Self::FpgaArrayCopy => "fpga-arraycopy",
			Self::FpgaMatMul => "fpga-mmult",
			Self::FpgaParallel => "fpga-parallel",
			Self::FpgaVectorAdd => "fpga-vector-add",
			Self::ExecWithResource => "exec-with-resource",
			Self::TorchJitloadForward => "torch-jitload-forward",
			Self::TorchSgemm => "torch-sgemm",
			Self::Opencv => "opencv",
			Self::TfliteSessionLoad => "tflite-session-load",
			Self::TfliteSessionRun => "tflite-session-run",
			Self::TfliteSessionDelete => "tflite-session-delete",
		}
	}
}

impl Display for VaccelOpType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Maps an operation kind to the plugin function implementing it.
///
/// Plugins keep these in a `static` table and hand a borrowed slice of it to
/// the registrar during `init`. The host copies the descriptors; the table
/// itself stays owned by the plugin.
#[repr(C)]
#[derive(StableAbi, Clone, Copy, Debug)]
pub struct VaccelOp {
	pub op_type: VaccelOpType,
	pub func: extern "C" fn(&Session) -> VaccelResult,
}

impl VaccelOp {
	pub const fn new(
		op_type: VaccelOpType,
		func: extern "C" fn(&Session) -> VaccelResult,
	) -> Self {
		Self { op_type, func }
	}
}

// ============================================================================
// Sessions
// ============================================================================

/// Host-owned session handed to operation handlers.
///
/// Plugins only ever see a shared reference and may read the identifier.
#[repr(C)]
#[derive(StableAbi, Debug)]
pub struct Session {
	id: i64,
}

impl Session {
	/// Creates a session. Only the host is expected to call this.
	pub const fn new(id: i64) -> Self {
		Self { id }
	}

	pub const fn id(&self) -> i64 {
		self.id
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn op_type_names_are_unique() {
		let mut names: Vec<&str> = VaccelOpType::ALL.iter().map(|op| op.name()).collect();
		names.sort_unstable();
		names.dedup();
		assert_eq!(names.len(), VaccelOpType::ALL.len());
	}

	#[test]
	fn op_type_display_uses_name() {
		assert_eq!(VaccelOpType::Noop.to_string(), "noop");
		assert_eq!(VaccelOpType::BlasSgemm.to_string(), "sgemm");
	}

	#[test]
	fn error_display_includes_code_and_message() {
		let error = VaccelError::not_supported("no plugin for sgemm");
		assert_eq!(error.to_string(), "NotSupported: no plugin for sgemm");
	}

	extern "C" fn succeed(_session: &Session) -> VaccelResult {
		RResult::ROk(())
	}

	#[test]
	fn op_descriptor_calls_through() {
		let op = VaccelOp::new(VaccelOpType::Noop, succeed);
		let session = Session::new(7);
		assert_eq!((op.func)(&session), RResult::ROk(()));
		assert_eq!(session.id(), 7);
	}
}
