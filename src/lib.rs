//! Template plugin for the vAccel framework.
//!
//! Registers a single no-op operation that reports the session it was called
//! for. Copy this crate as the starting point for a real acceleration plugin:
//! add descriptors to [`OPS`] and implement their handlers.

use std::io::{self, Write};

use abi_stable::std_types::{RResult, RSlice};
use tracing::{debug, trace};
use vaccel_plugin_api::{
	declare_plugin, OpRegistrarBox, Session, VaccelOp, VaccelOpType, VaccelResult,
};

/// Name reported in the plugin descriptor.
pub const PLUGIN_NAME: &str = "vAccel template plugin";

/// Version reported in the plugin descriptor.
pub const PLUGIN_VERSION: &str = "0.9";

/// Operations this plugin implements, registered during [`init`].
pub static OPS: [VaccelOp; 1] = [VaccelOp::new(VaccelOpType::Noop, my_noop_function)];

fn noop(out: &mut impl Write, session: &Session) -> VaccelResult {
	trace!(session.id = session.id(), "noop");
	// A closed stderr is not an operation failure.
	let _ = writeln!(out, "[my noop function] session: {}", session.id());

	RResult::ROk(())
}

/// Handler for [`VaccelOpType::Noop`].
pub extern "C" fn my_noop_function(session: &Session) -> VaccelResult {
	noop(&mut io::stderr().lock(), session)
}

/// Registers [`OPS`] with the host and hands back its verdict unchanged.
pub fn init(registrar: &OpRegistrarBox) -> VaccelResult {
	debug!(plugin.name = PLUGIN_NAME, ops = OPS.len(), "Registering operations");
	registrar.register_ops(RSlice::from_slice(&OPS))
}

/// Nothing is held between calls, so there is nothing to release.
pub fn fini() -> VaccelResult {
	RResult::ROk(())
}

declare_plugin! {
	name: PLUGIN_NAME,
	version: PLUGIN_VERSION,
	init: init,
	fini: fini,
}

#[cfg(test)]
mod tests {
	use super::*;
	use abi_stable::sabi_trait::TD_Opaque;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::{Arc, Mutex};
	use vaccel_plugin_api::{OpRegistrar, OpRegistrar_TO, VaccelError, VaccelErrorCode};

	/// Registrar double that records what the plugin submits.
	struct RecordingRegistrar {
		calls: Arc<AtomicUsize>,
		seen: Arc<Mutex<Vec<VaccelOpType>>>,
		reply: VaccelResult,
	}

	impl OpRegistrar for RecordingRegistrar {
		fn register_ops(&self, ops: RSlice<'_, VaccelOp>) -> VaccelResult {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen
				.lock()
				.unwrap()
				.extend(ops.iter().map(|op| op.op_type));
			self.reply.clone()
		}
	}

	fn recording(
		reply: VaccelResult,
	) -> (OpRegistrarBox, Arc<AtomicUsize>, Arc<Mutex<Vec<VaccelOpType>>>) {
		let calls = Arc::new(AtomicUsize::new(0));
		let seen = Arc::new(Mutex::new(Vec::new()));
		let registrar = OpRegistrar_TO::from_value(
			RecordingRegistrar {
				calls: Arc::clone(&calls),
				seen: Arc::clone(&seen),
				reply,
			},
			TD_Opaque,
		);
		(registrar, calls, seen)
	}

	#[test]
	fn noop_reports_session_id() {
		let session = Session::new(42);
		let mut out = Vec::new();

		assert_eq!(noop(&mut out, &session), RResult::ROk(()));
		let line = String::from_utf8(out).unwrap();
		assert_eq!(line, "[my noop function] session: 42\n");
	}

	/// Writer whose every write fails, like a closed stderr.
	struct ClosedStream;

	impl Write for ClosedStream {
		fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
			Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn noop_succeeds_when_diagnostic_write_fails() {
		assert_eq!(noop(&mut ClosedStream, &Session::new(7)), RResult::ROk(()));
	}

	#[test]
	fn noop_succeeds_for_any_session() {
		for id in [0, 1, -1, i64::MAX, i64::MIN] {
			assert_eq!(my_noop_function(&Session::new(id)), RResult::ROk(()));
		}
	}

	#[test]
	fn init_registers_whole_table_once() {
		let (registrar, calls, seen) = recording(RResult::ROk(()));

		assert_eq!(init(&registrar), RResult::ROk(()));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(*seen.lock().unwrap(), vec![VaccelOpType::Noop]);
	}

	#[test]
	fn init_passes_registration_failure_through() {
		let failure = VaccelError::new(VaccelErrorCode::Exists, "noop already registered");
		let (registrar, calls, _) = recording(RResult::RErr(failure.clone()));

		assert_eq!(init(&registrar), RResult::RErr(failure));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn fini_succeeds_without_init() {
		assert_eq!(fini(), RResult::ROk(()));
	}

	#[test]
	fn descriptor_reports_template_metadata() {
		let module = get_root_module();
		assert_eq!((module.name())().as_str(), PLUGIN_NAME);
		assert_eq!((module.version())().as_str(), PLUGIN_VERSION);
		assert_eq!(
			(module.vaccel_version())().as_str(),
			vaccel_plugin_api::VACCEL_VERSION
		);
	}

	#[test]
	fn descriptor_entry_points_match_plugin_functions() {
		let module = get_root_module();
		let (registrar, calls, _) = recording(RResult::ROk(()));

		assert_eq!((module.init())(&registrar), RResult::ROk(()));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!((module.fini())(), RResult::ROk(()));
	}
}
