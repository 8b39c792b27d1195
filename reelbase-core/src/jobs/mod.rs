//! Supervision of the aggregation job as a detached process.
//!
//! All cross-process coordination happens through three durable files in the
//! data directory: the JSON status record (atomic whole-file replace), the
//! append-only text log, and the pid file. No lock or shared memory spans
//! the serving process and the job process; whoever needs current state
//! polls the files.

pub mod controller;
pub mod probe;
pub mod status;

pub use controller::JobController;
pub use probe::{ProcessProbe, SignalProbe};
pub use status::{JobLog, StatusFile};
