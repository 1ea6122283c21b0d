/*!
 * Monitoring
 * Tracing subscriber setup for binaries and tests driving the containers
 */

mod tracer;

pub use tracer::init_tracing;
