mod trace_job;
mod tracer;

pub use tracer::Tracer;
