mod cache;
pub use cache::{RunCache, TOOL_NAME};
mod invocation;
pub use invocation::BenchInvocation;
mod results;
pub use results::{Envelope, OutputOptions, RunResult};
mod runner;
pub use runner::{Benchdiff, BenchdiffBuilder, RestorePolicy};
