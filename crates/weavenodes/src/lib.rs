//! Standard executor library
//!
//! Collection of built-in executors for common operations

mod debug;
mod time;
mod transform;
mod value;

pub use debug::DebugExecutor;
pub use time::{DelayConfig, DelayExecutor};
pub use transform::{JsonParseExecutor, JsonStringifyExecutor};
pub use value::ConstantExecutor;

use weavecore::typed;
use weaveruntime::ExecutorRegistry;

/// Register all standard executors with a registry
pub fn register_all(registry: &ExecutorRegistry) {
    registry.register(debug::NODE_TYPE, DebugExecutor);
    registry.register(time::NODE_TYPE, typed(DelayExecutor));
    registry.register(transform::JSON_PARSE, JsonParseExecutor);
    registry.register(transform::JSON_STRINGIFY, JsonStringifyExecutor);
    registry.register(value::NODE_TYPE, ConstantExecutor);
}
