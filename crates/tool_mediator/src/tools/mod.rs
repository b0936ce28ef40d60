mod dyn_tool;
mod registry;
mod spec;
mod tool;


pub use dyn_tool::{DynTool, FnTool};
pub use registry::{RegisteredTool, ToolRegistry};
pub use spec::{ParamType, ParameterSpec, ToolSpec};
pub use tool::Tool;
