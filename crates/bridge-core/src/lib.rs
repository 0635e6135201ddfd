//! Call state, audio stream buffering, tool dispatch, event routing and
//! session bookkeeping for the realtime voice bridge. The brain of the
//! system: knows about telephony frames and AI-peer events only through
//! the closed vocabularies [`voxbridge_wire_codec`] and
//! [`voxbridge_realtime_client`] define.

pub mod bridge;
pub mod call;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod stream;
pub mod task_executor;

pub use bridge::Bridge;
pub use call::{Call, CallId, CallState};
pub use context::{BridgeConfig, ServerContext};
pub use dispatcher::{FunctionCallDispatcher, PendingToolCall, Tool, ToolRegistry, DEFAULT_TOOL_TIMEOUT};
pub use error::{BridgeError, Result, RouterError};
pub use registry::SessionRegistry;
pub use stream::{AudioStreamManager, InputStream, OutputStream, StreamId};
pub use task_executor::CallTaskExecutor;
