//! Per-bot agent runtime: event emitter, heartbeat, duration monitor,
//! chat drain, and the attendance lifecycle.

pub mod chat;
pub mod control_client;
pub mod duration;
pub mod emitter;
pub mod heartbeat;
pub mod retry;
pub mod runtime;

pub use control_client::{ControlPlaneClient, HeartbeatReply};
pub use emitter::{AgentEvent, EventEmitter, EventSubscriber, RpcReporter};
pub use retry::RetryPolicy;
pub use runtime::AgentRuntime;
