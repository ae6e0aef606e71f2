//! WebSocket notification gateway.
//!
//! One connection per task id: the gateway replays the task's current
//! state as a snapshot event on connect, then relays live broker events
//! until a terminal event has been delivered or the client leaves.

mod gateway;

pub use gateway::task_ws_handler;
