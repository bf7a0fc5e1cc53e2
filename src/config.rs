//! Connection configuration.

use std::time::Duration;

use crate::fields::FieldTable;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default capacity of the unsolicited-event queue.
///
/// The queue is a backpressure valve, not a tuning knob: once full, the
/// read loop stalls until a consumer drains it, which also stalls reply
/// delivery since both share the one read loop.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 16;

/// Default per-request wait budget.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default socket read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Tunables for one connection.
///
/// The reference deployment hard-codes all of these; here they are
/// caller-configurable with the same defaults.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Capacity of the bounded event queue.
    pub event_queue_capacity: usize,
    /// How long a `send`/`send_msg` call waits for its reply.
    pub command_timeout: Duration,
    /// Size of the buffer handed to each socket read.
    pub read_buffer_size: usize,
    /// Upper bound on one frame (header block or declared body).
    pub max_frame_size: usize,
    /// Canonical-name → field-slot table used by the normalizer.
    pub field_table: FieldTable,
}

impl ConnectionConfig {
    /// Configuration with reference defaults.
    pub fn new() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            field_table: FieldTable::default(),
        }
    }

    /// Set the event queue capacity.
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-request wait budget.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the socket read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the maximum frame size.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Swap in a custom field table.
    pub fn field_table(mut self, table: FieldTable) -> Self {
        self.field_table = table;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}
