/// Largest frame the bridge radio accepts in one go
pub const LINK_MTU: usize = 32;
/// `[type][length]`
pub const HEADER_LEN: usize = 2;
pub const MAX_PAYLOAD_LEN: usize = LINK_MTU - HEADER_LEN;

/// Bytes of a single control line, excluding the terminating newline
pub const LINE_CAPACITY: usize = 32;
pub const LINE_TERMINATOR: u8 = b'\n';

/// Number of slots in the interrupt → task control queue (one is kept free by the ring buffer)
pub const CONTROL_QUEUE_DEPTH: usize = 8;

/// Time the UART gets to drain the restart acknowledgement before the system goes down
pub const RESTART_GRACE_MS: u32 = 50;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

pub const QUERY_LINE: &[u8] = b"ESB\n";
pub const RESTART_ACK_LINE: &[u8] = b"RST\n";
