/// Error code registry for stepstream
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 4000-4999: Execution errors
/// - 8000-8999: Event stream errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_PARSE_ERROR: u16 = 1007;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_TIMEOUT: u16 = 4002;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_SPAWN_FAILED: u16 = 4007;
    pub const EXEC_OUTPUT_ERROR: u16 = 4008;
    pub const EXEC_RESOURCE_EXHAUSTED: u16 = 4011;
    pub const EXEC_INCOMPLETE_STREAM: u16 = 4012;

    // Event stream errors (8000-8999)
    pub const EVENT_WRITE_FAILED: u16 = 8001;
    pub const EVENT_SERIALIZATION_FAILED: u16 = 8002;
    pub const EVENT_DISPLAY_FAILED: u16 = 8003;
}
