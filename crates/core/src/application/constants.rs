// Probe constants (ADR: No magic values)
use std::time::Duration;

/// Default number of echo requests per probe
pub const DEFAULT_REPEAT_COUNT: u32 = 10;

/// Largest repeat count accepted at the input boundary
pub const MAX_REPEAT_COUNT: u32 = 999;

/// Grace period between SIGTERM and SIGKILL on stop (zero = kill immediately)
pub const DEFAULT_STOP_GRACE: Duration = Duration::ZERO;

/// Suffixes tried when a log file name is already taken (`_1` .. `_N`)
pub const MAX_LOG_NAME_SUFFIX: u32 = 100;

/// How long the CLI waits for sessions to unwind after a stop
pub const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
