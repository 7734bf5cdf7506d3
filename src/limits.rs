/// Largest page a list query may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Default bound on queued notifications before new ones are dropped.
pub const DEFAULT_EFFECT_QUEUE_CAPACITY: usize = 1024;

/// Per-subscriber buffer of the broadcast notifier.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// Longest notification message accepted by the notifier.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Journal appends that may wait for the writer thread before callers block.
pub const JOURNAL_QUEUE_CAPACITY: usize = 4096;
