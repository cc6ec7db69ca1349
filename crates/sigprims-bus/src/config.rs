/// Default number of subscribers a single payload type may hold.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 8;

/// Controls registry sizing for a [`Bus`](crate::Bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Fixed subscriber table size for each payload type.
    pub subscriber_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}
