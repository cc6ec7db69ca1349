use crate::key::TypeKey;
use crate::registry::SubscriptionHandle;

/// Errors raised while wiring publishers and subscribers.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The subscriber table for this type is full.
    #[error("subscriber capacity exceeded for {type_name} ({capacity} slots)")]
    CapacityExceeded {
        type_name: &'static str,
        capacity: usize,
    },

    /// The handle is not (or no longer) registered.
    #[error("subscription {0:?} is not registered")]
    UnknownSubscription(SubscriptionHandle),

    /// A type already has a different key.
    #[error("type {type_name} is already keyed as {existing}, cannot rekey as {requested}")]
    KeyConflict {
        type_name: &'static str,
        existing: TypeKey,
        requested: TypeKey,
    },

    /// Two distinct types resolved to the same numeric id.
    #[error("type id {id:#010x} of {requested} is already used by {existing}")]
    IdCollision {
        id: u32,
        existing: &'static str,
        requested: &'static str,
    },

    /// The process-wide bus was configured twice.
    #[error("global bus already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, BusError>;
