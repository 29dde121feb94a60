//! Identity shared by every persisted record.

/// A record addressed by a typed id (products, suppliers, orders, movements).
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> Self::Id;
}
