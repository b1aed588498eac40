//! Stable integer identities used as cache keys.
//!
//! Every CPU-side resource that the renderer caches GPU state for carries one of
//! these ids. Ids are process-unique and never reused, so a cache entry keyed by
//! an id can never be confused with a later resource.

use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        impl $name {
            /// Allocates a fresh, never-before-used id.
            pub fn next() -> Self {
                Self($counter.fetch_add(1, Ordering::Relaxed))
            }

            /// Returns the raw id value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Identity of a [`Geometry`](crate::Geometry).
    GeometryId,
    NEXT_GEOMETRY_ID
);

define_id!(
    /// Identity of an [`Attribute`](crate::Attribute) object.
    ///
    /// Replacing an attribute under the same name yields a new id.
    AttributeId,
    NEXT_ATTRIBUTE_ID
);

define_id!(
    /// Identity of a CPU-side data buffer that becomes exactly one GPU buffer.
    ///
    /// Tightly packed attributes own their buffer; interleaved attributes share one.
    BufferId,
    NEXT_BUFFER_ID
);
