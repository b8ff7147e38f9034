//! Statistics codecs: fixed tables of named scalar fields at constant byte
//! offsets, with a writer-side API (ordered stores over in-process shadow
//! values) and a reader-side API (volatile loads, point-in-time snapshots).
//!
//! The three scalar variants differ only in their field tables; the error
//! ring buffer, the fourth region codec, lives in [`crate::errorbuf`].

pub mod application_adapter;
pub mod buffer;
pub mod session_adapter;
pub mod session_container;

pub use application_adapter::{
    ApplicationAdapterSnapshot, ApplicationAdapterStats, MappedApplicationAdapterStats,
};
pub use buffer::{HeapBuffer, StatsBuffer};
pub use session_adapter::{
    MappedSessionAdapterStats, SessionAdapterSnapshot, SessionAdapterStats,
};
pub use session_container::{
    MappedSessionContainerStats, SessionContainerSnapshot, SessionContainerStats,
};

/// Back-pressure status flag values.
pub mod back_pressure {
    pub const NOT_BACK_PRESSURED: u32 = 0;
    pub const BACK_PRESSURED: u32 = 1;
}
