//! Data collaborators: history, macro, and positioning sources, plus the
//! TTL cache that sits above them.

pub mod cache;
pub mod provider;

pub use cache::{CachedMacroProvider, Clock, ManualClock, SystemClock, TtlCache};
pub use provider::{
    ingest, DataError, HistoryProvider, MacroContextProvider, PositioningProvider, RawBar,
    StaticHistory,
};
