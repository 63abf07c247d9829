//! Shared transposition table for parallel game-tree search
//!
//! A fixed-capacity, bit-packed hash table that many search threads probe and
//! update concurrently without locks. Lookups return a best-effort snapshot
//! plus a writer bound to one slot; the caller decides later whether to write.
//!
//! ```no_run
//! use ttable::pool::ThreadPool;
//! use ttable::types::{Bound, Move, Value};
//! use ttable::TranspositionTable;
//!
//! let pool = ThreadPool::new(4);
//! let tt = TranspositionTable::new(16, &pool);
//! tt.new_search();
//!
//! let key = 0x9E37_79B9_7F4A_7C15;
//! let probe = tt.probe(key);
//! if !probe.found {
//!     probe.writer.write(
//!         key, Value::new(35), false, Bound::Lower, 8,
//!         Move::from_u16(0x1234), Value::new(20), false, tt.generation(),
//!     );
//! }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod tt;
pub mod types;

pub use config::TtConfig;
pub use error::TtError;
pub use pool::{ThreadPool, WorkerPool};
pub use tt::{ProbeResult, ReplacementParams, TTData, TTWriter, TranspositionTable};
