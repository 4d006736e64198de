// ── In-memory state ──
//
// Per-key slots with atomic snapshot publication, the recent-event ring
// and the consumer context set.

mod contexts;
mod ring;
mod slots;

pub(crate) use contexts::Contexts;
pub(crate) use ring::RecentEvents;
pub(crate) use slots::{Publish, SlotStore};
pub use slots::{Entry, Snapshot};
