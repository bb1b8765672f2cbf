//! # Hashgraph consensus core
//!
//! The ledger is a DAG of signed events. Each event has at most two parents:
//! a *self-parent* by the same creator and an *other-parent* by a different
//! one. Gossip history is the data structure: ordering falls out of the
//! graph itself rather than out of an extra vote exchange.
//!
//! ## How it works
//!
//! ```text
//! 1. A fixed set of N participants creates signed events; each event
//!    references the creator's previous event and one event heard from
//!    another participant.
//! 2. On insert, every event gets two participant-indexed coordinate
//!    vectors: last-ancestors ("latest event I know from participant p")
//!    and first-descendants ("earliest descendant of this event from
//!    participant p"). Ancestry queries become O(N) vector comparisons.
//! 3. x strongly-sees y when paths from x back to y pass through events of
//!    at least 2N/3 + 1 participants.
//! 4. Events are classified into rounds. The first event of a round by a
//!    given creator is a witness. A round increments exactly when an event
//!    strongly-sees a supermajority of the previous round's witnesses.
//! ```
//!
//! Witness fame voting and the final total order are a downstream pass
//! built on the predicates exposed here; this module deliberately stops at
//! rounds and witnesses.

pub(crate) mod cache;
pub mod coords;
pub mod event;
pub mod hashgraph;
pub mod peers;
pub mod round;
