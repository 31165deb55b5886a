//! Matching coordinator
//!
//! Turns independently submitted "I offer X, want Y" requests into confirmed
//! pairs without a central arbiter. The only atomic primitive is a
//! single-document conditional write:
//! - **Search:** insert own Pending request, then claim the oldest older
//!   complementary Pending request
//! - **Claim:** candidate → Matched only if still Pending at the version read
//! - **Rollback:** undo the claim when the caller's own transition fails

mod core;
mod outcome;

pub use core::MatchCoordinator;
pub use outcome::SearchOutcome;
