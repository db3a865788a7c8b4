//! # x12-transactions
//!
//! Transaction-set projection for X12 healthcare EDI.
//!
//! Given a recognized transaction code, a projector walks the segment
//! window between ST and SE with a per-transaction state machine and
//! produces a typed semantic tree. Unknown codes keep their raw segments.
//! Projectors never abort: unexpected segments are skipped with a warning,
//! missing required segments leave defaults behind with an error recorded.

pub mod dispatch;
mod fields;
pub mod t270_271;
pub mod t276_277;
pub mod t835;
pub mod t837p;

pub use dispatch::{ProjectionContext, Projector, ProjectorRegistry};
pub use t270_271::EligibilityProjector;
pub use t276_277::ClaimStatusProjector;
pub use t835::{PlbSignConvention, RemittanceProjector};
pub use t837p::ProfessionalClaimProjector;
