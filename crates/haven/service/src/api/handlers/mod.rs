//! Request handlers.

mod cases;
mod ngo;
mod roles;
mod system;
mod volunteer;

pub use cases::*;
pub use ngo::*;
pub use roles::*;
pub use system::*;
pub use volunteer::*;

use crate::error::ApiResult;
use haven_types::Principal;

/// Parse a path-supplied principal, surfacing a `VALIDATION_ERROR` on
/// malformed input.
pub(crate) fn parse_principal(raw: &str) -> ApiResult<Principal> {
    Ok(raw.parse::<Principal>()?)
}
