//! Session token injection into parameter slot 0.

use super::ServiceHandle;
use crate::param::{Param, ParamTypes, Params};

/// Write `handle` into slot 0 as a value input and return the rewritten
/// descriptor.
///
/// Whatever the caller put in slot 0 is discarded. Slots 1..=3 and their
/// descriptor nibbles are left exactly as given.
pub(crate) fn inject_handle(
    handle: ServiceHandle,
    param_types: ParamTypes,
    params: &mut Params,
) -> ParamTypes {
    let (a, b) = handle.to_words();
    params[0] = Param::Value { a, b };
    param_types.with_session_slot()
}
