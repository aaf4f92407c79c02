use glue_core::Permission;

/// Logical AND over `required`: every required permission must be granted.
///
/// An empty `required` set is always satisfied.
pub fn has_all_permissions(granted: &[Permission], required: &[Permission]) -> bool {
    required.iter().all(|r| granted.contains(r))
}
