use proptest::prelude::*;
use vss_access::check_paths;
use vss_types::{Path, PermissionGrant};

fn leaf_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,6}"
}

proptest! {
    /// Access all-or-none: a batch check over N paths, each
    /// independently granted or denied, succeeds iff every single path is
    /// independently granted. One denial anywhere fails the whole batch.
    #[test]
    fn batch_check_is_all_or_none(
        raw_names in prop::collection::vec(leaf_name(), 1..6),
        grants in prop::collection::vec(any::<bool>(), 1..6),
    ) {
        // Dedup names: a repeated leaf can only carry one grant decision, so
        // collisions would make the expected "all_allowed" outcome ambiguous.
        let mut seen = std::collections::HashSet::new();
        let names: Vec<String> = raw_names.into_iter().filter(|n| seen.insert(n.clone())).collect();
        let len = names.len().min(grants.len());
        let names = &names[..len];
        let grants = &grants[..len];
        prop_assume!(!names.is_empty());

        let paths: Vec<Path> = names.iter().map(|n| Path::from_canonical(&format!("Vehicle/{n}"))).collect();
        let permission_grants: Vec<PermissionGrant> = names
            .iter()
            .zip(grants.iter())
            .filter(|(_, &allowed)| allowed)
            .map(|(n, _)| PermissionGrant {
                pattern: format!("Vehicle/{n}"),
                can_read: true,
                can_write: true,
            })
            .collect();

        let all_allowed = grants.iter().all(|&g| g);
        let result = check_paths(&permission_grants, &paths, false);
        prop_assert_eq!(result.is_ok(), all_allowed);
    }
}
