//! # matrixauth-core
//!
//! The permission graph, the identity equivalence policy, and the
//! authorization matrix with its decision algorithm.
//!
//! A check walks the implication chain of the requested permission, most
//! specific first, and grants as soon as one permission in the chain is held:
//!
//! ```text
//! Job/Discover ──▶ Job/Read ──▶ Overall/Administer
//! ```
//!
//! Disabled permissions are skipped, and a dangerous permission is only ever
//! satisfied through Administer unless the process-wide escape hatch is set.

pub mod identity;
pub mod matrix;
pub mod registry;
pub mod standard;
pub mod traits;

pub use identity::{CaseInsensitive, CaseSensitive, IdStrategy, IdentityPolicy};
pub use matrix::{AuthorizationMatrix, MatrixBuilder, MatrixCell, MatrixContext};
pub use registry::{PermissionRegistry, PermissionRegistryBuilder};
pub use traits::{Acl, AuthorizationContainer};

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use matrixauth_contracts::{
        AuthorizationType, Decision, EngineSettings, Permission, PermissionEntry, PermissionSpec,
        ANONYMOUS,
    };
    use proptest::prelude::*;

    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn context() -> MatrixContext {
        MatrixContext::default()
    }

    fn permission(context: &MatrixContext, id: &str) -> Permission {
        context.registry().permission(id).unwrap()
    }

    fn escape_hatch_context() -> MatrixContext {
        let settings = EngineSettings {
            enable_dangerous_permissions: true,
            ..EngineSettings::default()
        };
        MatrixContext::from_settings(&settings)
    }

    // ── Implication ──────────────────────────────────────────────────────────

    #[test]
    fn administer_implies_item_permissions() {
        let ctx = context();
        let admin = ctx.registry().administer().clone();
        let matrix = ctx.builder().with(&admin, PermissionEntry::user("root")).build();

        for id in [standard::ITEM_BUILD, standard::ITEM_DISCOVER, standard::COMPUTER_CONNECT] {
            assert!(matrix.has_permission("root", &permission(&ctx, id), true), "{id}");
        }
        assert!(!matrix.has_permission("root", &permission(&ctx, standard::RUN_ARTIFACTS), true));
    }

    #[test]
    fn item_read_implies_discover_but_not_build() {
        let ctx = context();
        let read = permission(&ctx, standard::ITEM_READ);
        let matrix = ctx.builder().with(&read, PermissionEntry::group("devs")).build();

        assert!(matrix.has_permission("devs", &permission(&ctx, standard::ITEM_DISCOVER), false));
        assert!(!matrix.has_permission("devs", &permission(&ctx, standard::ITEM_BUILD), false));
    }

    #[test]
    fn grants_on_disabled_permissions_are_inert() {
        let ctx = context();
        let system_read = permission(&ctx, standard::SYSTEM_READ);
        let matrix = ctx.builder().with(&system_read, PermissionEntry::user("alice")).build();

        assert!(!matrix.has_permission("alice", &system_read, true));
        assert!(!matrix.has_explicit_permission("alice", &system_read));
    }

    // ── Entry types ──────────────────────────────────────────────────────────

    #[test]
    fn either_entries_match_users_and_groups() {
        let ctx = context();
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx.builder().with(&build, PermissionEntry::either("alice")).build();

        assert!(matrix.has_permission("alice", &build, true));
        assert!(matrix.has_permission("alice", &build, false));
    }

    #[test]
    fn user_entries_match_only_as_principal() {
        let ctx = context();
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx.builder().with(&build, PermissionEntry::user("alice")).build();

        assert!(matrix.has_permission("alice", &build, true));
        assert!(!matrix.has_permission("alice", &build, false));
    }

    #[test]
    fn sid_comparison_follows_identity_policy() {
        let strict = MatrixContext::new(
            Arc::new(PermissionRegistry::standard()),
            IdentityPolicy::new(Arc::new(CaseSensitive), Arc::new(CaseSensitive)),
        );
        let build = permission(&strict, standard::ITEM_BUILD);
        let matrix = strict.builder().with(&build, PermissionEntry::user("Alice")).build();
        assert!(!matrix.has_permission("alice", &build, true));

        let relaxed = context();
        let build = permission(&relaxed, standard::ITEM_BUILD);
        let matrix = relaxed.builder().with(&build, PermissionEntry::user("Alice")).build();
        assert!(matrix.has_permission("alice", &build, true));
    }

    // ── Dangerous permissions ────────────────────────────────────────────────

    #[test]
    fn dangerous_permission_requires_administer() {
        let ctx = context();
        let run_scripts = permission(&ctx, standard::RUN_SCRIPTS);
        let admin = ctx.registry().administer().clone();

        let direct = ctx.builder().with(&run_scripts, PermissionEntry::user("mallory")).build();
        assert!(!direct.has_permission("mallory", &run_scripts, true));
        assert!(!direct.has_explicit_permission("mallory", &run_scripts));
        assert!(direct.has_explicit_entry(&PermissionEntry::user("mallory"), &run_scripts));

        let elevated = direct.to_builder().with(&admin, PermissionEntry::user("mallory")).build();
        assert!(elevated.has_permission("mallory", &run_scripts, true));
    }

    #[test]
    fn escape_hatch_lets_direct_dangerous_grants_through() {
        let ctx = escape_hatch_context();
        let run_scripts = permission(&ctx, standard::RUN_SCRIPTS);
        let matrix = ctx.builder().with(&run_scripts, PermissionEntry::user("mallory")).build();

        assert!(matrix.has_permission("mallory", &run_scripts, true));
        assert!(matrix.has_explicit_permission("mallory", &run_scripts));
    }

    // ── Explicit checks ──────────────────────────────────────────────────────

    #[test]
    fn explicit_permission_does_not_walk_implication() {
        let ctx = context();
        let admin = ctx.registry().administer().clone();
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx.builder().with(&admin, PermissionEntry::user("root")).build();

        assert!(matrix.has_explicit_permission("root", &admin));
        assert!(!matrix.has_explicit_permission("root", &build));
    }

    #[test]
    fn explicit_permission_ignores_entry_type() {
        let ctx = context();
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx.builder().with(&build, PermissionEntry::group("devs")).build();

        assert!(matrix.has_explicit_permission("DEVS", &build));
    }

    #[test]
    fn explicit_entry_requires_exact_type() {
        let ctx = context();
        let build = permission(&ctx, standard::COMPUTER_BUILD);
        let matrix = ctx.builder().with(&build, PermissionEntry::user(ANONYMOUS)).build();

        assert!(matrix.has_explicit_entry(&PermissionEntry::user(ANONYMOUS), &build));
        assert!(!matrix.has_explicit_entry(&PermissionEntry::group(ANONYMOUS), &build));
        assert!(!matrix.has_explicit_entry(&PermissionEntry::either(ANONYMOUS), &build));
    }

    // ── Enumeration ──────────────────────────────────────────────────────────

    #[test]
    fn granted_sids_exclude_anonymous_and_collapse_equivalents() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx
            .builder()
            .with(&read, PermissionEntry::user(ANONYMOUS))
            .with(&read, PermissionEntry::user("bob"))
            .with(&build, PermissionEntry::group("Admins"))
            .with(&build, PermissionEntry::user("alice"))
            .with(&build, PermissionEntry::either("BOB"))
            .build();

        let sids = matrix.all_granted_sids();
        assert_eq!(sids.len(), 3);
        assert_eq!(sids[0], "Admins");
        assert_eq!(sids[1], "alice");
        assert!(sids[2].eq_ignore_ascii_case("bob"));
        assert!(matrix.sids().contains(ANONYMOUS));
    }

    #[test]
    fn groups_come_from_non_user_entries() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let matrix = ctx
            .builder()
            .with(&read, PermissionEntry::user("alice"))
            .with(&read, PermissionEntry::group("devs"))
            .with(&read, PermissionEntry::either("ops"))
            .build();

        assert_eq!(matrix.groups(), vec!["devs".to_string(), "ops".to_string()]);
    }

    #[test]
    fn all_permission_entries_is_a_union() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let build = permission(&ctx, standard::ITEM_BUILD);
        let matrix = ctx
            .builder()
            .with(&read, PermissionEntry::user("alice"))
            .with(&build, PermissionEntry::user("alice"))
            .with(&build, PermissionEntry::either("ops"))
            .build();

        let entries = matrix.all_permission_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.kind() == AuthorizationType::Either));
    }

    // ── Builder and cell ─────────────────────────────────────────────────────

    #[test]
    fn adding_twice_is_idempotent() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let matrix = ctx
            .builder()
            .with(&read, PermissionEntry::user("alice"))
            .with(&read, PermissionEntry::user("alice"))
            .build();

        assert_eq!(matrix.grants(&read).count(), 1);
    }

    #[test]
    fn cell_grant_is_copy_on_write() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let cell = MatrixCell::new(AuthorizationMatrix::empty(ctx.clone()));

        let before = cell.load();
        cell.grant(&read, PermissionEntry::user("alice"));
        let after = cell.load();

        assert!(!before.has_permission("alice", &read, true));
        assert!(after.has_permission("alice", &read, true));
        assert_eq!(after.all_granted_sids(), vec!["alice".to_string()]);
    }

    #[test]
    fn matrix_is_an_acl() {
        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let matrix: Arc<dyn Acl> =
            Arc::new(ctx.builder().with(&read, PermissionEntry::user("alice")).build());

        assert_eq!(matrix.decide("alice", &read, true), Decision::Grant);
        assert_eq!(matrix.decide("bob", &read, true), Decision::Abstain);
    }

    #[test]
    fn custom_permissions_join_the_graph() {
        let mut builder = standard::builder();
        let admin = builder.administer().clone();
        let custom = builder
            .register(PermissionSpec::new("org.example.Deploy", "Deploy", "Production").implied_by(&admin))
            .unwrap();
        let registry = Arc::new(builder.build());
        let ctx = MatrixContext::new(Arc::clone(&registry), IdentityPolicy::default());

        let matrix = ctx.builder().with(&admin, PermissionEntry::user("root")).build();
        assert!(matrix.has_permission("root", &custom, true));
        assert_eq!(registry.find("Deploy/Production"), Some(&custom));
    }

    // ── Concurrency ──────────────────────────────────────────────────────────

    #[test]
    fn readers_see_whole_snapshots_while_grants_land() {
        const READERS: usize = 4;
        const WRITES: usize = 200;

        let ctx = context();
        let read = permission(&ctx, standard::READ);
        let item_read = permission(&ctx, standard::ITEM_READ);
        let cell = MatrixCell::new(AuthorizationMatrix::empty(ctx.clone()));

        std::thread::scope(|s| {
            for _ in 0..READERS {
                s.spawn(|| {
                    let mut seen = 0;
                    while seen < 2 * WRITES {
                        let snapshot = cell.load();
                        let entries = snapshot.all_permission_entries();
                        let indexed: BTreeSet<String> =
                            entries.iter().map(|e| e.sid().to_string()).collect();
                        assert_eq!(snapshot.sids(), &indexed);

                        let grouped: BTreeSet<String> = entries
                            .iter()
                            .filter(|e| e.kind() != AuthorizationType::User)
                            .map(|e| e.sid().to_string())
                            .collect();
                        assert_eq!(snapshot.groups().len(), grouped.len());

                        let sids = snapshot.all_granted_sids();
                        assert!(sids.len() >= seen, "a later snapshot lost grants");
                        if let Some(last) = sids.last() {
                            assert!(
                                snapshot.has_permission(last, &read, true)
                                    || snapshot.has_permission(last, &item_read, false)
                            );
                        }
                        seen = sids.len();
                    }
                });
            }
            s.spawn(|| {
                for i in 0..WRITES {
                    cell.grant(&read, PermissionEntry::user(format!("user-{i:03}")));
                    cell.grant(&item_read, PermissionEntry::group(format!("group-{i:03}")));
                }
            });
        });

        let last = cell.load();
        assert_eq!(last.all_granted_sids().len(), 2 * WRITES);
        assert_eq!(last.groups().len(), WRITES);
    }

    // ── Properties ───────────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn granting_a_permission_grants_everything_it_implies(
            index in 0usize..64,
            sid in "[a-z]{1,8}",
            principal in any::<bool>(),
        ) {
            let ctx = context();
            let all: Vec<Permission> = ctx.registry().all().cloned().collect();
            let granted = &all[index % all.len()];
            prop_assume!(granted.is_enabled() && !granted.is_dangerous());

            let matrix = ctx.builder().with(granted, PermissionEntry::either(sid.clone())).build();
            for implied in &all {
                if ctx.registry().is_implied_by(implied, granted) {
                    prop_assert!(
                        matrix.has_permission(&sid, implied, principal),
                        "{} should imply {}", granted, implied
                    );
                }
            }
        }

        #[test]
        fn granted_sids_are_sorted_and_unique(sids in prop::collection::vec("[a-cA-C]{1,3}", 1..12)) {
            let ctx = context();
            let read = permission(&ctx, standard::READ);
            let mut builder = ctx.builder();
            for sid in &sids {
                builder.add(&read, PermissionEntry::user(sid.clone()));
            }
            let listed = builder.build().all_granted_sids();
            for pair in listed.windows(2) {
                prop_assert_eq!(
                    ctx.identity().compare_sids(&pair[0], &pair[1]),
                    std::cmp::Ordering::Less
                );
            }
        }
    }
}
