//! # matrixauth-inheritance
//!
//! Composition of matrices across nested scopes.
//!
//! ```text
//!   global ──▶ folder ──▶ sub-folder ──▶ job
//!   global ──▶ agent
//! ```
//!
//! Each non-root scope carries an `InheritanceStrategy` that decides how its
//! own matrix combines with the ACL of its parent item and the global ACL.
//! `ProjectMatrixStrategy` owns the tree and resolves the effective ACL of any
//! scope by full name.

pub mod project;
pub mod property;
pub mod scope;
pub mod strategy;

pub use project::{ItemNode, ProjectMatrixStrategy};
pub use property::{
    AgentProperty, EffectiveAcl, FolderProperty, GlobalMatrix, InheritingContainer, JobProperty,
};
pub use scope::ScopeRef;
pub use strategy::{InheritanceOptions, InheritanceStrategy, ScopeAcls};

#[cfg(test)]
mod tests {
    use matrixauth_contracts::{
        Authentication, EngineSettings, MatrixAuthError, Permission, PermissionEntry,
    };
    use matrixauth_core::{standard, Acl, AuthorizationContainer, AuthorizationMatrix, MatrixContext};

    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    struct Fixture {
        context: MatrixContext,
        settings: EngineSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_settings(EngineSettings::default())
        }

        fn with_settings(settings: EngineSettings) -> Self {
            Self {
                context: MatrixContext::from_settings(&settings),
                settings,
            }
        }

        fn p(&self, id: &str) -> Permission {
            self.context.registry().permission(id).unwrap()
        }

        fn matrix(&self, grants: &[(&str, PermissionEntry)]) -> AuthorizationMatrix {
            let mut builder = self.context.builder();
            for (id, entry) in grants {
                builder.add(&self.p(id), entry.clone());
            }
            builder.build()
        }

        fn strategy(&self, global: &[(&str, PermissionEntry)]) -> ProjectMatrixStrategy {
            ProjectMatrixStrategy::new(self.matrix(global), &self.settings)
        }
    }

    fn parent_checking() -> Fixture {
        Fixture::with_settings(EngineSettings {
            check_parent_permissions: true,
            ..EngineSettings::default()
        })
    }

    // ── InheritParent ────────────────────────────────────────────────────────

    #[test]
    fn global_grant_reaches_nested_job() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ITEM_READ, PermissionEntry::either("alice"))]);
        strategy
            .add_folder("F", Some(FolderProperty::new(fx.matrix(&[]))))
            .unwrap();
        strategy.add_job("F/J", Some(JobProperty::new(fx.matrix(&[])))).unwrap();

        let acl = strategy.item_acl("F/J").unwrap();
        let read = fx.p(standard::ITEM_READ);
        assert!(acl.has_permission("alice", &read, true));
        assert!(acl.has_permission("alice", &read, false));
        assert!(!acl.has_permission("bob", &read, true));
    }

    #[test]
    fn folder_grant_is_inherited_by_its_jobs() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy
            .add_folder(
                "team",
                Some(FolderProperty::new(
                    fx.matrix(&[(standard::ITEM_BUILD, PermissionEntry::group("devs"))]),
                )),
            )
            .unwrap();
        strategy.add_job("team/app", None).unwrap();
        strategy.add_job("other", None).unwrap();

        let build = fx.p(standard::ITEM_BUILD);
        assert!(strategy.item_acl("team/app").unwrap().has_permission("devs", &build, false));
        assert!(!strategy.item_acl("other").unwrap().has_permission("devs", &build, false));
    }

    #[test]
    fn items_without_property_use_parent_or_root() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::READ, PermissionEntry::user("alice"))]);
        strategy.add_folder("F", None).unwrap();
        strategy.add_job("F/J", None).unwrap();

        let read = fx.p(standard::READ);
        assert!(strategy.item_acl("F/J").unwrap().has_permission("alice", &read, true));
    }

    // ── InheritGlobalOnly ────────────────────────────────────────────────────

    #[test]
    fn global_only_skips_folder_grants() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ITEM_CANCEL, PermissionEntry::user("carol"))]);
        strategy
            .add_folder(
                "F",
                Some(FolderProperty::new(
                    fx.matrix(&[(standard::ITEM_BUILD, PermissionEntry::user("dave"))]),
                )),
            )
            .unwrap();
        strategy
            .add_job(
                "F/J",
                Some(JobProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::InheritGlobalOnly)),
            )
            .unwrap();

        let acl = strategy.item_acl("F/J").unwrap();
        assert!(!acl.has_permission("dave", &fx.p(standard::ITEM_BUILD), true));
        assert!(acl.has_permission("carol", &fx.p(standard::ITEM_CANCEL), true));
    }

    #[test]
    fn agents_default_to_global_only() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::COMPUTER_BUILD, PermissionEntry::group("builders"))]);
        strategy
            .add_agent(
                "linux-1",
                Some(AgentProperty::new(
                    fx.matrix(&[(standard::COMPUTER_CONNECT, PermissionEntry::user("ops"))]),
                )),
            )
            .unwrap();
        strategy.add_agent("linux-2", None).unwrap();

        let property = strategy.agent_property("linux-1").unwrap().unwrap();
        assert_eq!(property.inheritance_strategy(), InheritanceStrategy::InheritGlobalOnly);

        let acl = strategy.agent_acl("linux-1").unwrap();
        assert!(acl.has_permission("builders", &fx.p(standard::COMPUTER_BUILD), false));
        assert!(acl.has_permission("ops", &fx.p(standard::COMPUTER_CONNECT), true));
        assert!(!strategy
            .agent_acl("linux-2")
            .unwrap()
            .has_permission("ops", &fx.p(standard::COMPUTER_CONNECT), true));
    }

    // ── NonInheriting ────────────────────────────────────────────────────────

    #[test]
    fn non_inheriting_blocks_inherited_grants() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ITEM_BUILD, PermissionEntry::user("alice"))]);
        strategy
            .add_job(
                "secret",
                Some(JobProperty::with_strategy(
                    fx.matrix(&[(standard::ITEM_READ, PermissionEntry::user("bob"))]),
                    InheritanceStrategy::NonInheriting,
                )),
            )
            .unwrap();

        let acl = strategy.item_acl("secret").unwrap();
        assert!(!acl.has_permission("alice", &fx.p(standard::ITEM_BUILD), true));
        assert!(acl.has_permission("bob", &fx.p(standard::ITEM_READ), true));
    }

    #[test]
    fn non_inheriting_never_locks_out_administrators() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ADMINISTER, PermissionEntry::user("root"))]);
        strategy
            .add_job(
                "secret",
                Some(JobProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::NonInheriting)),
            )
            .unwrap();

        let acl = strategy.item_acl("secret").unwrap();
        assert!(acl.has_permission("root", &fx.p(standard::ITEM_BUILD), true));
        assert!(!acl.has_permission("root", &fx.p(standard::RUN_ARTIFACTS), true));
    }

    // ── Parent permission check ──────────────────────────────────────────────

    #[test]
    fn parent_check_requires_read_on_the_parent() {
        let fx = parent_checking();
        let strategy = fx.strategy(&[]);
        strategy
            .add_folder("F", Some(FolderProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::NonInheriting)))
            .unwrap();
        strategy
            .add_job(
                "F/J",
                Some(JobProperty::new(fx.matrix(&[(standard::ITEM_READ, PermissionEntry::user("alice"))]))),
            )
            .unwrap();
        strategy
            .add_job(
                "top",
                Some(JobProperty::new(fx.matrix(&[(standard::ITEM_READ, PermissionEntry::user("alice"))]))),
            )
            .unwrap();

        let read = fx.p(standard::ITEM_READ);
        assert!(!strategy.item_acl("F/J").unwrap().has_permission("alice", &read, true));
        assert!(strategy.item_acl("top").unwrap().has_permission("alice", &read, true));
        let discover = fx.p(standard::ITEM_DISCOVER);
        assert!(!strategy.item_acl("F/J").unwrap().has_permission("alice", &discover, true));
    }

    #[test]
    fn parent_check_with_global_only_needs_both() {
        let fx = parent_checking();
        let strategy = fx.strategy(&[(standard::ITEM_READ, PermissionEntry::user("alice"))]);
        strategy
            .add_folder("F", Some(FolderProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::NonInheriting)))
            .unwrap();
        strategy
            .add_job(
                "F/J",
                Some(JobProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::InheritGlobalOnly)),
            )
            .unwrap();

        let read = fx.p(standard::ITEM_READ);
        assert!(!strategy.item_acl("F/J").unwrap().has_permission("alice", &read, true));

        strategy
            .container(&ScopeRef::item("F"))
            .unwrap()
            .grant(&read, PermissionEntry::user("alice"))
            .unwrap();
        assert!(strategy.item_acl("F/J").unwrap().has_permission("alice", &read, true));
    }

    #[test]
    fn parent_check_combines_grants_held_through_different_identities() {
        let fx = parent_checking();
        let strategy = fx.strategy(&[(standard::ITEM_READ, PermissionEntry::user("carol"))]);
        strategy
            .add_folder(
                "F",
                Some(FolderProperty::with_strategy(
                    fx.matrix(&[(standard::ITEM_READ, PermissionEntry::group("devs"))]),
                    InheritanceStrategy::NonInheriting,
                )),
            )
            .unwrap();
        strategy
            .add_job(
                "F/J",
                Some(JobProperty::with_strategy(
                    fx.matrix(&[(standard::ITEM_READ, PermissionEntry::user("alice"))]),
                    InheritanceStrategy::NonInheriting,
                )),
            )
            .unwrap();
        strategy
            .add_job(
                "F/G",
                Some(JobProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::InheritGlobalOnly)),
            )
            .unwrap();

        let read = fx.p(standard::ITEM_READ);
        let job = ScopeRef::item("F/J");
        let alice = Authentication::new("alice", ["devs"]);
        assert!(strategy.has_permission(&ScopeRef::item("F"), &alice, &read).unwrap());
        assert!(strategy.has_permission(&job, &alice, &read).unwrap());
        // Neither identity alone satisfies both sides.
        let job_acl = strategy.item_acl("F/J").unwrap();
        assert!(!job_acl.has_permission("alice", &read, true));
        assert!(!job_acl.has_permission("devs", &read, false));

        let outsider = Authentication::new("alice", Vec::<String>::new());
        assert!(!strategy.has_permission(&job, &outsider, &read).unwrap());

        let carol = Authentication::new("carol", ["devs"]);
        assert!(strategy.has_permission(&ScopeRef::item("F/G"), &carol, &read).unwrap());
        let lone_carol = Authentication::new("carol", Vec::<String>::new());
        assert!(!strategy.has_permission(&ScopeRef::item("F/G"), &lone_carol, &read).unwrap());
    }

    #[test]
    fn parent_check_is_off_by_default() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy
            .add_folder("F", Some(FolderProperty::with_strategy(fx.matrix(&[]), InheritanceStrategy::NonInheriting)))
            .unwrap();
        strategy
            .add_job(
                "F/J",
                Some(JobProperty::new(fx.matrix(&[(standard::ITEM_READ, PermissionEntry::user("alice"))]))),
            )
            .unwrap();

        let read = fx.p(standard::ITEM_READ);
        assert!(strategy.item_acl("F/J").unwrap().has_permission("alice", &read, true));
    }

    // ── Strategy replacement ─────────────────────────────────────────────────

    #[test]
    fn replaced_strategy_takes_effect_immediately() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ITEM_BUILD, PermissionEntry::user("alice"))]);
        strategy.add_job("J", Some(JobProperty::new(fx.matrix(&[])))).unwrap();

        let acl = strategy.item_acl("J").unwrap();
        let build = fx.p(standard::ITEM_BUILD);
        assert!(acl.has_permission("alice", &build, true));

        let ItemNode::Job(Some(property)) = strategy.item("J").unwrap() else {
            panic!("expected a job with a property");
        };
        property.set_inheritance_strategy(InheritanceStrategy::NonInheriting);
        assert!(!acl.has_permission("alice", &build, true));
    }

    #[test]
    fn strategy_tags_round_trip_through_serde() {
        for strategy in InheritanceStrategy::ALL {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.tag()));
            let back: InheritanceStrategy = serde_json::from_str(&json).unwrap();
            assert_eq!(back, strategy);
        }
        let aliased: InheritanceStrategy = serde_json::from_str("\"NonInheriting\"").unwrap();
        assert_eq!(aliased, InheritanceStrategy::NonInheriting);
        assert_eq!("inheritingGlobal".parse::<InheritanceStrategy>().unwrap(), InheritanceStrategy::InheritGlobalOnly);
        assert!("sideways".parse::<InheritanceStrategy>().is_err());
    }

    // ── Tree maintenance ─────────────────────────────────────────────────────

    #[test]
    fn items_need_a_registered_parent_folder() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        let err = strategy.add_job("missing/J", None).unwrap_err();
        assert_eq!(
            err,
            MatrixAuthError::UnknownScope { kind: "folder".to_string(), name: "missing".to_string() }
        );

        strategy.add_job("plain", None).unwrap();
        assert!(strategy.add_job("plain/J", None).is_err(), "jobs cannot contain items");
    }

    #[test]
    fn rename_moves_the_subtree() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy.add_folder("A", None).unwrap();
        strategy.add_folder("A/B", None).unwrap();
        strategy.add_job("A/B/J", None).unwrap();
        strategy.add_folder("C", None).unwrap();

        let moves = strategy.rename_item("A/B", "C/B").unwrap();
        assert_eq!(
            moves,
            vec![
                ("A/B".to_string(), "C/B".to_string()),
                ("A/B/J".to_string(), "C/B/J".to_string()),
            ]
        );
        assert!(strategy.item("C/B/J").is_some());
        assert!(strategy.item("A/B/J").is_none());
        assert!(strategy.rename_item("C", "C/B/inside").is_err());
    }

    #[test]
    fn remove_drops_descendants() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy.add_folder("A", None).unwrap();
        strategy.add_job("A/J", None).unwrap();
        strategy.add_job("AB", None).unwrap();

        assert_eq!(strategy.remove_item("A"), vec!["A".to_string(), "A/J".to_string()]);
        assert!(strategy.item("AB").is_some());
        assert!(matches!(strategy.item_acl("A/J"), Err(MatrixAuthError::UnknownScope { .. })));
    }

    // ── Post-load grants ─────────────────────────────────────────────────────

    #[test]
    fn creator_receives_read_and_configure() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy.add_job("new-job", None).unwrap();

        let alice = Authentication::new("alice", ["devs"]);
        strategy.on_item_created("new-job", &alice).unwrap();

        let acl = strategy.item_acl("new-job").unwrap();
        assert!(acl.is_granted(&alice, &fx.p(standard::ITEM_READ)));
        assert!(acl.is_granted(&alice, &fx.p(standard::ITEM_CONFIGURE)));
        assert!(!acl.is_granted(&alice, &fx.p(standard::ITEM_DELETE)));

        let ItemNode::Job(Some(property)) = strategy.item("new-job").unwrap() else {
            panic!("creator grant should create a job property");
        };
        assert!(property.has_explicit_entry(&PermissionEntry::user("alice"), &fx.p(standard::ITEM_READ)));
    }

    #[test]
    fn creator_with_inherited_access_gets_nothing_new() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::ADMINISTER, PermissionEntry::group("admins"))]);
        strategy.add_job("new-job", None).unwrap();

        strategy
            .on_item_created("new-job", &Authentication::new("root", ["admins"]))
            .unwrap();
        assert!(matches!(strategy.item("new-job"), Some(ItemNode::Job(None))));
    }

    #[test]
    fn agent_creator_receives_configure() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy.add_agent("mac-1", None).unwrap();
        strategy.on_agent_created("mac-1", &Authentication::anonymous()).unwrap();

        let property = strategy.agent_property("mac-1").unwrap().unwrap();
        assert!(property.has_explicit_entry(
            &PermissionEntry::user("anonymous"),
            &fx.p(standard::COMPUTER_CONFIGURE)
        ));
    }

    #[test]
    fn inapplicable_grants_are_rejected() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        strategy.add_agent("mac-1", None).unwrap();

        let err = strategy
            .grant(&ScopeRef::agent("mac-1"), &fx.p(standard::ITEM_BUILD), PermissionEntry::user("x"))
            .unwrap_err();
        assert!(matches!(err, MatrixAuthError::InapplicablePermission { .. }));
    }

    #[test]
    fn permission_adder_targets_the_global_matrix() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[]);
        let admin = fx.p(standard::ADMINISTER);
        strategy.add_permission_for_user("first-admin", &admin).unwrap();

        assert!(strategy.root_acl().has_permission("first-admin", &admin, true));
        assert!(strategy.add_permission_for_user("", &admin).is_err());
    }

    #[test]
    fn groups_are_collected_across_scopes() {
        let fx = Fixture::new();
        let strategy = fx.strategy(&[(standard::READ, PermissionEntry::group("everyone"))]);
        strategy
            .add_job("J", Some(JobProperty::new(fx.matrix(&[(standard::ITEM_BUILD, PermissionEntry::either("devs"))]))))
            .unwrap();
        strategy
            .add_agent(
                "a",
                Some(AgentProperty::new(fx.matrix(&[(standard::COMPUTER_BUILD, PermissionEntry::group("Devs"))]))),
            )
            .unwrap();

        assert_eq!(strategy.groups(), vec!["devs".to_string(), "everyone".to_string()]);
    }

    // ── ScopeRef ─────────────────────────────────────────────────────────────

    #[test]
    fn scope_refs_parse() {
        assert_eq!("global".parse::<ScopeRef>().unwrap(), ScopeRef::Global);
        assert_eq!("item:F/J".parse::<ScopeRef>().unwrap(), ScopeRef::item("F/J"));
        assert_eq!("agent:linux-1".parse::<ScopeRef>().unwrap(), ScopeRef::agent("linux-1"));
        assert!("item:".parse::<ScopeRef>().is_err());
        assert!("node:x".parse::<ScopeRef>().is_err());
        assert_eq!(ScopeRef::item("F/J").to_string(), "item:F/J");
    }

    #[test]
    fn strategy_combinators_over_plain_acls() {
        let fx = Fixture::new();
        let options = InheritanceOptions::new(fx.context.registry(), &fx.settings);
        let child = fx.matrix(&[]);
        let parent = fx.matrix(&[(standard::ITEM_BUILD, PermissionEntry::user("p"))]);
        let root = fx.matrix(&[(standard::ITEM_BUILD, PermissionEntry::user("r"))]);
        let build = fx.p(standard::ITEM_BUILD);
        let acls = ScopeAcls { child: &child, parent: Some(&parent), root: &root };

        let decide = |strategy: InheritanceStrategy, sid: &str| {
            strategy.decide(sid, &build, true, acls, &options).is_granted()
        };
        assert!(decide(InheritanceStrategy::InheritParent, "p"));
        assert!(!decide(InheritanceStrategy::InheritParent, "r"));
        assert!(!decide(InheritanceStrategy::InheritGlobalOnly, "p"));
        assert!(decide(InheritanceStrategy::InheritGlobalOnly, "r"));
        assert!(!decide(InheritanceStrategy::NonInheriting, "p"));
        assert!(!decide(InheritanceStrategy::NonInheriting, "r"));
    }
}
