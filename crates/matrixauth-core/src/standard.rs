//! The built-in permission set.
//!
//! Groups follow the host's object model: Overall (global), Job (items and
//! item groups), Run (builds), and Agent (computers).

use matrixauth_contracts::permission::{PermissionScope, PermissionSpec};

use crate::registry::PermissionRegistryBuilder;

pub const OVERALL_OWNER: &str = "hudson.model.Hudson";
pub const ITEM_OWNER: &str = "hudson.model.Item";
pub const RUN_OWNER: &str = "hudson.model.Run";
pub const COMPUTER_OWNER: &str = "hudson.model.Computer";

pub const ADMINISTER: &str = "hudson.model.Hudson.Administer";
pub const READ: &str = "hudson.model.Hudson.Read";
pub const RUN_SCRIPTS: &str = "hudson.model.Hudson.RunScripts";
pub const UPLOAD_PLUGINS: &str = "hudson.model.Hudson.UploadPlugins";
pub const CONFIGURE_UPDATE_CENTER: &str = "hudson.model.Hudson.ConfigureUpdateCenter";
pub const SYSTEM_READ: &str = "hudson.model.Hudson.SystemRead";

pub const ITEM_CREATE: &str = "hudson.model.Item.Create";
pub const ITEM_DELETE: &str = "hudson.model.Item.Delete";
pub const ITEM_CONFIGURE: &str = "hudson.model.Item.Configure";
pub const ITEM_READ: &str = "hudson.model.Item.Read";
pub const ITEM_DISCOVER: &str = "hudson.model.Item.Discover";
pub const ITEM_BUILD: &str = "hudson.model.Item.Build";
pub const ITEM_WORKSPACE: &str = "hudson.model.Item.Workspace";
pub const ITEM_CANCEL: &str = "hudson.model.Item.Cancel";

pub const RUN_DELETE: &str = "hudson.model.Run.Delete";
pub const RUN_UPDATE: &str = "hudson.model.Run.Update";
pub const RUN_ARTIFACTS: &str = "hudson.model.Run.Artifacts";

pub const COMPUTER_CONFIGURE: &str = "hudson.model.Computer.Configure";
pub const COMPUTER_DELETE: &str = "hudson.model.Computer.Delete";
pub const COMPUTER_CONNECT: &str = "hudson.model.Computer.Connect";
pub const COMPUTER_DISCONNECT: &str = "hudson.model.Computer.Disconnect";
pub const COMPUTER_BUILD: &str = "hudson.model.Computer.Build";

pub(crate) fn administer_spec() -> PermissionSpec {
    PermissionSpec::new(OVERALL_OWNER, "Overall", "Administer")
}

/// A registry builder preloaded with the standard permissions.
///
/// Hosts that define their own permissions register them on the returned
/// builder before calling `build`.
pub fn builder() -> PermissionRegistryBuilder {
    let mut builder = PermissionRegistryBuilder::new();
    register_standard(&mut builder);
    builder
}

fn register_standard(builder: &mut PermissionRegistryBuilder) {
    use PermissionScope::*;

    let admin = builder.administer().clone();

    // The standard set is internally consistent, so registration cannot fail.
    let mut add = |spec: PermissionSpec| match builder.register(spec) {
        Ok(permission) => permission,
        Err(e) => unreachable!("standard permission set is inconsistent: {e}"),
    };

    add(PermissionSpec::new(OVERALL_OWNER, "Overall", "Read").implied_by(&admin));
    for name in ["RunScripts", "UploadPlugins", "ConfigureUpdateCenter"] {
        add(PermissionSpec::new(OVERALL_OWNER, "Overall", name).implied_by(&admin).dangerous());
    }
    add(PermissionSpec::new(OVERALL_OWNER, "Overall", "SystemRead")
        .implied_by(&admin)
        .enabled(false));

    add(PermissionSpec::new(ITEM_OWNER, "Job", "Create")
        .implied_by(&admin)
        .scopes(&[ItemGroup]));
    for name in ["Delete", "Configure"] {
        add(PermissionSpec::new(ITEM_OWNER, "Job", name).implied_by(&admin).scopes(&[Item]));
    }
    let item_read = add(PermissionSpec::new(ITEM_OWNER, "Job", "Read")
        .implied_by(&admin)
        .scopes(&[Item]));
    add(PermissionSpec::new(ITEM_OWNER, "Job", "Discover")
        .implied_by(&item_read)
        .scopes(&[Item]));
    for name in ["Build", "Workspace", "Cancel"] {
        add(PermissionSpec::new(ITEM_OWNER, "Job", name).implied_by(&admin).scopes(&[Item]));
    }

    for name in ["Delete", "Update"] {
        add(PermissionSpec::new(RUN_OWNER, "Run", name).implied_by(&admin).scopes(&[Run]));
    }
    add(PermissionSpec::new(RUN_OWNER, "Run", "Artifacts").scopes(&[Run]));

    for name in ["Configure", "Delete", "Connect", "Disconnect", "Build"] {
        add(PermissionSpec::new(COMPUTER_OWNER, "Agent", name)
            .implied_by(&admin)
            .scopes(&[Computer]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_has_expected_shape() {
        let registry = builder().build();

        let discover = registry.get(ITEM_DISCOVER).unwrap();
        assert_eq!(discover.implied_by().map(|p| p.id()), Some(ITEM_READ));
        assert!(registry.is_ultimately_implied_by_administer(discover));

        let artifacts = registry.get(RUN_ARTIFACTS).unwrap();
        assert!(!registry.is_ultimately_implied_by_administer(artifacts));

        let dangerous: Vec<&str> = registry.dangerous().map(|p| p.id()).collect();
        assert_eq!(dangerous, vec![RUN_SCRIPTS, UPLOAD_PLUGINS, CONFIGURE_UPDATE_CENTER]);

        assert!(!registry.get(SYSTEM_READ).unwrap().is_enabled());
        assert!(registry.enabled().all(|p| p.id() != SYSTEM_READ));
    }

    #[test]
    fn short_forms_resolve() {
        let registry = builder().build();
        assert_eq!(registry.find("Job/Build").map(|p| p.id()), Some(ITEM_BUILD));
        assert_eq!(registry.find("Agent/Connect").map(|p| p.id()), Some(COMPUTER_CONNECT));
        assert_eq!(registry.find("Run/Delete").map(|p| p.id()), Some(RUN_DELETE));
        assert!(registry.find("Job/Frobnicate").is_none());
    }

    #[test]
    fn applicable_permissions_per_scope() {
        let registry = builder().build();
        let on_agents: Vec<&str> = registry
            .applicable(PermissionScope::Computer)
            .map(|p| p.owner())
            .collect();
        assert!(on_agents.iter().all(|owner| *owner == COMPUTER_OWNER));
        assert_eq!(on_agents.len(), 5);

        let on_items: Vec<&str> = registry
            .applicable(PermissionScope::Item)
            .map(|p| p.id())
            .collect();
        assert!(on_items.contains(&ITEM_BUILD));
        assert!(on_items.contains(&RUN_ARTIFACTS));
        assert!(!on_items.contains(&ITEM_CREATE));
        assert!(!on_items.contains(&ADMINISTER));
    }
}
