//! Permission handles and the scopes they apply to.
//!
//! A `Permission` is an immutable, cheaply clonable handle. Each permission
//! optionally names one implying parent, and because the parent must already
//! exist when the child is created, the implication links always form a
//! forest: walking `implied_by` from any permission terminates.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use serde::{Deserialize, Serialize, Serializer};

/// The kind of object a permission can be granted on.
///
/// Scopes nest: `Run` is contained by `Item`, which is contained by
/// `ItemGroup`, which is contained by `Global`. `Computer` sits directly
/// below `Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionScope {
    Global,
    ItemGroup,
    Item,
    Run,
    Computer,
}

impl PermissionScope {
    /// The directly enclosing scope, or `None` for `Global`.
    pub fn parent(self) -> Option<PermissionScope> {
        match self {
            PermissionScope::Global => None,
            PermissionScope::ItemGroup => Some(PermissionScope::Global),
            PermissionScope::Item => Some(PermissionScope::ItemGroup),
            PermissionScope::Run => Some(PermissionScope::Item),
            PermissionScope::Computer => Some(PermissionScope::Global),
        }
    }

    /// Return true if `self` is `other` or nested anywhere below it.
    pub fn is_contained_by(self, other: PermissionScope) -> bool {
        let mut current = Some(self);
        while let Some(scope) = current {
            if scope == other {
                return true;
            }
            current = scope.parent();
        }
        false
    }
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionScope::Global => "global",
            PermissionScope::ItemGroup => "item-group",
            PermissionScope::Item => "item",
            PermissionScope::Run => "run",
            PermissionScope::Computer => "computer",
        };
        f.write_str(name)
    }
}

/// Everything needed to create a `Permission`.
///
/// ```rust,ignore
/// let build = PermissionSpec::new("hudson.model.Item", "Job", "Build")
///     .implied_by(&administer)
///     .scopes(&[PermissionScope::Item]);
/// ```
#[derive(Debug, Clone)]
pub struct PermissionSpec {
    pub owner: String,
    pub title: String,
    pub name: String,
    pub implied_by: Option<Permission>,
    pub enabled: bool,
    pub dangerous: bool,
    pub scopes: Vec<PermissionScope>,
}

impl PermissionSpec {
    /// A root, enabled, non-dangerous permission applicable globally.
    pub fn new(owner: impl Into<String>, title: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            title: title.into(),
            name: name.into(),
            implied_by: None,
            enabled: true,
            dangerous: false,
            scopes: vec![PermissionScope::Global],
        }
    }

    pub fn implied_by(mut self, parent: &Permission) -> Self {
        self.implied_by = Some(parent.clone());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }

    pub fn scopes(mut self, scopes: &[PermissionScope]) -> Self {
        self.scopes = scopes.to_vec();
        self
    }

    /// The identifier the resulting permission will carry.
    pub fn id(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

#[derive(Debug)]
struct PermissionDef {
    id: String,
    owner: String,
    title: String,
    name: String,
    enabled: bool,
    dangerous: bool,
    scopes: Vec<PermissionScope>,
    implied_by: Option<Permission>,
}

/// A named capability, optionally implied by a broader permission.
///
/// Equality, ordering, and hashing use the identifier only.
#[derive(Clone)]
pub struct Permission(Arc<PermissionDef>);

impl Permission {
    /// Create a permission from its spec.
    ///
    /// Hosts normally go through the permission registry, which also checks
    /// that identifiers are unique and parents are registered.
    pub fn from_spec(spec: PermissionSpec) -> Self {
        let id = spec.id();
        Self(Arc::new(PermissionDef {
            id,
            owner: spec.owner,
            title: spec.title,
            name: spec.name,
            enabled: spec.enabled,
            dangerous: spec.dangerous,
            scopes: spec.scopes,
            implied_by: spec.implied_by,
        }))
    }

    /// Globally unique identifier, e.g. `hudson.model.Item.Build`.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn owner(&self) -> &str {
        &self.0.owner
    }

    pub fn title(&self) -> &str {
        &self.0.title
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The UI form of the identifier, e.g. `Job/Build`.
    pub fn short_form(&self) -> String {
        format!("{}/{}", self.0.title, self.0.name)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.enabled
    }

    pub fn is_dangerous(&self) -> bool {
        self.0.dangerous
    }

    pub fn scopes(&self) -> &[PermissionScope] {
        &self.0.scopes
    }

    pub fn implied_by(&self) -> Option<&Permission> {
        self.0.implied_by.as_ref()
    }

    /// Iterate `self, self.implied_by, self.implied_by.implied_by, …`.
    pub fn chain(&self) -> ImplicationChain<'_> {
        ImplicationChain { next: Some(self) }
    }

    /// The last permission of the implication chain.
    pub fn root(&self) -> &Permission {
        let mut current = self;
        while let Some(parent) = current.implied_by() {
            current = parent;
        }
        current
    }

    /// Return true iff `other` appears in this permission's implication chain.
    pub fn is_implied_by(&self, other: &Permission) -> bool {
        self.chain().any(|p| p == other)
    }

    /// Return true if any of this permission's scopes nests inside `scope`.
    pub fn is_contained_by(&self, scope: PermissionScope) -> bool {
        self.0.scopes.iter().any(|s| s.is_contained_by(scope))
    }
}

/// Iterator over a permission and its implying ancestors, most specific first.
pub struct ImplicationChain<'a> {
    next: Option<&'a Permission>,
}

impl<'a> Iterator for ImplicationChain<'a> {
    type Item = &'a Permission;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.implied_by();
        Some(current)
    }
}

impl PartialEq for Permission {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Permission {}

impl Hash for Permission {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for Permission {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permission {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Permission({})", self.0.id)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.id)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.id)
    }
}
