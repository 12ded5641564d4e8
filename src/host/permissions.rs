//! Capabilities granted to an isolated host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One capability token from the sandbox attribute vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SandboxPermission {
    #[serde(rename = "allow-forms")]
    Forms,
    #[serde(rename = "allow-modals")]
    Modals,
    #[serde(rename = "allow-pointer-lock")]
    PointerLock,
    #[serde(rename = "allow-popups")]
    Popups,
    #[serde(rename = "allow-same-origin")]
    SameOrigin,
    #[serde(rename = "allow-scripts")]
    Scripts,
    #[serde(rename = "allow-top-navigation-by-user-activation")]
    TopNavigationByUserActivation,
}

impl SandboxPermission {
    /// Every permission a preview host is granted by default, in attribute order.
    pub const ALL: [SandboxPermission; 7] = [
        Self::Forms,
        Self::Modals,
        Self::PointerLock,
        Self::Popups,
        Self::SameOrigin,
        Self::Scripts,
        Self::TopNavigationByUserActivation,
    ];

    /// The attribute token, e.g. `allow-scripts`.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Forms => "allow-forms",
            Self::Modals => "allow-modals",
            Self::PointerLock => "allow-pointer-lock",
            Self::Popups => "allow-popups",
            Self::SameOrigin => "allow-same-origin",
            Self::Scripts => "allow-scripts",
            Self::TopNavigationByUserActivation => "allow-top-navigation-by-user-activation",
        }
    }
}

impl fmt::Display for SandboxPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for SandboxPermission {
    type Err = crate::PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.token() == s)
            .ok_or_else(|| {
                crate::PreviewError::configuration(
                    "host.permissions",
                    format!("unknown sandbox permission '{s}'"),
                )
            })
    }
}

/// An ordered, duplicate-free permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxPermissions(Vec<SandboxPermission>);

impl SandboxPermissions {
    /// Builds a set from any permissions, dropping duplicates.
    #[must_use]
    pub fn new(permissions: impl IntoIterator<Item = SandboxPermission>) -> Self {
        let mut set: Vec<SandboxPermission> = permissions.into_iter().collect();
        set.sort();
        set.dedup();
        Self(set)
    }

    /// Returns true if the permission is granted.
    #[must_use]
    pub fn allows(&self, permission: SandboxPermission) -> bool {
        self.0.contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = SandboxPermission> + '_ {
        self.0.iter().copied()
    }

    /// Space-separated tokens, as written in a sandbox attribute.
    #[must_use]
    pub fn to_attribute(&self) -> String {
        self.0
            .iter()
            .map(|permission| permission.token())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for SandboxPermissions {
    fn default() -> Self {
        Self::new(SandboxPermission::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attribute_lists_all_tokens_in_order() {
        assert_eq!(
            SandboxPermissions::default().to_attribute(),
            "allow-forms allow-modals allow-pointer-lock allow-popups \
             allow-same-origin allow-scripts allow-top-navigation-by-user-activation"
        );
    }

    #[test]
    fn parses_tokens() {
        let permission: SandboxPermission = "allow-scripts".parse().unwrap();
        assert_eq!(permission, SandboxPermission::Scripts);
        assert!("allow-top-navigation".parse::<SandboxPermission>().is_err());
    }

    #[test]
    fn set_is_deduplicated_and_sorted() {
        let set = SandboxPermissions::new([
            SandboxPermission::Scripts,
            SandboxPermission::Forms,
            SandboxPermission::Scripts,
        ]);
        assert_eq!(set.to_attribute(), "allow-forms allow-scripts");
        assert!(set.allows(SandboxPermission::Forms));
        assert!(!set.allows(SandboxPermission::Popups));
    }

    #[test]
    fn deserializes_from_token_list() {
        let set: SandboxPermissions =
            serde_json::from_str(r#"["allow-scripts","allow-same-origin"]"#).unwrap();
        assert_eq!(set.iter().count(), 2);
    }
}
