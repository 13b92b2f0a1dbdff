//! Closed enumerations the engine decides over.
//!
//! Every value has a single wire spelling (`as_str`), used for serde, display
//! and the persisted tables. Parsing is case-insensitive and rejects anything
//! outside the enumeration with `AuthzError::InvalidInput` so callers can tell
//! "not configured" apart from a policy denial.

use core::str::FromStr;

use crate::AuthzError;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant, )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const COUNT: usize = $name::ALL.len();

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Dense index in `0..COUNT`.
            pub fn index(&self) -> usize {
                *self as usize
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AuthzError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(needle))
                    .ok_or_else(|| AuthzError::invalid_input($kind, needle))
            }
        }
    };
}

closed_enum! {
    /// Built-in roles. Each principal holds exactly one.
    pub enum Role ("role") {
        Owner => "OWNER",
        Manager => "MANAGER",
        Staff => "STAFF",
        Finance => "FINANCE",
        Warehouse => "WAREHOUSE",
        Marketing => "MARKETING",
        Auditor => "AUDITOR",
    }
}

closed_enum! {
    /// What the principal is trying to do.
    pub enum Action ("action") {
        Create => "create",
        Read => "read",
        Edit => "edit",
        Delete => "delete",
        Approve => "approve",
        ViewSensitive => "view_sensitive",
        SetupAccess => "setup_access",
    }
}

closed_enum! {
    /// Business module the action targets.
    ///
    /// Adding a module means adding it here and to the rule pipeline in
    /// `policy`.
    pub enum Resource ("resource") {
        Sales => "SALES",
        Service => "SERVICE",
        Material => "MATERIAL",
        Financial => "FINANCIAL",
        Executive => "EXECUTIVE",
    }
}

closed_enum! {
    /// Context an action is performed in.
    pub enum Scope ("scope") {
        Setup => "setup",
        Operation => "operation",
        Report => "report",
        Any => "any",
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Any
    }
}

impl Scope {
    /// Whether a grant stored at `self` satisfies a request made at `requested`.
    ///
    /// A grant at `Any` matches every scope; a scoped grant matches only its
    /// own scope, never an unrefined (`Any`) request.
    pub fn covers(self, requested: Scope) -> bool {
        self == Scope::Any || self == requested
    }
}
