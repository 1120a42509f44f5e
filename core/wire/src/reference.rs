// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Strongly typed object references.
//!
//! A reference is an opaque string naming one remote object. Each class
//! gets its own nominal type through [`reference!`](crate::reference), so a
//! host reference cannot be passed where a VM reference is expected.

use crate::callsite::CallSite;
use crate::error::CodecError;
use crate::marshal::Unmarshal;

/// The distinguished null reference literal.
pub const NULL_REF: &str = "OpaqueRef:NULL";

pub trait Reference: Clone + Eq + std::hash::Hash + std::fmt::Debug {
    /// Wire name of the class the reference points into.
    const CLASS: &'static str;

    fn from_raw(raw: String) -> Self;

    fn as_str(&self) -> &str;

    fn null() -> Self {
        Self::from_raw(NULL_REF.to_string())
    }

    fn is_null(&self) -> bool {
        self.as_str() == NULL_REF
    }
}

/// Rejects the null reference for arguments that do not permit it.
pub fn require_non_null<R: Reference>(reference: &R, site: &CallSite) -> Result<(), CodecError> {
    if reference.is_null() {
        return Err(CodecError::NullReference {
            site: site.into(),
            class: R::CLASS,
        });
    }
    Ok(())
}

/// Checks that a class tag received alongside a reference (task `type`,
/// event `class`) names the class `R` expects.
pub fn check_class<R: Reference>(tag: &str, site: &CallSite) -> Result<(), CodecError> {
    if tag.eq_ignore_ascii_case(R::CLASS) {
        Ok(())
    } else {
        Err(CodecError::ReferenceClassMismatch {
            site: site.into(),
            expected: R::CLASS,
            found: tag.to_string(),
        })
    }
}

/// Like [`check_class`], for a result slot of any type: only reference
/// types carry a class, and an empty tag is not checked.
pub fn check_result_class<T: Unmarshal>(tag: &str, site: &CallSite) -> Result<(), CodecError> {
    match T::REFERENCE_CLASS {
        Some(expected) if !tag.is_empty() && !tag.eq_ignore_ascii_case(expected) => {
            Err(CodecError::ReferenceClassMismatch {
                site: site.into(),
                expected,
                found: tag.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Declares a reference type for a class.
///
/// ```
/// xenapi_wire::reference! {
///     /// A reference to a bond.
///     pub struct BondRef => "Bond";
/// }
///
/// use xenapi_wire::Reference;
/// assert!(BondRef::null().is_null());
/// assert_eq!(BondRef::CLASS, "Bond");
/// ```
///
/// The `secret` form redacts the token from `Debug` and `Display` output.
#[macro_export]
macro_rules! reference {
    (@common $name:ident, $class:literal) => {
        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }
        }

        impl $crate::Reference for $name {
            const CLASS: &'static str = $class;

            fn from_raw(raw: String) -> Self {
                Self(raw)
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                <$name as $crate::Reference>::null()
            }
        }

        impl $crate::Marshal for $name {
            fn marshal(
                &self,
                _site: &$crate::CallSite,
            ) -> Result<$crate::Value, $crate::CodecError> {
                Ok($crate::Value::String(self.0.clone()))
            }
        }

        impl $crate::Unmarshal for $name {
            const REFERENCE_CLASS: Option<&'static str> = Some($class);

            fn unmarshal(
                value: $crate::Value,
                site: &$crate::CallSite,
            ) -> Result<Self, $crate::CodecError> {
                <String as $crate::Unmarshal>::unmarshal(value, site).map(Self)
            }
        }

        impl $crate::MapKey for $name {
            fn to_key(&self, _site: &$crate::CallSite) -> Result<String, $crate::CodecError> {
                Ok(self.0.clone())
            }

            fn from_key(key: String, _site: &$crate::CallSite) -> Result<Self, $crate::CodecError> {
                Ok(Self(key))
            }
        }
    };
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $class:literal;) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(String);

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        $crate::reference!(@common $name, $class);
    };
    ($(#[$meta:meta])* $vis:vis secret struct $name:ident => $class:literal;) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        $vis struct $name(String);

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                if <$name as $crate::Reference>::is_null(self) {
                    f.write_str($crate::NULL_REF)
                } else {
                    f.write_str("OpaqueRef:***")
                }
            }
        }

        impl $name {
            /// The raw token. Never log this.
            pub fn expose(&self) -> &str {
                &self.0
            }
        }

        $crate::reference!(@common $name, $class);
    };
}
