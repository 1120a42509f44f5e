// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// A label that is not part of an enum's closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {enum_name} label {label:?}")]
pub struct UnknownLabel {
    pub enum_name: &'static str,
    pub label: String,
}

/// Declares a closed enum whose variants travel as string labels.
///
/// ```
/// xenapi_wire::wire_enum! {
///     pub enum BondMode: "bond_mode" {
///         BalanceSlb => "balance-slb",
///         ActiveBackup => "active-backup",
///         Lacp => "lacp",
///     }
/// }
///
/// assert_eq!(BondMode::Lacp.as_str(), "lacp");
/// assert_eq!("active-backup".parse::<BondMode>(), Ok(BondMode::ActiveBackup));
/// assert!("lacp-fast".parse::<BondMode>().is_err());
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $wire:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Wire name of the enum type.
            pub const NAME: &'static str = $wire;

            /// Every member of the closed set, in schema order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $label => Ok($name::$variant), )+
                    _ => Err($crate::UnknownLabel {
                        enum_name: $wire,
                        label: s.to_string(),
                    }),
                }
            }
        }

        impl $crate::Marshal for $name {
            fn marshal(
                &self,
                _site: &$crate::CallSite,
            ) -> Result<$crate::Value, $crate::CodecError> {
                Ok($crate::Value::String(self.as_str().to_string()))
            }
        }

        impl $crate::Unmarshal for $name {
            fn unmarshal(
                value: $crate::Value,
                site: &$crate::CallSite,
            ) -> Result<Self, $crate::CodecError> {
                let label = <String as $crate::Unmarshal>::unmarshal(value, site)?;
                $crate::enums::parse_label(label, site)
            }
        }

        impl $crate::MapKey for $name {
            fn to_key(&self, _site: &$crate::CallSite) -> Result<String, $crate::CodecError> {
                Ok(self.as_str().to_string())
            }

            fn from_key(key: String, site: &$crate::CallSite) -> Result<Self, $crate::CodecError> {
                $crate::enums::parse_label(key, site)
            }
        }
    };
}

/// Parses a received label, turning an unknown one into a codec error at `site`.
pub fn parse_label<E>(label: String, site: &crate::CallSite) -> Result<E, crate::CodecError>
where
    E: std::str::FromStr<Err = UnknownLabel>,
{
    label
        .parse::<E>()
        .map_err(|e| crate::CodecError::UnknownEnumLabel {
            site: site.into(),
            enum_name: e.enum_name,
            label: e.label,
        })
}
