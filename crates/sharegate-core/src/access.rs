//! Access levels and the precedence rule shared by resolution and listing.
//!
//! Every path through which a viewer can see a session is expressed as an
//! [`AccessGrant`]. When several grants apply to the same session, the one
//! with the highest [`AccessType`] wins; among grants of the same type the
//! most recently created one is reported.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::ShareId;

/// The effective access a viewer has to a session.
///
/// Variants are declared in ascending precedence, so the derived `Ord` is the
/// precedence order: `Owner > Recipient > System > Public > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// No access.
    None,
    /// Anyone holding the link.
    Public,
    /// Any authenticated user.
    System,
    /// An invited recipient.
    Recipient,
    /// The session owner.
    Owner,
}

impl AccessType {
    /// Stable label used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::None => "none",
            AccessType::Public => "public",
            AccessType::System => "system",
            AccessType::Recipient => "recipient",
            AccessType::Owner => "owner",
        }
    }

    /// Whether this level grants any access at all.
    pub fn grants_access(&self) -> bool {
        !matches!(self, AccessType::None)
    }

    /// Whether this level can only be obtained by an authenticated viewer.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            AccessType::Owner | AccessType::Recipient | AccessType::System
        )
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessType::None),
            "public" => Ok(AccessType::Public),
            "system" => Ok(AccessType::System),
            "recipient" => Ok(AccessType::Recipient),
            "owner" => Ok(AccessType::Owner),
            other => Err(CoreError::UnknownLabel {
                kind: "access type",
                label: other.to_string(),
            }),
        }
    }
}

/// Result of resolving a viewer's access to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInfo {
    /// The effective access level.
    pub access_type: AccessType,

    /// The share that grants access. Absent for owner, none, and synthetic
    /// share-all grants.
    pub share_id: Option<ShareId>,

    /// True when an unauthenticated viewer could gain access by logging in.
    pub auth_may_help: bool,
}

impl AccessInfo {
    /// Owner access.
    pub const fn owner() -> Self {
        Self {
            access_type: AccessType::Owner,
            share_id: None,
            auth_may_help: false,
        }
    }

    /// No access.
    pub const fn none(auth_may_help: bool) -> Self {
        Self {
            access_type: AccessType::None,
            share_id: None,
            auth_may_help,
        }
    }

    /// Whether the viewer is the owner.
    pub fn is_owner(&self) -> bool {
        self.access_type == AccessType::Owner
    }

    /// Whether any access was granted.
    pub fn has_access(&self) -> bool {
        self.access_type.grants_access()
    }
}

impl From<AccessGrant> for AccessInfo {
    fn from(grant: AccessGrant) -> Self {
        Self {
            access_type: grant.access_type,
            share_id: grant.share_id,
            auth_may_help: false,
        }
    }
}

/// One path through which a viewer can reach a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// The level this path grants.
    pub access_type: AccessType,

    /// The backing share, if any.
    pub share_id: Option<ShareId>,

    /// When the backing share was created (Unix ms). Zero for owner and
    /// synthetic grants.
    pub created_at: i64,
}

impl AccessGrant {
    /// The ownership path.
    pub const fn owner() -> Self {
        Self {
            access_type: AccessType::Owner,
            share_id: None,
            created_at: 0,
        }
    }

    /// A grant backed by a concrete share row.
    pub const fn via_share(access_type: AccessType, share_id: ShareId, created_at: i64) -> Self {
        Self {
            access_type,
            share_id: Some(share_id),
            created_at,
        }
    }

    /// A grant with no share row behind it (share-all mode).
    pub const fn synthetic(access_type: AccessType) -> Self {
        Self {
            access_type,
            share_id: None,
            created_at: 0,
        }
    }

    /// Whether `self` should replace `other` as the winning grant.
    ///
    /// Higher access type wins. On a tie the newer share wins, and a concrete
    /// share wins over a synthetic grant of the same level.
    pub fn outranks(&self, other: &AccessGrant) -> bool {
        match self.access_type.cmp(&other.access_type) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match (self.share_id, other.share_id) {
                (Some(_), None) => true,
                (None, Some(_)) => false,
                _ => self.created_at > other.created_at,
            },
        }
    }
}

/// Pick the winning grant among candidates.
pub fn strongest_grant<I>(grants: I) -> Option<AccessGrant>
where
    I: IntoIterator<Item = AccessGrant>,
{
    grants.into_iter().fold(None, |best, grant| match best {
        Some(current) if !grant.outranks(&current) => Some(current),
        _ => Some(grant),
    })
}

/// Collapse rows that refer to the same key, keeping the highest-precedence row.
///
/// The relative order of the surviving rows is unspecified; callers sort
/// afterwards.
pub fn dedup_by_precedence<T, K, FK, FG>(rows: Vec<T>, key: FK, grant: FG) -> Vec<T>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FG: Fn(&T) -> AccessGrant,
{
    let mut winners: HashMap<K, T> = HashMap::with_capacity(rows.len());
    for row in rows {
        let k = key(&row);
        let replace = match winners.get(&k) {
            Some(existing) => grant(&row).outranks(&grant(existing)),
            None => true,
        };
        if replace {
            winners.insert(k, row);
        }
    }
    winners.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ID_LEN;

    fn share(b: u8) -> ShareId {
        ShareId::from_bytes([b; ID_LEN])
    }

    #[test]
    fn test_precedence_order() {
        assert!(AccessType::Owner > AccessType::Recipient);
        assert!(AccessType::Recipient > AccessType::System);
        assert!(AccessType::System > AccessType::Public);
        assert!(AccessType::Public > AccessType::None);
    }

    #[test]
    fn test_label_roundtrip() {
        for t in [
            AccessType::None,
            AccessType::Public,
            AccessType::System,
            AccessType::Recipient,
            AccessType::Owner,
        ] {
            assert_eq!(t.as_str().parse::<AccessType>().unwrap(), t);
        }
        assert!("private_share".parse::<AccessType>().is_err());
    }

    #[test]
    fn test_strongest_grant_prefers_higher_type() {
        let winner = strongest_grant([
            AccessGrant::via_share(AccessType::Public, share(1), 30),
            AccessGrant::via_share(AccessType::Recipient, share(2), 10),
            AccessGrant::via_share(AccessType::System, share(3), 20),
        ])
        .unwrap();
        assert_eq!(winner.access_type, AccessType::Recipient);
        assert_eq!(winner.share_id, Some(share(2)));
    }

    #[test]
    fn test_strongest_grant_tie_breaks_on_newest_share() {
        let winner = strongest_grant([
            AccessGrant::via_share(AccessType::System, share(1), 10),
            AccessGrant::via_share(AccessType::System, share(2), 50),
            AccessGrant::synthetic(AccessType::System),
        ])
        .unwrap();
        assert_eq!(winner.share_id, Some(share(2)));
    }

    #[test]
    fn test_owner_never_shadowed() {
        let winner = strongest_grant([
            AccessGrant::via_share(AccessType::Recipient, share(1), i64::MAX),
            AccessGrant::owner(),
        ])
        .unwrap();
        assert_eq!(winner.access_type, AccessType::Owner);
        assert_eq!(winner.share_id, None);
    }

    #[test]
    fn test_strongest_grant_empty() {
        assert!(strongest_grant(std::iter::empty()).is_none());
    }

    #[test]
    fn test_dedup_keeps_one_row_per_key() {
        let rows = vec![
            ("a", AccessGrant::via_share(AccessType::System, share(1), 1)),
            ("a", AccessGrant::owner()),
            ("b", AccessGrant::via_share(AccessType::System, share(2), 1)),
            ("a", AccessGrant::via_share(AccessType::Recipient, share(3), 9)),
            ("b", AccessGrant::via_share(AccessType::Recipient, share(4), 1)),
        ];
        let mut out = dedup_by_precedence(rows, |r| r.0, |r| r.1);
        out.sort_by_key(|r| r.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1.access_type, AccessType::Owner);
        assert_eq!(out[1].1.access_type, AccessType::Recipient);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_grant() -> impl Strategy<Value = AccessGrant> {
            (0u8..4, any::<u8>(), 0i64..1_000, any::<bool>()).prop_map(
                |(level, id, created_at, synthetic)| {
                    let access_type = match level {
                        0 => AccessType::Public,
                        1 => AccessType::System,
                        2 => AccessType::Recipient,
                        _ => AccessType::Owner,
                    };
                    if access_type == AccessType::Owner {
                        AccessGrant::owner()
                    } else if synthetic {
                        AccessGrant::synthetic(access_type)
                    } else {
                        AccessGrant::via_share(access_type, share(id), created_at)
                    }
                },
            )
        }

        proptest! {
            #[test]
            fn winner_has_max_level(grants in prop::collection::vec(arb_grant(), 1..12)) {
                let winner = strongest_grant(grants.clone()).unwrap();
                let max = grants.iter().map(|g| g.access_type).max().unwrap();
                prop_assert_eq!(winner.access_type, max);
            }

            #[test]
            fn winner_ignores_input_order(grants in prop::collection::vec(arb_grant(), 1..12)) {
                let forward = strongest_grant(grants.clone()).unwrap();
                let backward = strongest_grant(grants.into_iter().rev()).unwrap();
                prop_assert_eq!(forward.access_type, backward.access_type);
                prop_assert_eq!(forward.created_at, backward.created_at);
            }
        }
    }
}
