//! Anchor-based task insertion (spec §3 "Anchor", §4.2 `create_task`, §9
//! "anchor-first insertion model": explicit `position` wins over an anchor,
//! which wins over the default of appending as `last_child`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    FirstChild,
    LastChild,
    Before { sibling_id: i64 },
    After { sibling_id: i64 },
}

/// Where to insert a new sibling, resolved from an explicit `position`, an
/// [`Anchor`], or neither.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedInsertion {
    pub position: i64,
}

/// Resolve the insertion position among `existing_siblings` (ordered by
/// position, with their ids), honoring the precedence documented in spec §9:
/// an explicit `position` always wins; otherwise the anchor; otherwise append.
pub fn resolve_position(
    explicit_position: Option<i64>,
    anchor: Option<Anchor>,
    existing_siblings: &[(i64, i64)],
) -> Result<ResolvedInsertion, String> {
    if let Some(position) = explicit_position {
        let clamped = position.clamp(0, existing_siblings.len() as i64);
        return Ok(ResolvedInsertion { position: clamped });
    }

    match anchor {
        None | Some(Anchor::LastChild) => Ok(ResolvedInsertion {
            position: existing_siblings.len() as i64,
        }),
        Some(Anchor::FirstChild) => Ok(ResolvedInsertion { position: 0 }),
        Some(Anchor::Before { sibling_id }) => {
            let (idx, _) = existing_siblings
                .iter()
                .enumerate()
                .find(|(_, (id, _))| *id == sibling_id)
                .ok_or_else(|| format!("anchor sibling {sibling_id} not found among siblings"))?;
            Ok(ResolvedInsertion {
                position: existing_siblings[idx].1,
            })
        }
        Some(Anchor::After { sibling_id }) => {
            let (idx, _) = existing_siblings
                .iter()
                .enumerate()
                .find(|(_, (id, _))| *id == sibling_id)
                .ok_or_else(|| format!("anchor sibling {sibling_id} not found among siblings"))?;
            Ok(ResolvedInsertion {
                position: existing_siblings[idx].1 + 1,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_position_wins_over_anchor() {
        let siblings = vec![(1, 0), (2, 1)];
        let resolved = resolve_position(Some(0), Some(Anchor::LastChild), &siblings).unwrap();
        assert_eq!(resolved.position, 0);
    }

    #[test]
    fn before_anchor_resolves_to_sibling_position() {
        let siblings = vec![(1, 0), (2, 1), (3, 2)];
        let resolved = resolve_position(None, Some(Anchor::Before { sibling_id: 2 }), &siblings).unwrap();
        assert_eq!(resolved.position, 1);
    }

    #[test]
    fn after_anchor_resolves_past_sibling_position() {
        let siblings = vec![(1, 0), (2, 1), (3, 2)];
        let resolved = resolve_position(None, Some(Anchor::After { sibling_id: 2 }), &siblings).unwrap();
        assert_eq!(resolved.position, 2);
    }

    #[test]
    fn no_anchor_defaults_to_last_child() {
        let siblings = vec![(1, 0), (2, 1)];
        let resolved = resolve_position(None, None, &siblings).unwrap();
        assert_eq!(resolved.position, 2);
    }

    #[test]
    fn unknown_anchor_sibling_is_rejected() {
        let siblings = vec![(1, 0)];
        let err = resolve_position(None, Some(Anchor::Before { sibling_id: 99 }), &siblings);
        assert!(err.is_err());
    }
}
