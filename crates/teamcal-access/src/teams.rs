//! Team membership expansion.
//!
//! Resolves root teams into the members of those teams and of every team
//! below them. Traversal is breadth-first: roots in the order given, then
//! children ordered by team id. Each team is visited at most once, so a
//! cycle in the parent links cannot cause non-termination.
//!
//! A user reachable through several teams is reported once, attributed to
//! the first team that reached them. Breadth-first order makes that the
//! shallowest such team, with ties going to the earlier root.

use std::collections::{BTreeSet, HashSet, VecDeque};

use teamcal_core::{TeamId, UserId};
use teamcal_store::Store;

use crate::error::Result;

/// A user reached by team expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedMember {
    pub user_id: UserId,
    /// The team through which the user was first reached.
    pub via_team: TeamId,
    /// Distance from the nearest root (roots are 0).
    pub depth: usize,
}

/// Expand `roots` into deduplicated members, in discovery order.
pub async fn expand_teams<S>(store: &S, roots: &[TeamId]) -> Result<Vec<ExpandedMember>>
where
    S: Store + ?Sized,
{
    expand(store, roots, None).await
}

/// Like [`expand_teams`], but private teams contribute members only when
/// `viewer` belongs to them. Their children are still traversed; each team
/// is judged on its own.
pub async fn expand_teams_visible_to<S>(
    store: &S,
    roots: &[TeamId],
    viewer: &UserId,
) -> Result<Vec<ExpandedMember>>
where
    S: Store + ?Sized,
{
    expand(store, roots, Some(viewer)).await
}

async fn expand<S>(store: &S, roots: &[TeamId], viewer: Option<&UserId>) -> Result<Vec<ExpandedMember>>
where
    S: Store + ?Sized,
{
    let mut visited: HashSet<TeamId> = HashSet::new();
    let mut queue: VecDeque<(TeamId, usize)> = VecDeque::new();
    for root in roots {
        if visited.insert(*root) {
            queue.push_back((*root, 0));
        }
    }

    let mut seen: HashSet<UserId> = HashSet::new();
    let mut members: Vec<ExpandedMember> = Vec::new();

    while let Some((team_id, depth)) = queue.pop_front() {
        let visible = match viewer {
            Some(viewer) => is_visible(store, &team_id, viewer).await?,
            None => true,
        };
        if visible {
            collect_members(store, team_id, depth, &mut seen, &mut members).await?;
        } else {
            tracing::debug!(team_id = %team_id, "private team hidden from viewer, skipping members");
        }

        for child in store.list_child_teams(&team_id).await? {
            if visited.insert(child.id) {
                queue.push_back((child.id, depth + 1));
            } else {
                tracing::debug!(team_id = %child.id, "team already visited, skipping");
            }
        }
    }

    Ok(members)
}

async fn is_visible<S>(store: &S, team_id: &TeamId, viewer: &UserId) -> Result<bool>
where
    S: Store + ?Sized,
{
    match store.get_team(team_id).await? {
        Some(team) if team.is_private => Ok(store.get_team_member(team_id, viewer).await?.is_some()),
        _ => Ok(true),
    }
}

async fn collect_members<S>(
    store: &S,
    team_id: TeamId,
    depth: usize,
    seen: &mut HashSet<UserId>,
    members: &mut Vec<ExpandedMember>,
) -> Result<()>
where
    S: Store + ?Sized,
{
    for member in store.list_team_members(&team_id).await? {
        if !seen.insert(member.user_id) {
            continue;
        }
        members.push(ExpandedMember {
            user_id: member.user_id,
            via_team: team_id,
            depth,
        });
    }
    Ok(())
}

/// The set of users reachable from `roots`.
pub async fn expand_team_user_ids<S>(store: &S, roots: &[TeamId]) -> Result<BTreeSet<UserId>>
where
    S: Store + ?Sized,
{
    Ok(expand_teams(store, roots)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use teamcal_core::{Team, TeamMember};
    use teamcal_store::MemoryStore;

    async fn add_team(store: &MemoryStore, parent: Option<TeamId>) -> TeamId {
        add_team_with(store, parent, false).await
    }

    async fn add_team_with(store: &MemoryStore, parent: Option<TeamId>, is_private: bool) -> TeamId {
        let team = Team {
            id: TeamId::new(),
            name: "team".into(),
            parent_team_id: parent,
            is_private,
            created_by: UserId::new(),
            created_at: 0,
        };
        store.insert_team(&team).await.unwrap();
        team.id
    }

    async fn add_member(store: &MemoryStore, team: TeamId, user: UserId) {
        store
            .insert_team_member(&TeamMember {
                team_id: team,
                user_id: user,
                is_admin: false,
                joined_at: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expands_descendants() {
        let store = MemoryStore::new();
        let root = add_team(&store, None).await;
        let child = add_team(&store, Some(root)).await;
        let grandchild = add_team(&store, Some(child)).await;
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        add_member(&store, root, a).await;
        add_member(&store, child, b).await;
        add_member(&store, grandchild, c).await;

        let users = expand_team_user_ids(&store, &[root]).await.unwrap();
        assert_eq!(users, [a, b, c].into_iter().collect());

        let from_child = expand_team_user_ids(&store, &[child]).await.unwrap();
        assert_eq!(from_child, [b, c].into_iter().collect());
    }

    #[tokio::test]
    async fn test_shallowest_team_wins_provenance() {
        let store = MemoryStore::new();
        let root = add_team(&store, None).await;
        let child = add_team(&store, Some(root)).await;
        let user = UserId::new();
        add_member(&store, child, user).await;
        add_member(&store, root, user).await;

        let members = expand_teams(&store, &[root]).await.unwrap();
        assert_eq!(
            members,
            vec![ExpandedMember {
                user_id: user,
                via_team: root,
                depth: 0,
            }]
        );
    }

    #[tokio::test]
    async fn test_earlier_root_wins_tie() {
        let store = MemoryStore::new();
        let first = add_team(&store, None).await;
        let second = add_team(&store, None).await;
        let user = UserId::new();
        add_member(&store, first, user).await;
        add_member(&store, second, user).await;

        let members = expand_teams(&store, &[second, first]).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].via_team, second);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let store = MemoryStore::new();
        // a -> b -> a, built by pointing a's parent at b after the fact.
        let a_id = TeamId::new();
        let b = add_team(&store, Some(a_id)).await;
        store
            .insert_team(&Team {
                id: a_id,
                name: "a".into(),
                parent_team_id: Some(b),
                is_private: false,
                created_by: UserId::new(),
                created_at: 0,
            })
            .await
            .unwrap();
        let (u1, u2) = (UserId::new(), UserId::new());
        add_member(&store, a_id, u1).await;
        add_member(&store, b, u2).await;

        let users = expand_team_user_ids(&store, &[a_id]).await.unwrap();
        assert_eq!(users, [u1, u2].into_iter().collect());
    }

    #[tokio::test]
    async fn test_self_parent_terminates() {
        let store = MemoryStore::new();
        let id = TeamId::new();
        store
            .insert_team(&Team {
                id,
                name: "loop".into(),
                parent_team_id: Some(id),
                is_private: false,
                created_by: UserId::new(),
                created_at: 0,
            })
            .await
            .unwrap();
        let user = UserId::new();
        add_member(&store, id, user).await;

        let members = expand_teams(&store, &[id]).await.unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_roots() {
        let store = MemoryStore::new();
        let team = add_team(&store, None).await;
        let user = UserId::new();
        add_member(&store, team, user).await;

        let members = expand_teams(&store, &[TeamId::new(), team, team])
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert!(expand_teams(&store, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hidden_private_team_contributes_no_members() {
        let store = MemoryStore::new();
        let root = add_team(&store, None).await;
        let secret = add_team_with(&store, Some(root), true).await;
        let below = add_team(&store, Some(secret)).await;
        let (lead, insider, dev, viewer) = (UserId::new(), UserId::new(), UserId::new(), UserId::new());
        add_member(&store, root, lead).await;
        add_member(&store, secret, insider).await;
        add_member(&store, below, dev).await;

        let outside: BTreeSet<UserId> = expand_teams_visible_to(&store, &[root], &viewer)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        assert_eq!(outside, [lead, dev].into_iter().collect());

        // Members of the private team see it expanded like any other.
        let inside: BTreeSet<UserId> = expand_teams_visible_to(&store, &[root], &insider)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        assert_eq!(inside, [lead, insider, dev].into_iter().collect());
        assert_eq!(inside, expand_team_user_ids(&store, &[root]).await.unwrap());
    }

    /// Build a forest where team `i`'s parent is some team `< i`.
    fn forest_strategy() -> impl Strategy<Value = (Vec<Option<usize>>, Vec<(usize, usize)>)> {
        (1usize..10).prop_flat_map(|n| {
            let parents = (0..n)
                .map(|i| {
                    if i == 0 {
                        Just(None::<usize>).boxed()
                    } else {
                        prop::option::of(0..i).boxed()
                    }
                })
                .collect::<Vec<_>>();
            let memberships = prop::collection::vec((0..n, 0usize..8), 0..24);
            (parents, memberships)
        })
    }

    proptest! {
        #[test]
        fn test_expansion_idempotent_over_descendants(
            (parents, memberships) in forest_strategy(),
            root_pick in any::<prop::sample::Index>(),
            extra in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let users: Vec<UserId> = (0..8).map(|_| UserId::new()).collect();
                let mut ids: Vec<TeamId> = Vec::new();
                for parent in &parents {
                    let id = add_team(&store, parent.map(|p| ids[p])).await;
                    ids.push(id);
                }
                for (team, user) in &memberships {
                    add_member(&store, ids[*team], users[*user]).await;
                }

                let root = root_pick.index(ids.len());
                let descendants: Vec<usize> = (0..ids.len())
                    .filter(|&i| {
                        let mut cur = Some(i);
                        while let Some(c) = cur {
                            if c == root {
                                return true;
                            }
                            cur = parents[c];
                        }
                        false
                    })
                    .collect();

                let mut roots = vec![ids[root]];
                for pick in &extra {
                    roots.push(ids[descendants[pick.index(descendants.len())]]);
                }

                let alone = expand_team_user_ids(&store, &[ids[root]]).await.unwrap();
                let together = expand_team_user_ids(&store, &roots).await.unwrap();
                assert_eq!(alone, together);
            });
        }
    }
}
