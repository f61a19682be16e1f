//! Element hierarchy codec
//!
//! Each bank stores its parent/child forest as one `(first child, next
//! sibling)` pair per element, -1 meaning none. Root elements are chained as
//! siblings of each other. The document stores a parent index per element
//! instead.

use std::collections::VecDeque;

use crate::{Error, Result};

/// On-disk hierarchy entry of one element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    pub first_child: Option<usize>,
    pub next_sibling: Option<usize>,
}

impl Link {
    pub fn new(first_child: Option<usize>, next_sibling: Option<usize>) -> Self {
        Self {
            first_child,
            next_sibling,
        }
    }

    /// Build from the stored integers, where any negative value means none
    pub fn from_raw(first_child: i32, next_sibling: i32) -> Self {
        Self {
            first_child: usize::try_from(first_child).ok(),
            next_sibling: usize::try_from(next_sibling).ok(),
        }
    }

    pub fn to_raw(self) -> (i32, i32) {
        (raw_index(self.first_child), raw_index(self.next_sibling))
    }
}

fn raw_index(index: Option<usize>) -> i32 {
    index.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Unknown,
    Root,
    Child(usize),
}

impl Slot {
    fn parent(self) -> Option<usize> {
        match self {
            Self::Child(parent) => Some(parent),
            _ => None,
        }
    }
}

/// Recover the parent of every element from its link pairs
///
/// Elements named as a first child get that parent directly. Elements never
/// named by any link are roots. Siblings inherit the parent of the element
/// that names them, which may itself only be known after an earlier sibling
/// resolves, so sibling links are processed as a worklist until a pass makes
/// no progress. At most one pass per element is needed.
pub fn parents_from_links(bank: usize, links: &[Link]) -> Result<Vec<Option<usize>>> {
    let n = links.len();
    let mut slots = vec![Slot::Unknown; n];
    let mut referenced = vec![false; n];

    for (element, link) in links.iter().enumerate() {
        for target in [link.first_child, link.next_sibling].into_iter().flatten() {
            if target >= n || target == element {
                return Err(Error::MalformedInput(format!(
                    "bank {}: element {} links to invalid element {}",
                    bank, element, target
                )));
            }
            referenced[target] = true;
        }
    }

    for (element, link) in links.iter().enumerate() {
        if let Some(child) = link.first_child {
            if slots[child] != Slot::Unknown {
                return Err(Error::MalformedInput(format!(
                    "bank {}: element {} is the first child of more than one element",
                    bank, child
                )));
            }
            slots[child] = Slot::Child(element);
        }
    }

    for (element, slot) in slots.iter_mut().enumerate() {
        if !referenced[element] {
            *slot = Slot::Root;
        }
    }

    let mut pending: Vec<(usize, usize)> = links
        .iter()
        .enumerate()
        .filter_map(|(element, link)| link.next_sibling.map(|sibling| (element, sibling)))
        .collect();

    for _ in 0..=n {
        if pending.is_empty() {
            break;
        }
        let before = pending.len();
        let mut conflict = None;
        pending.retain(|&(element, sibling)| {
            let resolved = slots[element];
            if resolved == Slot::Unknown {
                return true;
            }
            match slots[sibling] {
                Slot::Unknown => slots[sibling] = resolved,
                existing if existing != resolved => conflict = Some(sibling),
                _ => {}
            }
            false
        });
        if let Some(sibling) = conflict {
            return Err(Error::MalformedInput(format!(
                "bank {}: element {} is reachable from two different parents",
                bank, sibling
            )));
        }
        if pending.len() == before {
            break;
        }
    }

    let unresolved = slots.iter().filter(|slot| **slot == Slot::Unknown).count();
    if unresolved > 0 || !pending.is_empty() {
        return Err(Error::UnresolvedHierarchy {
            bank,
            unresolved: unresolved.max(pending.len()),
        });
    }

    let parents: Vec<Option<usize>> = slots.into_iter().map(Slot::parent).collect();
    check_forest(bank, &parents)?;
    Ok(parents)
}

/// Flatten parent indices into link pairs
///
/// Children are kept in index order and roots form the top-level sibling
/// chain. The traversal is depth first: descend into the first unvisited
/// child, and when an element has no children left, link it to the next
/// unvisited element of the enclosing scope or pop the scope. An element is
/// linked at most once even if several paths reach it.
pub fn links_from_parents(parents: &[Option<usize>]) -> Vec<Link> {
    let n = parents.len();
    let mut links = vec![Link::default(); n];
    if n == 0 {
        return links;
    }

    // Bucket n holds the roots
    let root = n;
    let mut buckets: Vec<VecDeque<usize>> = vec![VecDeque::new(); n + 1];
    for (element, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) if *p < n && *p != element => buckets[*p].push_back(element),
            _ => buckets[root].push_back(element),
        }
    }

    let mut visited = vec![false; n];

    let Some(mut current) = next_unvisited(&mut buckets[root], &mut visited) else {
        return links;
    };
    let mut scopes = vec![root];

    loop {
        if let Some(child) = next_unvisited(&mut buckets[current], &mut visited) {
            links[current].first_child = Some(child);
            scopes.push(current);
            current = child;
            continue;
        }

        // No children left: move to the next sibling, unwinding exhausted scopes
        loop {
            let Some(&scope) = scopes.last() else {
                return links;
            };
            if let Some(sibling) = next_unvisited(&mut buckets[scope], &mut visited) {
                links[current].next_sibling = Some(sibling);
                current = sibling;
                break;
            }
            scopes.pop();
            if scope == root {
                return links;
            }
            current = scope;
        }
    }
}

fn next_unvisited(bucket: &mut VecDeque<usize>, visited: &mut [bool]) -> Option<usize> {
    while let Some(element) = bucket.pop_front() {
        if !visited[element] {
            visited[element] = true;
            return Some(element);
        }
    }
    None
}

/// Fail if any element is its own ancestor
pub fn check_forest(bank: usize, parents: &[Option<usize>]) -> Result<()> {
    let n = parents.len();
    for start in 0..n {
        let mut current = start;
        let mut steps = 0;
        while let Some(parent) = parents[current] {
            steps += 1;
            if parent == start || steps > n {
                return Err(Error::CyclicHierarchy {
                    bank,
                    element: start,
                });
            }
            if parent >= n {
                return Err(Error::MalformedDocument(format!(
                    "bank {}: element {} has parent {} outside the bank",
                    bank, current, parent
                )));
            }
            current = parent;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(parents: &[Option<usize>]) -> Vec<Option<usize>> {
        parents_from_links(0, &links_from_parents(parents)).unwrap()
    }

    #[test]
    fn test_two_children_of_root() {
        let parents = vec![None, Some(0), Some(0)];
        let links = links_from_parents(&parents);
        assert_eq!(
            links,
            vec![
                Link::new(Some(1), None),
                Link::new(None, Some(2)),
                Link::new(None, None),
            ]
        );
        assert_eq!(parents_from_links(0, &links).unwrap(), parents);
    }

    #[test]
    fn test_multiple_roots_chain_as_siblings() {
        let parents = vec![None, Some(0), Some(0), None];
        let links = links_from_parents(&parents);
        assert_eq!(links[0], Link::new(Some(1), Some(3)));
        assert_eq!(links[3], Link::new(None, None));
        assert_eq!(roundtrip(&parents), parents);
    }

    #[test]
    fn test_deep_chain() {
        let parents = vec![None, Some(0), Some(1), Some(2), Some(3)];
        assert_eq!(roundtrip(&parents), parents);
    }

    #[test]
    fn test_children_before_parent() {
        // Parent appears after its children in index order
        let parents = vec![Some(3), Some(3), Some(0), None, Some(1)];
        assert_eq!(roundtrip(&parents), parents);
    }

    #[test]
    fn test_wide_and_deep_forest() {
        let parents = vec![
            None,
            Some(0),
            Some(0),
            Some(1),
            Some(1),
            Some(2),
            None,
            Some(6),
            Some(7),
            Some(4),
        ];
        assert_eq!(roundtrip(&parents), parents);
    }

    #[test]
    fn test_every_parent_assignment_of_four() {
        // Exhaustive over all acyclic parent arrays with four elements
        let choices = [None, Some(0), Some(1), Some(2), Some(3)];
        for a in choices {
            for b in choices {
                for c in choices {
                    for d in choices {
                        let parents = vec![a, b, c, d];
                        let valid = parents
                            .iter()
                            .enumerate()
                            .all(|(i, p)| *p != Some(i))
                            && check_forest(0, &parents).is_ok();
                        if valid {
                            assert_eq!(roundtrip(&parents), parents, "{:?}", parents);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_bank() {
        assert!(links_from_parents(&[]).is_empty());
        assert!(parents_from_links(0, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_sibling_resolved_in_later_pass() {
        // 3's parent is only known once 2 resolves, which needs 1 first
        let links = vec![
            Link::new(Some(1), None),
            Link::new(None, Some(2)),
            Link::new(None, Some(3)),
            Link::new(None, None),
        ];
        assert_eq!(
            parents_from_links(0, &links).unwrap(),
            vec![None, Some(0), Some(0), Some(0)]
        );
    }

    #[test]
    fn test_sibling_cycle_is_unresolved() {
        // 1 and 2 only name each other
        let links = vec![
            Link::new(None, None),
            Link::new(None, Some(2)),
            Link::new(None, Some(1)),
        ];
        assert!(matches!(
            parents_from_links(3, &links),
            Err(Error::UnresolvedHierarchy { bank: 3, .. })
        ));
    }

    #[test]
    fn test_child_cycle_is_rejected() {
        let links = vec![Link::new(Some(1), None), Link::new(Some(0), None)];
        assert!(matches!(
            parents_from_links(0, &links),
            Err(Error::CyclicHierarchy { .. })
        ));
    }

    #[test]
    fn test_out_of_range_link() {
        let links = vec![Link::new(Some(5), None)];
        assert!(matches!(
            parents_from_links(0, &links),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_raw_conversion() {
        let link = Link::from_raw(-1, 4);
        assert_eq!(link, Link::new(None, Some(4)));
        assert_eq!(link.to_raw(), (-1, 4));
    }

    #[test]
    fn test_check_forest() {
        assert!(check_forest(0, &[None, Some(0), Some(1)]).is_ok());
        assert!(matches!(
            check_forest(0, &[Some(2), Some(0), Some(1)]),
            Err(Error::CyclicHierarchy { .. })
        ));
    }
}
