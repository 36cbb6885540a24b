use crate::spec::{Ecosystem, Requirement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which side wins when a package appears in both the declared and the
/// resolved dependency lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// The author's entry is kept, even when it carries no version.
    #[default]
    DeclaredWins,
    /// The resolver's pin replaces the author's entry.
    ResolvedWins,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DeclaredWins => "declared-wins",
            Self::ResolvedWins => "resolved-wins",
        })
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declared-wins" | "declared" => Ok(Self::DeclaredWins),
            "resolved-wins" | "resolved" => Ok(Self::ResolvedWins),
            other => Err(format!(
                "unknown merge policy '{other}' (expected: declared-wins, resolved-wins)"
            )),
        }
    }
}

/// Combine declared and resolved entries of one ecosystem into output specs.
///
/// Every key of either side appears exactly once; names compare the way
/// `ecosystem` compares them. Declared keys come first in their original
/// order, followed by resolved-only keys in resolved order. For keys on both
/// sides `policy` picks the entry, except that a declared local entry is never
/// replaced by a registry pin. No filtering happens here: callers drop
/// platform-specific and local entries from `resolved` first.
pub fn merge(
    declared: &[Requirement],
    resolved: &[Requirement],
    ecosystem: Ecosystem,
    policy: MergePolicy,
) -> Vec<String> {
    let mut order: Vec<(String, &Requirement)> = Vec::with_capacity(declared.len() + resolved.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut from_declared: Vec<bool> = Vec::with_capacity(order.capacity());

    for (requirements, is_declared) in [(declared, true), (resolved, false)] {
        for requirement in requirements {
            let key = requirement.key(ecosystem);
            match index.get(&key) {
                Some(&slot) => {
                    let declared_local =
                        from_declared[slot] && matches!(order[slot].1, Requirement::Local { .. });
                    let replace = from_declared[slot] == is_declared
                        || (policy == MergePolicy::ResolvedWins && !declared_local);
                    if replace {
                        order[slot].1 = requirement;
                        from_declared[slot] = is_declared;
                    }
                }
                None => {
                    index.insert(key.clone(), order.len());
                    order.push((key, requirement));
                    from_declared.push(is_declared);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|(_, requirement)| requirement.render())
        .collect()
}
