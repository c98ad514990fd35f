//! Account hierarchy (forest) construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use keelbook_shared::types::AccountId;

use super::types::AccountSummary;

/// A node in the chart of accounts tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNode {
    /// The account at this node.
    pub account: AccountSummary,
    /// Child accounts, ordered by code.
    pub children: Vec<AccountNode>,
}

/// Builds the account forest from a flat list.
///
/// Groups accounts by `parent_id` into an adjacency map first, so the
/// build is O(n) rather than a nested scan. Accounts whose parent is not
/// present in the input are treated as roots, which keeps partial reads
/// (e.g., a filtered subtree) usable.
#[must_use]
pub fn build_hierarchy(accounts: Vec<AccountSummary>) -> Vec<AccountNode> {
    let known: std::collections::HashSet<AccountId> = accounts.iter().map(|a| a.id).collect();

    let mut children_of: HashMap<Option<AccountId>, Vec<AccountSummary>> = HashMap::new();
    for account in accounts {
        let key = match account.parent_id {
            Some(pid) if known.contains(&pid) => Some(pid),
            _ => None,
        };
        children_of.entry(key).or_default().push(account);
    }

    let mut roots = attach_children(None, &mut children_of);
    sort_nodes(&mut roots);
    roots
}

fn attach_children(
    parent: Option<AccountId>,
    children_of: &mut HashMap<Option<AccountId>, Vec<AccountSummary>>,
) -> Vec<AccountNode> {
    let Some(accounts) = children_of.remove(&parent) else {
        return Vec::new();
    };

    accounts
        .into_iter()
        .map(|account| {
            let children = attach_children(Some(account.id), children_of);
            AccountNode { account, children }
        })
        .collect()
}

fn sort_nodes(nodes: &mut Vec<AccountNode>) {
    nodes.sort_by(|a, b| a.account.code.cmp(&b.account.code));
    for node in nodes {
        sort_nodes(&mut node.children);
    }
}
