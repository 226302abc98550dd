use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::metrics::{Node, Role, User};

/// Source of the node roster and user directory.
///
/// The dashboard only reads through this trait; editing nodes and users is
/// left to whatever backs the provider.
pub trait RosterProvider: Send + Sync {
    fn nodes(&self) -> Vec<Node>;

    fn users(&self) -> Vec<User>;

    fn find_node(&self, id: &str) -> Result<Node> {
        self.nodes()
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found(format!("node '{}'", id)))
    }

    fn find_user(&self, id: u32) -> Result<User> {
        self.users()
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::not_found(format!("user {}", id)))
    }

    /// Nodes visible to `user`: everything for an administrator, owned nodes otherwise.
    fn view_nodes(&self, user: &User) -> Vec<Node> {
        let nodes = self.nodes();
        match user.role {
            Role::Admin => nodes,
            Role::Beekeeper => nodes
                .into_iter()
                .filter(|n| n.owner == Some(user.id))
                .collect(),
        }
    }
}

/// Fixed roster, usually built from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    nodes: Vec<Node>,
    users: Vec<User>,
}

impl StaticRoster {
    pub fn new(nodes: Vec<Node>, users: Vec<User>) -> Result<Self> {
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(Error::Config(format!("duplicate node id '{}'", node.id)));
            }
        }

        let mut seen = HashSet::new();
        for user in &users {
            if !seen.insert(user.id) {
                return Err(Error::Config(format!("duplicate user id {}", user.id)));
            }
        }

        Ok(Self { nodes, users })
    }
}

impl RosterProvider for StaticRoster {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    fn users(&self) -> Vec<User> {
        self.users.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NodeKind;

    fn user(id: u32, role: Role) -> User {
        User {
            id,
            name: format!("user {}", id),
            email: format!("user{}@apiary.test", id),
            role,
        }
    }

    fn roster() -> StaticRoster {
        StaticRoster::new(
            vec![
                Node::new("node_001", "North", NodeKind::Hive).with_owner(2),
                Node::new("node_002", "South", NodeKind::Hive).with_owner(3),
                Node::new("node_A_001", "North", NodeKind::Ambient).with_owner(2),
                Node::new("node_A_009", "Spare", NodeKind::Ambient),
            ],
            vec![user(1, Role::Admin), user(2, Role::Beekeeper), user(3, Role::Beekeeper)],
        )
        .unwrap()
    }

    #[test]
    fn test_admin_sees_every_node() {
        let roster = roster();
        let admin = roster.find_user(1).unwrap();
        assert_eq!(roster.view_nodes(&admin).len(), 4);
    }

    #[test]
    fn test_beekeeper_sees_owned_nodes() {
        let roster = roster();
        let beekeeper = roster.find_user(2).unwrap();
        let ids: Vec<String> = roster.view_nodes(&beekeeper).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["node_001", "node_A_001"]);

        let unassigned = user(7, Role::Beekeeper);
        assert!(roster.view_nodes(&unassigned).is_empty());
    }

    #[test]
    fn test_lookup_errors() {
        let roster = roster();
        assert!(matches!(roster.find_node("node_404"), Err(Error::NotFound(_))));
        assert!(matches!(roster.find_user(404), Err(Error::NotFound(_))));
        assert_eq!(roster.find_node("node_002").unwrap().name, "South");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = StaticRoster::new(
            vec![
                Node::new("node_001", "A", NodeKind::Hive),
                Node::new("node_001", "B", NodeKind::Ambient),
            ],
            vec![],
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
