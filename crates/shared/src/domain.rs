use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(NodeId);
id_newtype!(RemoteId);

impl RemoteId {
    /// Remote id carried by structural placeholders that have no identity on the server.
    pub const SYNTHETIC: RemoteId = RemoteId(0);

    pub fn is_synthetic(self) -> bool {
        self == Self::SYNTHETIC
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant of a node as reported by a connector. Connections and the connections root
/// are registered by the host, never returned as children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ResourceGroup,
    Resource,
}
