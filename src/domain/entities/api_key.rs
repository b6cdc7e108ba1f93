use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability required to reach a gated namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadPosts,
    WritePosts,
    ReadUsers,
    WriteUsers,
    Admin,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ReadPosts => "readPosts",
            Capability::WritePosts => "writePosts",
            Capability::ReadUsers => "readUsers",
            Capability::WriteUsers => "writeUsers",
            Capability::Admin => "admin",
        }
    }
}

/// Closed permission record attached to every key. All five flags are always
/// present; there is no "unset" state to null-check downstream.
///
/// Flags missing from a payload deserialize as `false` (deny). The
/// read-posts-only default applies at creation, not on re-parse: a partial
/// permissions edit must not quietly re-grant anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSet {
    #[serde(default)]
    pub read_posts: bool,
    #[serde(default)]
    pub write_posts: bool,
    #[serde(default)]
    pub read_users: bool,
    #[serde(default)]
    pub write_users: bool,
    #[serde(default)]
    pub admin: bool,
}

impl Default for PermissionSet {
    /// New keys start read-only on posts.
    fn default() -> Self {
        Self {
            read_posts: true,
            write_posts: false,
            read_users: false,
            write_users: false,
            admin: false,
        }
    }
}

impl PermissionSet {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ReadPosts => self.read_posts,
            Capability::WritePosts => self.write_posts,
            Capability::ReadUsers => self.read_users,
            Capability::WriteUsers => self.write_users,
            Capability::Admin => self.admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    /// First 8 hex characters of the secret, stored in clear for lookup.
    pub key_prefix: String,
    /// SHA-256 hex digest of the full secret. The only persisted form.
    pub key_digest: String,
    pub permissions: PermissionSet,
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Expiry is an independent gate: a key can be enabled and still expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Display form for the dashboard: prefix plus a masked tail.
    pub fn masked(&self) -> String {
        format!("{}{}", self.key_prefix, "…")
    }
}
