//! Admin permissions using bitflags.
//!
//! A user's effective permissions are the union of the permissions of every
//! group they belong to.

use bitflags::bitflags;

bitflags! {
    /// Admin permissions represented as a 64-bit bitfield.
    ///
    /// Stored as BIGINT on `groups.permissions`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct AdminPermissions: u64 {
        /// Create and update boards
        const MANAGE_BOARDS   = 1 << 0;
        /// Change topic status and delete topics
        const MANAGE_TOPICS   = 1 << 1;
        /// Delete posts
        const MANAGE_POSTS    = 1 << 2;
        /// Create and update ban rules
        const MANAGE_BANS     = 1 << 3;
        /// Create and update banned word rules
        const MANAGE_BANWORDS = 1 << 4;
        /// Create, update and delete pages
        const MANAGE_PAGES    = 1 << 5;
        /// Read and update runtime settings
        const MANAGE_SETTINGS = 1 << 6;
        /// Post topics and replies attributed to staff
        const POST_AS_STAFF   = 1 << 7;
    }
}

impl AdminPermissions {
    /// Moderators handle day-to-day content.
    pub const MODERATOR: Self = Self::MANAGE_TOPICS
        .union(Self::MANAGE_POSTS)
        .union(Self::MANAGE_BANS)
        .union(Self::MANAGE_BANWORDS)
        .union(Self::POST_AS_STAFF);

    /// Create permissions from a database BIGINT value. Unknown bits are
    /// dropped.
    #[must_use]
    pub const fn from_db(value: i64) -> Self {
        Self::from_bits_truncate(value as u64)
    }

    #[must_use]
    pub const fn to_db(self) -> i64 {
        self.bits() as i64
    }

    /// Check if this permission set includes all of `required`.
    #[must_use]
    pub const fn has(self, required: Self) -> bool {
        self.contains(required)
    }
}
