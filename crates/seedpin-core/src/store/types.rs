//! Record types stored in the seed database.

/// Seed identifier.
pub type SeedId = i64;

/// SeedObject row identifier.
pub type ObjectId = i64;

/// Default chunk size handed to the download driver (512 KiB).
pub const DEFAULT_CHUNK_SIZE: i64 = 524_288;

/// Persisted lifecycle status of a SeedObject, stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Queued,
    Error,
    Finished,
    Paused,
    Cancelled,
}

impl ObjectStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            ObjectStatus::Queued => 0,
            ObjectStatus::Error => 1,
            ObjectStatus::Finished => 2,
            ObjectStatus::Paused => 3,
            ObjectStatus::Cancelled => 4,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => ObjectStatus::Queued,
            2 => ObjectStatus::Finished,
            3 => ObjectStatus::Paused,
            4 => ObjectStatus::Cancelled,
            _ => ObjectStatus::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectStatus::Queued => "queued",
            ObjectStatus::Error => "error",
            ObjectStatus::Finished => "finished",
            ObjectStatus::Paused => "paused",
            ObjectStatus::Cancelled => "cancelled",
        }
    }
}

/// Progress code of one aspect (pin or download), stored in `pin_status` / `download_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectStatus {
    Idle,
    InProgress,
    Done,
    Error,
}

impl AspectStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            AspectStatus::Idle => 0,
            AspectStatus::InProgress => 1,
            AspectStatus::Done => 2,
            AspectStatus::Error => 3,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => AspectStatus::InProgress,
            2 => AspectStatus::Done,
            3 => AspectStatus::Error,
            _ => AspectStatus::Idle,
        }
    }
}

/// A registered seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub id: SeedId,
    pub dag_cid: String,
    pub date_added: i64,
    pub hidden: bool,
    pub status: i64,
}

/// Per-object pin/download configuration and checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedObject {
    pub id: ObjectId,
    pub seed_id: SeedId,
    pub obj_index: i64,
    pub pin: bool,
    pub pinned: bool,
    pub pinned_date: Option<i64>,
    pub pinned_nodes_cur: i64,
    pub pinned_nodes_final: i64,
    pub pin_status: AspectStatus,
    pub download: bool,
    pub downloaded: bool,
    pub downloaded_date: Option<i64>,
    pub downloaded_to: Option<String>,
    pub download_status: AspectStatus,
    pub download_chunk_size: i64,
    pub status: ObjectStatus,
    pub ignore: bool,
    pub pubsub_notify: bool,
}

impl SeedObject {
    /// Pin requested and not yet achieved.
    pub fn pin_pending(&self) -> bool {
        self.pin && !self.pinned
    }

    /// Download requested and not yet achieved.
    pub fn download_pending(&self) -> bool {
        self.download && !self.downloaded
    }

    /// Every requested aspect is achieved.
    pub fn is_satisfied(&self) -> bool {
        !self.pin_pending() && !self.download_pending()
    }
}

/// One object listed in a seed's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub seed_id: SeedId,
    pub obj_index: i64,
    pub name: String,
    pub path: String,
    pub size: Option<i64>,
    pub date_created: i64,
}

/// Search result: a manifest entry together with the seed it belongs to.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub seed_id: SeedId,
    pub dag_cid: String,
    pub obj_index: i64,
    pub name: String,
    pub date_created: i64,
}
