//! Application-wide constants.

use serde::Serialize;

/// One entry of the streaming quality ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityLevel {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl QualityLevel {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Fixed rendition table. Read-only for the lifetime of the process.
pub const QUALITY_LADDER: [QualityLevel; 4] = [
    QualityLevel {
        label: "1080p",
        width: 1920,
        height: 1080,
        bitrate_kbps: 5000,
    },
    QualityLevel {
        label: "720p",
        width: 1280,
        height: 720,
        bitrate_kbps: 3000,
    },
    QualityLevel {
        label: "480p",
        width: 854,
        height: 480,
        bitrate_kbps: 1500,
    },
    QualityLevel {
        label: "360p",
        width: 640,
        height: 360,
        bitrate_kbps: 800,
    },
];

/// Look up a ladder entry by label (case-insensitive).
pub fn quality_level(label: &str) -> Option<&'static QualityLevel> {
    QUALITY_LADDER
        .iter()
        .find(|level| level.label.eq_ignore_ascii_case(label.trim()))
}

/// Directories created under the storage root at start-up.
pub const RECORDINGS_DIR: &str = "recordings";
pub const VOICEOVERS_DIR: &str = "voiceovers";
pub const COMPOSED_VIDEOS_DIR: &str = "composed_videos";
pub const THUMBNAILS_DIR: &str = "thumbnails";
pub const TEMP_DIR: &str = "temp";

pub const DEFAULT_THUMBNAIL_OFFSET_SECS: f64 = 5.0;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 640;
pub const DEFAULT_MAX_CONCURRENT_RENDITIONS: usize = 4;
pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 1800;

pub const MIB: u64 = 1024 * 1024;
pub const DEFAULT_MULTIPART_THRESHOLD_BYTES: u64 = 100 * MIB;
pub const DEFAULT_MULTIPART_CHUNK_SIZE_BYTES: u64 = 10 * MIB;
/// S3 rejects non-final parts smaller than this.
pub const MIN_MULTIPART_CHUNK_SIZE_BYTES: u64 = 5 * MIB;
pub const DEFAULT_MULTIPART_MAX_PARALLEL_PARTS: usize = 4;
pub const DEFAULT_PRESIGNED_URL_EXPIRY_HOURS: i64 = 24;

/// Watch percentage at or above which a view counts as completed.
pub const COMPLETION_WATCH_PERCENTAGE: f64 = 90.0;
