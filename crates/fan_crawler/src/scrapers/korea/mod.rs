use crate::scrapers::Region;

pub mod jumpball;
pub mod rookie;

pub use jumpball::JumpballParser;
pub use rookie::RookieParser;

pub const REGION: Region = Region {
    name: "korea",
    emoji: "🇰🇷",
};

/// Both sites print Korea Standard Time.
pub const KST_OFFSET_SECS: i32 = 9 * 3600;
