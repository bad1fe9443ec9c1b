//! Shared constants for end-to-end tests
//!
//! The fixture catalog is seeded into a fresh database, so row ids are
//! assigned in insertion order and can be relied on here. When the fixture
//! data changes, update only this file and `fixtures.rs`.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular family member, may edit metadata
pub const TEST_USER: &str = "visitor";

pub const TEST_PASS: &str = "visitor-pw-123";

/// Staff user, may also replace chapter metadata wholesale
pub const STAFF_USER: &str = "curator";

pub const STAFF_PASS: &str = "curator-pw-123";

// ============================================================================
// Films
// ============================================================================

/// "Disneyland 1962", linked to a video
pub const FILM_DISNEY: &str = "P61_reel1";
pub const FILM_DISNEY_TITLE: &str = "Disneyland 1962";

/// "Christmas at Grandpa's", linked to a video
pub const FILM_XMAS: &str = "P70_reel2";
pub const FILM_XMAS_TITLE: &str = "Christmas at Grandpa's";

/// Imported but not yet mapped to a video
pub const FILM_PENDING: &str = "P80_pending";
pub const FILM_PENDING_TITLE: &str = "Pending reel";

pub const FILM_COUNT: i64 = 3;

// ============================================================================
// Chapters
// ============================================================================

/// "Arrival" at 0:00 in the Disneyland film, years 1962
pub const CHAPTER_ARRIVAL_ID: i64 = 1;

/// "Main Street" at 1:30 in the Disneyland film, years 1963
pub const CHAPTER_MAIN_STREET_ID: i64 = 2;

/// "Tree" at 0:00 in the Christmas film
pub const CHAPTER_TREE_ID: i64 = 3;

// ============================================================================
// People
// ============================================================================

/// Ruth Hayward, on the Disneyland film; married to George
pub const RUTH_ID: i64 = 1;

/// Doug Thompson, only on the "Arrival" chapter
pub const DOUG_ID: i64 = 2;

/// Sandy Thompson, not linked to any film
pub const SANDY_ID: i64 = 3;

/// George Hayward, on the Christmas film
pub const GEORGE_ID: i64 = 4;

/// Cal Hayward, child of George and Ruth, on the "Tree" chapter
pub const CAL_ID: i64 = 5;

/// "Ruth" with a blank last name, duplicate of Ruth Hayward on the Christmas film
pub const RUTH_BLANK_ID: i64 = 6;

// ============================================================================
// Locations and tags
// ============================================================================

/// Anaheim, on the Disneyland film
pub const ANAHEIM_ID: i64 = 1;

/// Disneyland, on the "Arrival" chapter
pub const DISNEYLAND_ID: i64 = 2;

/// Reno, on the Christmas film
pub const RENO_ID: i64 = 3;

/// Film-level tag of the Disneyland film
pub const TAG_DISNEY: &str = "disney";

/// Chapter-level tag of "Arrival"
pub const TAG_PARADE: &str = "parade";

/// Film-level tag of the Christmas film
pub const TAG_CHRISTMAS: &str = "christmas";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for the test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Per-request timeout of the test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
