//! Compile-time build stamp consumed by `grGetVersion`/`grGetString`.
//! `SPEC_FULL.md` §A.5.

use build_time::build_time_local;

pub const BUILD_DATE_TIME: &str = build_time_local!("%Y-%m-%d %H:%M:%S");

/// The string returned by `grGetVersion`/`grGetString(GR_VERSION)`: a
/// Glide-style version token followed by the build stamp.
pub fn version_string() -> String {
    format!("3.0.0 glide3x {}", BUILD_DATE_TIME)
}
