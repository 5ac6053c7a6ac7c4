use tracing::warn;

use crate::sources::traits::DurationService;

/// Sums the MPEG frame lengths of an mp3 file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp3Duration;

impl DurationService for Mp3Duration {
    fn file(&self, path: &str) -> u32 {
        match mp3_duration::from_path(path) {
            Ok(duration) => u32::try_from(duration.as_secs()).unwrap_or(u32::MAX),
            Err(e) => {
                warn!(file = path, "can't get duration: {}", e);
                0
            }
        }
    }
}
