use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{FeederError, FeederResult};
use crate::sources::traits::{Download, Downloader};

pub const DEFAULT_DL_TEMPLATE: &str = "yt-dlp --extract-audio --audio-format=mp3 --audio-quality=0 -f m4a/bestaudio \"https://www.youtube.com/watch?v={ID}\" --no-progress -o {FileName}.tmp";

/// Runs an external command rendered from a template, e.g. yt-dlp.
///
/// `{ID}` is replaced with the video id and `{FileName}` with the file base
/// name. The command runs through `sh -c` inside `files_location` and must
/// leave `<files_location>/<FileName>.mp3` behind.
pub struct CommandDownloader {
    template: String,
    files_location: PathBuf,
}

impl CommandDownloader {
    pub fn new(template: impl Into<String>, files_location: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            files_location: files_location.into(),
        }
    }

    fn render(&self, video_id: &str, file_name: &str) -> String {
        self.template
            .replace("{ID}", video_id)
            .replace("{FileName}", file_name)
    }
}

#[async_trait]
impl Downloader for CommandDownloader {
    async fn get(&self, video_id: &str, file_name: &str) -> FeederResult<Download> {
        tokio::fs::create_dir_all(&self.files_location).await?;

        let command = self.render(video_id, file_name);
        debug!(video = video_id, %command, "starting download");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.files_location)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FeederError::Download(format!(
                "{} exited with {}: {}",
                video_id,
                output.status,
                stderr.trim()
            )));
        }

        let file = self.files_location.join(format!("{}.mp3", file_name));
        if !tokio::fs::try_exists(&file).await? {
            return Err(FeederError::DownloadSkipped(format!(
                "{} produced no {}",
                video_id,
                file.display()
            )));
        }

        info!(video = video_id, file = %file.display(), "downloaded");
        Ok(Download {
            file: file.to_string_lossy().into_owned(),
        })
    }
}

/// Run the downloader self-update command, e.g. `yt-dlp -U`.
pub async fn run_update(command: &str) -> FeederResult<()> {
    info!(%command, "updating downloader");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "update finished");
    if !output.status.success() {
        return Err(FeederError::Download(format!(
            "update command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
