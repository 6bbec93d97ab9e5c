//! Text rendering for the terminal dashboard. Nothing here touches the
//! terminal itself.

use crate::events::{PlayStatus, Progress};
use crate::state::{NowPlaying, TrackSource};

pub const BAR_WIDTH: usize = 35;

pub const HOTKEY_LEGEND: &str = "[←/→] prev/next  [↑/↓] speed  [PgUp/PgDn] seek  \
[F3] pause  [F4] stop  [F5] playlist  [F6] mute  [F7] mixer  [l] loop";

/// `mm:ss`, truncating fractional seconds.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn progress_bar(position_secs: f64, total_secs: f64) -> String {
    let total = if total_secs > 0.0 { total_secs } else { 1.0 };
    let fraction = (position_secs / total).clamp(0.0, 1.0);
    let filled = ((BAR_WIDTH as f64) * fraction) as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(BAR_WIDTH - filled));
    bar
}

pub fn status_label(status: PlayStatus) -> &'static str {
    match status {
        PlayStatus::Seeking => "SEEKING",
        PlayStatus::Paused => "PAUSED",
        PlayStatus::Muted => "MUTED",
        PlayStatus::Looping => "LOOPING",
        PlayStatus::Playing => "PLAYING",
    }
}

pub fn status_line(progress: &Progress) -> String {
    format!(
        "{:<8} | {} | {} / {} | Spd: {:.1}x",
        status_label(progress.status),
        progress_bar(progress.position_secs, progress.total_secs),
        format_time(progress.position_secs),
        format_time(progress.total_secs),
        progress.speed,
    )
}

pub fn source_label(source: TrackSource) -> String {
    match source {
        TrackSource::Saved => "Saved Mix".to_string(),
        TrackSource::Mixer => "Mixer".to_string(),
        TrackSource::Auto(track) => format!("Auto (Track {track})"),
    }
}

pub fn now_playing_header(now: &NowPlaying, playlist_len: usize) -> Vec<String> {
    vec![
        format!(
            "Now playing [{}/{}]: {}",
            now.index + 1,
            playlist_len,
            now.file_name
        ),
        format!(
            "Tracks: {} ({} of {} active)",
            source_label(now.source),
            now.tracks.len(),
            now.playable_tracks
        ),
        HOTKEY_LEGEND.to_string(),
    ]
}
