use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{PollWatcher, RecursiveMode, Watcher};
use crate::config::PanelOptions;
use crate::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    PowerOn,
    PreDeinit,
}

impl PanelEvent {
    /// `0` is an unblanked panel, anything else is on its way down.
    pub fn from_state_text(text: &str) -> Option<Self> {
        match text.trim().parse::<i64>().ok()? {
            0 => Some(Self::PowerOn),
            _ => Some(Self::PreDeinit),
        }
    }

    pub fn post(self, session: &SessionHandle) {
        match self {
            Self::PowerOn => session.on_panel_power_on(),
            Self::PreDeinit => session.on_panel_pre_deinit(),
        }
    }
}

fn read_panel_state(path: &Path) -> Option<PanelEvent> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Failed to read panel state from {:?}: {}", path, e);
            return None;
        }
    };
    let event = PanelEvent::from_state_text(&text);
    if event.is_none() {
        log::warn!("Ignoring unexpected panel state {:?} in {:?}", text.trim(), path);
    }
    event
}

/// Forwards panel power changes to the session. sysfs attributes don't raise inotify events,
/// so the file is polled and compared by content.
pub fn watch_panel_state(path: &Path, poll_interval: Duration, session: SessionHandle) -> notify::Result<PollWatcher> {
    if let Some(event) = read_panel_state(path) {
        event.post(&session);
    }

    let state_path: PathBuf = path.to_path_buf();
    let config = notify::Config::default()
        .with_poll_interval(poll_interval)
        .with_compare_contents(true);
    let mut watcher = PollWatcher::new(move |res: notify::Result<notify::Event>| match res {
        Ok(event) if event.kind.is_modify() => {
            if let Some(panel_event) = read_panel_state(&state_path) {
                log::debug!("Panel event: {:?}", panel_event);
                panel_event.post(&session);
            }
        }
        Ok(_) => {}
        Err(e) => log::warn!("Error while watching {:?}: {}", state_path, e),
    }, config)?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;

    Ok(watcher)
}

/// Without a working power signal the screen is treated as always active, so only the sleep
/// gesture stays reachable.
pub fn start_panel_monitor(options: &PanelOptions, session: SessionHandle) -> Option<PollWatcher> {
    let Some(path) = &options.power_state_file else {
        log::warn!("No panel power state file configured, assuming the screen is always on");
        return None;
    };

    match watch_panel_state(path, Duration::from_millis(options.poll_interval_ms), session) {
        Ok(watcher) => {
            log::info!("Watching {:?} for panel power changes", path);
            Some(watcher)
        }
        Err(e) => {
            log::error!("Failed to register panel notifier on {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_power_state() {
        assert_eq!(PanelEvent::from_state_text("0\n"), Some(PanelEvent::PowerOn));
        assert_eq!(PanelEvent::from_state_text("4\n"), Some(PanelEvent::PreDeinit));
        assert_eq!(PanelEvent::from_state_text("1"), Some(PanelEvent::PreDeinit));
        assert_eq!(PanelEvent::from_state_text("on"), None);
        assert_eq!(PanelEvent::from_state_text(""), None);
    }
}
