use log::debug;
use tokio::sync::broadcast;

use crate::logic::Announcement;

/// Fan-out of court announcements to whoever renders them (speech, screens, chat).
///
/// Sending never fails the dispatch: with no listeners the announcement is dropped.
#[derive(Debug, Clone)]
pub struct AnnouncementBus {
    sender: broadcast::Sender<Announcement>,
}

impl Default for AnnouncementBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl AnnouncementBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn announce(&self, announcement: Announcement) {
        let court = announcement.court_name.clone();
        match self.sender.send(announcement) {
            Ok(receivers) => debug!("Announcement for {} sent to {} listener(s)", court, receivers),
            Err(_) => debug!("Announcement for {} dropped, no listeners", court),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.sender.subscribe()
    }
}
