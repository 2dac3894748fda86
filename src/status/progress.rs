//! Download progress
//!
//! Loading happens in two phases: the engine data package, reported by the
//! loader as status strings like `Downloading data... (1234/56789)`, and
//! then the game archive, whose bytes are counted as they stream in. Each
//! phase gets a one-time announcement followed by progress updates.

/// Something the status reporter should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A line for the status log (an empty line clears it)
    Message(&'static str),
    /// Advance the progress bar
    Progress { done: u64, total: u64 },
}

/// What a loader status string turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    /// A byte count for the engine data
    Bytes { done: u64, total: u64 },
    /// Anything else, for the console
    Other(String),
}

/// Tracks both download phases
#[derive(Debug, Default)]
pub struct DownloadProgress {
    data_size: u64,
    data_done: u64,
    game_size: u64,
    game_done: u64,
    data_announced: bool,
    game_announced: bool,
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a loader status string
    pub fn set_status(&mut self, status: &str) -> (StatusLine, Vec<ProgressEvent>) {
        match parse_status(status) {
            Some((done, total)) => {
                self.data_done = done;
                self.data_size = total;
                (StatusLine::Bytes { done, total }, self.update())
            }
            None => (StatusLine::Other(status.to_string()), Vec::new()),
        }
    }

    /// Record the archive size (from Content-Length)
    pub fn set_game_size(&mut self, size: u64) -> Vec<ProgressEvent> {
        self.game_size = size;
        self.update()
    }

    /// Record another chunk of the archive
    pub fn add_game_bytes(&mut self, n: u64) -> Vec<ProgressEvent> {
        self.game_done += n;
        self.update()
    }

    pub fn game_done(&self) -> u64 {
        self.game_done
    }

    fn update(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        if self.data_size == 0 {
            return events;
        }

        if self.data_done < self.data_size || self.game_size == 0 {
            if !self.data_announced {
                events.push(ProgressEvent::Message(""));
                events.push(ProgressEvent::Message("Downloading engine..."));
                self.data_announced = true;
            }
            events.push(ProgressEvent::Progress {
                done: self.data_done,
                total: self.data_size,
            });
            return events;
        }

        if !self.game_announced {
            events.push(ProgressEvent::Message(""));
            events.push(ProgressEvent::Message("Downloading game data..."));
            self.game_announced = true;
        }
        events.push(ProgressEvent::Progress {
            done: self.game_done,
            total: self.game_size,
        });
        events
    }
}

/// Extract `(done, total)` from `Label (done/total)`
///
/// `done` may carry a fractional part, which is dropped.
pub fn parse_status(s: &str) -> Option<(u64, u64)> {
    let bytes = s.as_bytes();
    for (i, _) in s.match_indices('(') {
        // needs a non-empty label with no '(' right before the group
        if i == 0 || bytes[i - 1] == b'(' {
            continue;
        }
        if let Some(counts) = parse_counts(&s[i + 1..]) {
            return Some(counts);
        }
    }
    None
}

fn parse_counts(s: &str) -> Option<(u64, u64)> {
    let (inner, _) = s.split_once(')')?;
    let (done, total) = inner.split_once('/')?;

    let (whole, frac) = match done.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (done, None),
    };
    if !is_digits(whole) || !frac.is_none_or(is_digits) || !is_digits(total) {
        return None;
    }
    Some((whole.parse().ok()?, total.parse().ok()?))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
