//! Tick-based scanner state machine (spec §4.E, §9 redesign from the
//! reference's nested-await draft; range-capable per §9 "duplicated source
//! files" resolution).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanState {
    Idle,
    Scanning,
    Monitoring,
    Hold,
}

#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub freq_hz: u64,
    pub mode: String,
    pub label: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub enum ScanList {
    Bookmarks(Vec<ScanEntry>),
    Range {
        start_hz: u64,
        end_hz: u64,
        step_hz: u64,
        mode: String,
        current_hz: u64,
    },
}

impl ScanList {
    fn len(&self) -> usize {
        match self {
            Self::Bookmarks(entries) => entries.len(),
            Self::Range { .. } => 1,
        }
    }
}

/// Commands the scanner emits for its caller to carry out (retuning the
/// tuner, notifying subscribers). Pure output of [`Scanner::tick`]; the
/// scanner itself never touches the tuner or a socket.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Retune {
        freq_hz: u64,
        mode: String,
    },
    Status {
        state: ScanState,
        index: usize,
        total: usize,
        freq_hz: u64,
        label: String,
        skipped: bool,
        dwell_ms: u64,
        resume_delay_secs: f64,
    },
}

pub struct Scanner {
    list: ScanList,
    skip_set: std::collections::HashSet<u64>,
    state: ScanState,
    index: usize,
    dwell_time_ms: u64,
    resume_delay_secs: f64,
    tuned: bool,
    entry_time: f64,
    hold_start: f64,
}

impl Scanner {
    pub fn from_bookmarks(entries: Vec<ScanEntry>) -> Self {
        Self::new(ScanList::Bookmarks(entries))
    }

    pub fn from_range(start_hz: u64, end_hz: u64, step_hz: u64, mode: String) -> Self {
        Self::new(ScanList::Range {
            start_hz,
            end_hz,
            step_hz: step_hz.max(1),
            mode,
            current_hz: start_hz,
        })
    }

    fn new(list: ScanList) -> Self {
        Self {
            list,
            skip_set: std::collections::HashSet::new(),
            state: ScanState::Idle,
            index: 0,
            dwell_time_ms: 200,
            resume_delay_secs: 2.0,
            tuned: false,
            entry_time: 0.0,
            hold_start: 0.0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Clamped to `[50, 500]` ms per spec §4.E.
    pub fn set_dwell_time_ms(&mut self, ms: u64) {
        self.dwell_time_ms = ms.clamp(50, 500);
    }

    /// Clamped to `[0.5, 10]` s per spec §4.E.
    pub fn set_resume_delay_secs(&mut self, secs: f64) {
        self.resume_delay_secs = secs.clamp(0.5, 10.0);
    }

    pub fn start(&mut self, now: f64) {
        if self.list.len() == 0 {
            return;
        }
        self.state = ScanState::Scanning;
        self.index = 0;
        self.tuned = false;
        self.entry_time = now;
        self.skip_set.clear();
    }

    /// STOP forces IDLE from any state (spec §3 invariant).
    pub fn stop(&mut self) {
        self.state = ScanState::Idle;
        self.tuned = false;
    }

    /// Adds the current frequency to the session skip set; if monitoring or
    /// holding, advances and returns to SCANNING (spec §4.E SKIP).
    pub fn skip(&mut self) {
        if self.state == ScanState::Idle {
            return;
        }
        let (freq, _, _) = self.entry_at(self.index);
        self.skip_set.insert(freq);
        self.advance();
        self.state = ScanState::Scanning;
    }

    fn entry_at(&self, index: usize) -> (u64, String, String) {
        match &self.list {
            ScanList::Bookmarks(entries) => {
                let e = &entries[index];
                (e.freq_hz, e.mode.clone(), e.label.clone())
            }
            ScanList::Range {
                current_hz, mode, ..
            } => (*current_hz, mode.clone(), format!("{current_hz} Hz")),
        }
    }

    /// Bookmark mode: `index = (index+1) mod len`. Range mode: `current +=
    /// step`, wrapping to `start` past `end` (spec §4.E advance rule).
    fn advance(&mut self) {
        match &mut self.list {
            ScanList::Bookmarks(entries) => {
                if entries.is_empty() {
                    return;
                }
                self.index = (self.index + 1) % entries.len();
            }
            ScanList::Range {
                start_hz,
                end_hz,
                step_hz,
                current_hz,
                ..
            } => {
                let next = *current_hz + *step_hz;
                *current_hz = if next > *end_hz { *start_hz } else { next };
            }
        }
        self.tuned = false;
    }

    /// Advances the state machine by one 50 ms tick. `signal_db` is the
    /// current DSP-engine signal level reading.
    pub fn tick(&mut self, now: f64, signal_db: f32, squelch_threshold: f32) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        if self.state == ScanState::Idle || self.list.len() == 0 {
            return events;
        }

        let (current_freq, _, _) = self.entry_at(self.index);

        match self.state {
            ScanState::Scanning => {
                if self.skip_set.contains(&current_freq) {
                    self.advance();
                } else if !self.tuned {
                    let (freq, mode, _) = self.entry_at(self.index);
                    events.push(ScanEvent::Retune {
                        freq_hz: freq,
                        mode,
                    });
                    self.tuned = true;
                    self.entry_time = now;
                } else if now - self.entry_time < self.dwell_time_ms as f64 / 1000.0 {
                    // waiting out the dwell window
                } else if signal_db > squelch_threshold {
                    self.state = ScanState::Monitoring;
                } else {
                    self.advance();
                }
            }
            ScanState::Monitoring => {
                if signal_db < squelch_threshold {
                    self.state = ScanState::Hold;
                    self.hold_start = now;
                }
            }
            ScanState::Hold => {
                if signal_db > squelch_threshold {
                    self.state = ScanState::Monitoring;
                } else if now - self.hold_start >= self.resume_delay_secs {
                    self.advance();
                    self.state = ScanState::Scanning;
                }
            }
            ScanState::Idle => {}
        }

        let (freq, _, label) = self.entry_at(self.index);
        events.push(ScanEvent::Status {
            state: self.state,
            index: self.index,
            total: self.list.len(),
            freq_hz: freq,
            label,
            skipped: self.skip_set.contains(&freq),
            dwell_ms: self.dwell_time_ms,
            resume_delay_secs: self.resume_delay_secs,
        });
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmarks() -> Vec<ScanEntry> {
        vec![
            ScanEntry {
                freq_hz: 100_000_000,
                mode: "FM".into(),
                label: "A".into(),
                category: "test".into(),
            },
            ScanEntry {
                freq_hz: 101_000_000,
                mode: "FM".into(),
                label: "B".into(),
                category: "test".into(),
            },
        ]
    }

    #[test]
    fn tune_monitor_hold_advance_cycle() {
        let mut scanner = Scanner::from_bookmarks(bookmarks());
        scanner.set_dwell_time_ms(100);
        scanner.set_resume_delay_secs(2.0);
        scanner.start(0.0);

        let events = scanner.tick(0.0, -80.0, -30.0);
        assert!(matches!(
            events[0],
            ScanEvent::Retune {
                freq_hz: 100_000_000,
                ..
            }
        ));

        scanner.tick(0.2, -20.0, -30.0);
        assert_eq!(scanner.state(), ScanState::Monitoring);

        scanner.tick(0.3, -80.0, -30.0);
        assert_eq!(scanner.state(), ScanState::Hold);

        scanner.tick(2.5, -80.0, -30.0);
        assert_eq!(scanner.state(), ScanState::Scanning);
        assert_eq!(scanner.index, 1);
    }

    #[test]
    fn stop_forces_idle_from_any_state() {
        let mut scanner = Scanner::from_bookmarks(bookmarks());
        scanner.start(0.0);
        scanner.tick(0.0, -20.0, -30.0);
        scanner.stop();
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn dwell_and_resume_delay_are_clamped() {
        let mut scanner = Scanner::from_bookmarks(bookmarks());
        scanner.set_dwell_time_ms(10);
        scanner.set_resume_delay_secs(100.0);
        assert_eq!(scanner.dwell_time_ms, 50);
        assert_eq!(scanner.resume_delay_secs, 10.0);
    }

    #[test]
    fn range_scan_wraps_past_end() {
        // start=100_000_000, end=100_020_000, step=10_000: visits
        // 100_000_000 -> 100_010_000 -> 100_020_000 -> wraps to 100_000_000.
        // Each frequency costs one retune tick plus one dwell-expiry tick.
        let mut scanner = Scanner::from_range(100_000_000, 100_020_000, 10_000, "FM".into());
        scanner.set_dwell_time_ms(50);
        scanner.start(0.0);
        let mut t = 0.0;
        let mut last_freq = 0;
        for _ in 0..6 {
            let events = scanner.tick(t, -80.0, -30.0);
            if let Some(ScanEvent::Status { freq_hz, .. }) = events.last() {
                last_freq = *freq_hz;
            }
            t += 0.06;
        }
        assert_eq!(last_freq, 100_000_000);
    }

    #[test]
    fn skip_adds_to_skip_set_and_advances() {
        let mut scanner = Scanner::from_bookmarks(bookmarks());
        scanner.start(0.0);
        scanner.tick(0.0, -80.0, -30.0);
        scanner.skip();
        assert_eq!(scanner.index, 1);
        let events = scanner.tick(0.1, -80.0, -30.0);
        assert!(matches!(
            events[0],
            ScanEvent::Retune {
                freq_hz: 101_000_000,
                ..
            }
        ));
    }
}
