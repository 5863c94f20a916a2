//! Dwell / pressure state machine deciding how much detail the user wants.
//!
//! A session starts when a pointer shows up, escalates through
//! `light -> medium -> hard` as dwell time (or stylus pressure) grows, fires a
//! capture once, and fires at most one explanation request. Downgrades only
//! commit after staying requested for `downgrade_window_ms`.

use serde::{Deserialize, Serialize};

use crate::models::events::SessionEndReason;
use crate::models::geometry::{RectPx, ScreenPoint};
use crate::models::level::DetailLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentConfig {
    pub light_ms: u64,
    pub medium_ms: u64,
    pub hard_ms: u64,
    pub auto_trigger_ms: u64,
    pub downgrade_window_ms: u64,
    pub position_tolerance_px: f64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            light_ms: 1_800,
            medium_ms: 3_000,
            hard_ms: 5_500,
            auto_trigger_ms: 1_800,
            downgrade_window_ms: 500,
            position_tolerance_px: 30.0,
        }
    }
}

impl IntentConfig {
    fn level_for_duration(&self, duration_ms: u64) -> Option<DetailLevel> {
        if duration_ms >= self.hard_ms {
            Some(DetailLevel::Hard)
        } else if duration_ms >= self.medium_ms {
            Some(DetailLevel::Medium)
        } else if duration_ms >= self.light_ms {
            Some(DetailLevel::Light)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSignal {
    /// Fingertip / hover: level comes from how long the pointer stays put.
    Dwell,
    /// Stylus held down with the given pressure (0..1).
    Pressure(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Dwell,
    Pressure,
}

impl InputSignal {
    fn mode(self) -> SessionMode {
        match self {
            InputSignal::Dwell => SessionMode::Dwell,
            InputSignal::Pressure(_) => SessionMode::Pressure,
        }
    }
}

/// One pointer observation. `position: None` means lost (or stylus lifted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentSample {
    pub ts: u64,
    pub position: Option<ScreenPoint>,
    pub signal: InputSignal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IntentEvent {
    SessionStarted {
        ts: u64,
        position: ScreenPoint,
    },
    CaptureRequested {
        ts: u64,
        position: ScreenPoint,
    },
    LevelChanged {
        ts: u64,
        from: Option<DetailLevel>,
        to: DetailLevel,
    },
    ExplainRequested {
        ts: u64,
        level: DetailLevel,
        position: ScreenPoint,
        #[serde(rename = "drawnBounds")]
        drawn_bounds: Option<RectPx>,
    },
    SessionEnded {
        ts: u64,
        reason: SessionEndReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingDowngrade {
    target: DetailLevel,
    since_ts: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerSession {
    pub mode: SessionMode,
    pub start_ts: u64,
    pub start_position: ScreenPoint,
    pub last_ts: u64,
    pub last_position: ScreenPoint,
    pub current_level: DetailLevel,
    /// Highest level committed during the session.
    pub peak_level: DetailLevel,
    /// Set once the session produced its first level.
    pub engaged: bool,
    pub has_triggered: bool,
    pub has_screenshot: bool,
    /// Bounds of everything the stylus touched; a point for dwell sessions.
    pub drawn_bounds: RectPx,
    pending: Option<PendingDowngrade>,
}

impl PointerSession {
    fn new(mode: SessionMode, ts: u64, position: ScreenPoint) -> Self {
        Self {
            mode,
            start_ts: ts,
            start_position: position,
            last_ts: ts,
            last_position: position,
            current_level: DetailLevel::Light,
            peak_level: DetailLevel::Light,
            engaged: false,
            has_triggered: false,
            has_screenshot: false,
            drawn_bounds: RectPx::from_point(position),
            pending: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.last_ts.saturating_sub(self.start_ts)
    }

    pub fn pending_downgrade(&self) -> Option<DetailLevel> {
        self.pending.map(|pending| pending.target)
    }

    /// Upgrades commit immediately; downgrades wait for the stabilization window.
    fn propose_level(
        &mut self,
        level: DetailLevel,
        ts: u64,
        window_ms: u64,
    ) -> Option<(DetailLevel, DetailLevel)> {
        if level >= self.current_level {
            self.pending = None;
            if level == self.current_level {
                return None;
            }
            return Some(self.commit(level));
        }

        let since_ts = match self.pending {
            Some(pending) if pending.target == level => pending.since_ts,
            _ => {
                self.pending = Some(PendingDowngrade {
                    target: level,
                    since_ts: ts,
                });
                ts
            }
        };
        if ts.saturating_sub(since_ts) >= window_ms {
            self.pending = None;
            return Some(self.commit(level));
        }
        None
    }

    fn commit(&mut self, level: DetailLevel) -> (DetailLevel, DetailLevel) {
        let from = self.current_level;
        self.current_level = level;
        self.peak_level = self.peak_level.max(level);
        (from, level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierState {
    Idle,
    Tracking(PointerSession),
}

#[derive(Debug, Clone)]
pub struct IntentClassifier {
    config: IntentConfig,
    state: ClassifierState,
}

impl IntentClassifier {
    pub fn new(config: IntentConfig) -> Self {
        Self {
            config,
            state: ClassifierState::Idle,
        }
    }

    pub fn config(&self) -> &IntentConfig {
        &self.config
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    pub fn session(&self) -> Option<&PointerSession> {
        match &self.state {
            ClassifierState::Tracking(session) => Some(session),
            ClassifierState::Idle => None,
        }
    }

    /// Level of the running session once it is engaged.
    pub fn active_level(&self) -> Option<DetailLevel> {
        self.session()
            .filter(|session| session.engaged)
            .map(|session| session.current_level)
    }

    /// Marks the running session as triggered (e.g. after a manual request).
    pub fn mark_triggered(&mut self) {
        if let ClassifierState::Tracking(session) = &mut self.state {
            session.has_triggered = true;
        }
    }

    pub fn observe(&mut self, sample: IntentSample) -> Vec<IntentEvent> {
        let mut events = Vec::new();

        let Some(position) = sample.position else {
            self.end_session(sample.ts, SessionEndReason::Lost, &mut events);
            return events;
        };

        let mode = sample.signal.mode();
        let restart_reason = match &self.state {
            ClassifierState::Idle => None,
            ClassifierState::Tracking(session) if session.mode != mode => {
                Some(SessionEndReason::Lost)
            }
            ClassifierState::Tracking(session) => {
                let drifted = session.start_position.distance_to(position)
                    > self.config.position_tolerance_px.max(0.0);
                (mode == SessionMode::Dwell && drifted).then_some(SessionEndReason::Drift)
            }
        };
        if let Some(reason) = restart_reason {
            self.end_session(sample.ts, reason, &mut events);
        }

        if matches!(self.state, ClassifierState::Idle) {
            log::debug!(
                "pointer session started at ({:.1}, {:.1}) mode={mode:?}",
                position.x,
                position.y
            );
            self.state = ClassifierState::Tracking(PointerSession::new(mode, sample.ts, position));
            events.push(IntentEvent::SessionStarted {
                ts: sample.ts,
                position,
            });
        }

        let config = self.config.clone();
        if let ClassifierState::Tracking(session) = &mut self.state {
            session.last_ts = sample.ts.max(session.last_ts);
            session.last_position = position;
            match sample.signal {
                InputSignal::Dwell => update_dwell(session, &config, sample.ts, &mut events),
                InputSignal::Pressure(pressure) => {
                    session.drawn_bounds = session.drawn_bounds.include(position);
                    update_pressure(session, &config, pressure, sample.ts, &mut events);
                }
            }
        }

        events
    }

    fn end_session(&mut self, ts: u64, reason: SessionEndReason, events: &mut Vec<IntentEvent>) {
        let ClassifierState::Tracking(session) =
            std::mem::replace(&mut self.state, ClassifierState::Idle)
        else {
            return;
        };

        if !session.has_triggered {
            let level = match session.mode {
                SessionMode::Dwell => (session.duration_ms() >= self.config.auto_trigger_ms)
                    .then_some(session.current_level),
                SessionMode::Pressure => Some(session.peak_level),
            };
            if let Some(level) = level {
                events.push(IntentEvent::ExplainRequested {
                    ts,
                    level,
                    position: session.last_position,
                    drawn_bounds: (session.mode == SessionMode::Pressure)
                        .then_some(session.drawn_bounds),
                });
            }
        }

        log::debug!(
            "pointer session ended: reason={reason:?} duration={}ms level={}",
            session.duration_ms(),
            session.current_level
        );
        events.push(IntentEvent::SessionEnded { ts, reason });
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(IntentConfig::default())
    }
}

fn update_dwell(
    session: &mut PointerSession,
    config: &IntentConfig,
    ts: u64,
    events: &mut Vec<IntentEvent>,
) {
    let duration = session.duration_ms();
    if let Some(level) = config.level_for_duration(duration) {
        apply_level(session, config, level, ts, events);
    }

    if duration >= config.light_ms && !session.has_screenshot {
        session.has_screenshot = true;
        events.push(IntentEvent::CaptureRequested {
            ts,
            position: session.last_position,
        });
    }

    maybe_auto_trigger(session, config, ts, events);
}

fn update_pressure(
    session: &mut PointerSession,
    config: &IntentConfig,
    pressure: f64,
    ts: u64,
    events: &mut Vec<IntentEvent>,
) {
    apply_level(session, config, DetailLevel::from_pressure(pressure), ts, events);

    if !session.has_screenshot {
        session.has_screenshot = true;
        events.push(IntentEvent::CaptureRequested {
            ts,
            position: session.start_position,
        });
    }

    maybe_auto_trigger(session, config, ts, events);
}

fn apply_level(
    session: &mut PointerSession,
    config: &IntentConfig,
    level: DetailLevel,
    ts: u64,
    events: &mut Vec<IntentEvent>,
) {
    if !session.engaged {
        session.engaged = true;
        session.current_level = level;
        session.peak_level = level;
        events.push(IntentEvent::LevelChanged {
            ts,
            from: None,
            to: level,
        });
        return;
    }

    if let Some((from, to)) = session.propose_level(level, ts, config.downgrade_window_ms) {
        events.push(IntentEvent::LevelChanged {
            ts,
            from: Some(from),
            to,
        });
    }
}

fn maybe_auto_trigger(
    session: &mut PointerSession,
    config: &IntentConfig,
    ts: u64,
    events: &mut Vec<IntentEvent>,
) {
    let eligible = session.duration_ms() >= config.auto_trigger_ms;
    if eligible && !session.has_triggered && session.current_level == DetailLevel::Hard {
        session.has_triggered = true;
        events.push(IntentEvent::ExplainRequested {
            ts,
            level: DetailLevel::Hard,
            position: session.last_position,
            drawn_bounds: (session.mode == SessionMode::Pressure).then_some(session.drawn_bounds),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dwell(ts: u64, x: f64, y: f64) -> IntentSample {
        IntentSample {
            ts,
            position: Some(ScreenPoint::new(x, y)),
            signal: InputSignal::Dwell,
        }
    }

    fn pressed(ts: u64, pressure: f64) -> IntentSample {
        IntentSample {
            ts,
            position: Some(ScreenPoint::new(200.0, 200.0)),
            signal: InputSignal::Pressure(pressure),
        }
    }

    fn released(ts: u64) -> IntentSample {
        IntentSample {
            ts,
            position: None,
            signal: InputSignal::Pressure(0.0),
        }
    }

    fn level_changes(events: &[IntentEvent]) -> Vec<DetailLevel> {
        events
            .iter()
            .filter_map(|event| match event {
                IntentEvent::LevelChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    fn explain_levels(events: &[IntentEvent]) -> Vec<DetailLevel> {
        events
            .iter()
            .filter_map(|event| match event {
                IntentEvent::ExplainRequested { level, .. } => Some(*level),
                _ => None,
            })
            .collect()
    }

    fn count_captures(events: &[IntentEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, IntentEvent::CaptureRequested { .. }))
            .count()
    }

    #[test]
    fn dwell_scenario_escalates_and_triggers_once() {
        let mut classifier = IntentClassifier::default();

        let start = classifier.observe(dwell(0, 100.0, 100.0));
        assert!(matches!(start[0], IntentEvent::SessionStarted { ts: 0, .. }));
        assert!(classifier.active_level().is_none());

        let before_light = classifier.observe(dwell(1_799, 101.0, 100.0));
        assert!(level_changes(&before_light).is_empty());
        assert_eq!(count_captures(&before_light), 0);

        let at_light = classifier.observe(dwell(1_800, 100.0, 101.0));
        assert_eq!(level_changes(&at_light), vec![DetailLevel::Light]);
        assert_eq!(count_captures(&at_light), 1);
        assert!(explain_levels(&at_light).is_empty());

        let at_medium = classifier.observe(dwell(3_000, 100.0, 100.0));
        assert_eq!(level_changes(&at_medium), vec![DetailLevel::Medium]);
        assert_eq!(count_captures(&at_medium), 0);

        let at_hard = classifier.observe(dwell(5_500, 100.0, 100.0));
        assert_eq!(level_changes(&at_hard), vec![DetailLevel::Hard]);
        assert_eq!(explain_levels(&at_hard), vec![DetailLevel::Hard]);
        assert!(classifier.session().expect("session").has_triggered);

        let mut later = Vec::new();
        for ts in (5_600..9_000).step_by(100) {
            later.extend(classifier.observe(dwell(ts, 100.0, 100.0)));
        }
        later.extend(classifier.observe(IntentSample {
            ts: 9_000,
            position: None,
            signal: InputSignal::Dwell,
        }));
        assert!(explain_levels(&later).is_empty());
        assert_eq!(count_captures(&later), 0);
        assert!(matches!(
            later.last(),
            Some(IntentEvent::SessionEnded {
                reason: SessionEndReason::Lost,
                ..
            })
        ));
    }

    #[test]
    fn dwell_levels_never_go_backward_or_early() {
        let config = IntentConfig::default();
        let mut classifier = IntentClassifier::new(config.clone());
        let mut seen = Vec::new();
        for ts in (0..=7_000).step_by(50) {
            for event in classifier.observe(dwell(ts, 50.0, 50.0)) {
                if let IntentEvent::LevelChanged { to, ts, .. } = event {
                    let threshold = match to {
                        DetailLevel::Light => config.light_ms,
                        DetailLevel::Medium => config.medium_ms,
                        DetailLevel::Hard => config.hard_ms,
                    };
                    assert!(ts >= threshold, "{to} reached at {ts}");
                    seen.push(to);
                }
            }
        }
        assert_eq!(
            seen,
            vec![DetailLevel::Light, DetailLevel::Medium, DetailLevel::Hard]
        );
    }

    #[test]
    fn losing_eligible_pointer_triggers_with_current_level() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(dwell(0, 10.0, 10.0));
        classifier.observe(dwell(3_200, 10.0, 10.0));
        let events = classifier.observe(IntentSample {
            ts: 3_300,
            position: None,
            signal: InputSignal::Dwell,
        });
        assert_eq!(explain_levels(&events), vec![DetailLevel::Medium]);
        assert!(matches!(classifier.state(), ClassifierState::Idle));
    }

    #[test]
    fn losing_pointer_before_auto_trigger_delay_is_silent() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(dwell(0, 10.0, 10.0));
        classifier.observe(dwell(1_000, 10.0, 10.0));
        let events = classifier.observe(IntentSample {
            ts: 1_100,
            position: None,
            signal: InputSignal::Dwell,
        });
        assert!(explain_levels(&events).is_empty());
        assert!(matches!(
            events.as_slice(),
            [IntentEvent::SessionEnded {
                reason: SessionEndReason::Lost,
                ..
            }]
        ));
    }

    #[test]
    fn drift_ends_session_and_starts_a_fresh_one() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(dwell(0, 100.0, 100.0));
        classifier.observe(dwell(2_000, 105.0, 100.0));

        let events = classifier.observe(dwell(2_100, 200.0, 100.0));
        assert_eq!(explain_levels(&events), vec![DetailLevel::Light]);
        assert!(events.iter().any(|event| matches!(
            event,
            IntentEvent::SessionEnded {
                reason: SessionEndReason::Drift,
                ..
            }
        )));
        assert!(matches!(
            events.last(),
            Some(IntentEvent::SessionStarted { ts: 2_100, .. })
        ));

        let session = classifier.session().expect("fresh session");
        assert_eq!(session.start_ts, 2_100);
        assert!(!session.engaged);
        assert!(!session.has_screenshot);
        assert!(!session.has_triggered);
        assert_eq!(session.current_level, DetailLevel::Light);
    }

    #[test]
    fn pressure_trace_commits_peak_level_on_release() {
        let mut classifier = IntentClassifier::default();
        let mut events = Vec::new();
        events.extend(classifier.observe(pressed(0, 0.1)));
        events.extend(classifier.observe(pressed(100, 0.5)));
        events.extend(classifier.observe(pressed(200, 0.1)));
        events.extend(classifier.observe(released(250)));

        assert_eq!(count_captures(&events), 1);
        assert_eq!(explain_levels(&events), vec![DetailLevel::Medium]);
    }

    #[test]
    fn momentary_pressure_dip_does_not_downgrade() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(pressed(0, 0.1));
        classifier.observe(pressed(100, 0.5));

        let dip = classifier.observe(pressed(200, 0.1));
        assert!(level_changes(&dip).is_empty());
        assert_eq!(
            classifier.session().and_then(PointerSession::pending_downgrade),
            Some(DetailLevel::Light)
        );

        let recovered = classifier.observe(pressed(600, 0.5));
        assert!(level_changes(&recovered).is_empty());
        assert_eq!(classifier.active_level(), Some(DetailLevel::Medium));
        assert!(classifier
            .session()
            .and_then(PointerSession::pending_downgrade)
            .is_none());

        // A new dip must wait a full window again.
        let dip_again = classifier.observe(pressed(650, 0.1));
        assert!(level_changes(&dip_again).is_empty());
        let short = classifier.observe(pressed(1_100, 0.1));
        assert!(level_changes(&short).is_empty());
        assert_eq!(classifier.active_level(), Some(DetailLevel::Medium));
    }

    #[test]
    fn sustained_pressure_dip_downgrades_exactly_once() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(pressed(0, 0.5));
        let mut events = Vec::new();
        for ts in (100..=1_500).step_by(100) {
            events.extend(classifier.observe(pressed(ts, 0.1)));
        }
        assert_eq!(level_changes(&events), vec![DetailLevel::Light]);
        assert_eq!(classifier.active_level(), Some(DetailLevel::Light));

        let release = classifier.observe(released(1_600));
        assert_eq!(explain_levels(&release), vec![DetailLevel::Medium]);
    }

    #[test]
    fn hard_pressure_after_delay_fires_immediately() {
        let mut classifier = IntentClassifier::default();
        classifier.observe(pressed(0, 0.2));
        let early = classifier.observe(pressed(500, 0.9));
        assert!(explain_levels(&early).is_empty());

        let eligible = classifier.observe(pressed(1_900, 0.9));
        assert_eq!(explain_levels(&eligible), vec![DetailLevel::Hard]);

        let release = classifier.observe(released(2_000));
        assert!(explain_levels(&release).is_empty());
    }

    #[test]
    fn stylus_drawing_accumulates_bounds_without_drift_reset() {
        let mut classifier = IntentClassifier::default();
        let stroke = [(100.0, 100.0), (180.0, 110.0), (260.0, 140.0)];
        for (idx, (x, y)) in stroke.iter().enumerate() {
            let events = classifier.observe(IntentSample {
                ts: idx as u64 * 50,
                position: Some(ScreenPoint::new(*x, *y)),
                signal: InputSignal::Pressure(0.4),
            });
            assert!(!events
                .iter()
                .any(|event| matches!(event, IntentEvent::SessionEnded { .. })));
        }
        let events = classifier.observe(released(200));
        let bounds = events
            .iter()
            .find_map(|event| match event {
                IntentEvent::ExplainRequested { drawn_bounds, .. } => *drawn_bounds,
                _ => None,
            })
            .expect("stylus explain carries bounds");
        assert_eq!(bounds.x, 100.0);
        assert_eq!(bounds.right(), 260.0);
        assert_eq!(bounds.bottom(), 140.0);
    }
}
