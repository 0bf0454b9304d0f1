//! Detection of a lead observer that has stopped moving.

use log::info;
use stealth_shared::Vec2;

/// Flags an episode whose lead observer stopped moving.
///
/// Once raised the flag stays set; the metrics layer uses it to discard the
/// episode.
#[derive(Debug, Clone)]
pub struct StallGuard {
    window: f32,
    anchor: Option<Vec2>,
    still_for: f32,
    stalled: bool,
}

impl StallGuard {
    pub fn new(window: f32) -> Self {
        Self {
            window,
            anchor: None,
            still_for: 0.0,
            stalled: false,
        }
    }

    /// Record the lead observer's position after `dt` seconds
    pub fn update(&mut self, lead: Option<Vec2>, dt: f32) {
        let Some(position) = lead else {
            self.anchor = None;
            self.still_for = 0.0;
            return;
        };

        if self.anchor == Some(position) {
            self.still_for += dt;
        } else {
            self.anchor = Some(position);
            self.still_for = 0.0;
        }

        if !self.stalled && self.still_for >= self.window {
            info!(
                "Lead observer idle at ({:.2}, {:.2}) for {:.1}s, episode flagged",
                position.x, position.y, self.still_for
            );
            self.stalled = true;
        }
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stationary_observer_stalls_after_window() {
        let mut guard = StallGuard::new(5.0);
        let position = Vec2::new(3.0, 4.0);

        // 6 seconds at 0.25s ticks
        for tick in 0..24 {
            guard.update(Some(position), 0.25);
            let elapsed = (tick as f32) * 0.25;
            if elapsed < 5.0 {
                assert!(!guard.is_stalled(), "flagged early at {}s", elapsed);
            }
        }
        assert!(guard.is_stalled());
    }

    #[test]
    fn test_moving_observer_never_stalls() {
        let mut guard = StallGuard::new(5.0);

        for tick in 0..100 {
            guard.update(Some(Vec2::new(tick as f32 * 0.1, 0.0)), 0.25);
        }
        assert!(!guard.is_stalled());
    }

    #[test]
    fn test_flag_is_sticky() {
        let mut guard = StallGuard::new(1.0);
        for _ in 0..5 {
            guard.update(Some(Vec2::ZERO), 0.5);
        }
        assert!(guard.is_stalled());

        guard.update(Some(Vec2::new(1.0, 1.0)), 0.5);
        assert!(guard.is_stalled());
    }
}
