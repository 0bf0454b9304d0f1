//! Short-horizon evasion planner with a long-horizon hiding fallback.

use log::{debug, trace, warn};
use stealth_shared::{Observer, PlannerConfig, PlannerOutcome, PlannerTelemetry, RoutingMode, Vec2};

use super::frame::{is_seen, PlanningFrame};
use super::stall::StallGuard;
use super::PlannerEnv;
use crate::navigation::PathPlanner;

/// A candidate after its navmesh path has been checked
#[derive(Debug, Clone, Copy)]
struct Refined {
    position: Vec2,
    cost: f32,
}

/// Re-plans an evading agent's next goal on a fixed cadence
#[derive(Debug, Clone)]
pub struct LookaheadPlanner {
    config: PlannerConfig,
    paths: PathPlanner,
    stall: StallGuard,
    telemetry: PlannerTelemetry,
    since_replan: f32,
    last_outcome: Option<PlannerOutcome>,
    rescuing: bool,
}

impl LookaheadPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            paths: PathPlanner::new(config.wall_clearance),
            stall: StallGuard::new(config.stall_window),
            telemetry: PlannerTelemetry::default(),
            since_replan: 0.0,
            last_outcome: None,
            rescuing: false,
            config,
        }
    }

    /// Advance the planner clock by `dt` and return the current goal.
    ///
    /// Between recomputations the previous outcome is returned with fresh
    /// telemetry. The first call always plans.
    pub fn advance(
        &mut self,
        env: &PlannerEnv<'_>,
        current: Vec2,
        observers: &[Observer],
        chased: bool,
        dt: f32,
    ) -> PlannerOutcome {
        self.stall.update(observers.first().map(|o| o.position), dt);
        self.telemetry.stalled = self.stall.is_stalled();
        if self.rescuing {
            self.telemetry.fallback_duration += dt;
        }

        self.since_replan += dt;
        if let Some(cached) = &self.last_outcome {
            if self.since_replan < self.config.replan_interval {
                let mut outcome = cached.clone();
                outcome.telemetry = self.telemetry;
                return outcome;
            }
        }
        self.since_replan = 0.0;

        let outcome = self.plan(env, current, observers, chased);
        self.last_outcome = Some(outcome.clone());
        outcome
    }

    fn plan(&mut self, env: &PlannerEnv<'_>, current: Vec2, observers: &[Observer], chased: bool) -> PlannerOutcome {
        let frame = PlanningFrame::expand(&self.config, env, &mut self.paths, current, observers);
        let current_score = frame.score(env, observers, current);

        if current_score <= 0.0 {
            trace!("[PLAN] hidden at ({:.2}, {:.2}), staying", current.x, current.y);
            self.rescuing = false;
            return PlannerOutcome::stay(current, current_score, self.telemetry);
        }

        let best = self.refine(env, &frame, current, observers);
        let seen = is_seen(env, observers, current);

        let escalate = match best {
            _ if self.config.mode.rescue_when_seen() && chased => true,
            None => true,
            Some(best) => seen && best.cost >= current_score,
        };

        if escalate {
            return self.escalate(env, current, observers, current_score);
        }

        match best {
            Some(best) => {
                debug!(
                    "[PLAN] hop to ({:.2}, {:.2}) cost {:.3} (current {:.3})",
                    best.position.x, best.position.y, best.cost, current_score
                );
                PlannerOutcome {
                    goal: best.position,
                    routing: RoutingMode::DirectHop,
                    route: vec![best.position],
                    score: best.cost,
                    telemetry: self.telemetry,
                }
            }
            None => PlannerOutcome::stay(current, current_score, self.telemetry),
        }
    }

    /// Rank candidates by score and re-cost the best few along their real paths
    fn refine(
        &mut self,
        env: &PlannerEnv<'_>,
        frame: &PlanningFrame,
        current: Vec2,
        observers: &[Observer],
    ) -> Option<Refined> {
        let mut ranked: Vec<(Vec2, f32)> = frame
            .candidates()
            .iter()
            .map(|&c| (c, frame.score(env, observers, c)))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| current.distance_to(a.0).total_cmp(&current.distance_to(b.0)))
        });

        let punish = self.config.mode.punish_unseen_to_seen();
        let mut best: Option<Refined> = None;

        for &(position, _) in ranked.iter().take(self.config.refine_count) {
            let path = match self.paths.shortest_path(env.navmesh, current, position) {
                Ok(path) => path,
                Err(e) => {
                    trace!("[PLAN] candidate ({:.2}, {:.2}) dropped: {}", position.x, position.y, e);
                    continue;
                }
            };
            let cost = frame.path_cost(env, observers, current, &path, self.config.step_size, punish);
            if best.map_or(true, |b| cost < b.cost) {
                best = Some(Refined { position, cost });
            }
        }

        best
    }

    fn escalate(
        &mut self,
        env: &PlannerEnv<'_>,
        current: Vec2,
        observers: &[Observer],
        current_score: f32,
    ) -> PlannerOutcome {
        let Some(spot) = env.hiding.best_hiding_spot(observers, env.navmesh) else {
            warn!("[PLAN] no hiding spot available, staying at ({:.2}, {:.2})", current.x, current.y);
            return PlannerOutcome::stay(current, current_score, self.telemetry);
        };

        match self.paths.shortest_path(env.navmesh, current, spot) {
            Ok(route) => {
                self.telemetry.fallback_count += 1;
                self.rescuing = true;
                debug!(
                    "[PLAN] escalating to hiding spot ({:.2}, {:.2}), {} waypoints (fallback #{})",
                    spot.x,
                    spot.y,
                    route.len(),
                    self.telemetry.fallback_count
                );
                PlannerOutcome {
                    goal: spot,
                    routing: RoutingMode::RoutedHide,
                    route,
                    score: current_score,
                    telemetry: self.telemetry,
                }
            }
            Err(e) => {
                warn!("[PLAN] hiding spot ({:.2}, {:.2}) unreachable: {}", spot.x, spot.y, e);
                PlannerOutcome::stay(current, current_score, self.telemetry)
            }
        }
    }
}
