//! Interpolation.
//!
//! The authority pushes full snapshots at network pace. The client renders
//! at display pace and moves each entity's displayed position a fixed
//! fraction `k` of the remaining gap toward its authoritative position
//! every frame:
//!
//! ```text
//! display' = display + (authoritative - display) * k
//! ```
//!
//! This is exponential decay toward the last known position, not
//! prediction: the displayed position always trails the authority.

use std::collections::{HashMap, HashSet};

use kirworld_shared::{
    math::Vec2,
    net::{EntityId, PlayerState},
};
use tracing::trace;

/// One entity ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEntity {
    pub id: EntityId,
    pub name: String,
    /// Last authoritative position.
    pub position: Vec2,
    /// Smoothed position to draw at.
    pub display: Vec2,
    pub is_local: bool,
}

/// Per-entity displayed positions keyed by id.
#[derive(Debug, Clone)]
pub struct Interpolator {
    smoothing: f64,
    display: HashMap<EntityId, Vec2>,
}

impl Interpolator {
    /// `smoothing` is clamped to `[0, 1]`.
    pub fn new(smoothing: f64) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            display: HashMap::new(),
        }
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Advances every entity in `players` by one frame.
    ///
    /// Entities seen for the first time start exactly at their authoritative
    /// position. Entities missing from `players` are dropped, so a later
    /// reappearance starts fresh. Output follows snapshot order.
    pub fn step(&mut self, players: &[PlayerState], local: Option<&EntityId>) -> Vec<RenderEntity> {
        let live: HashSet<&EntityId> = players.iter().map(|p| &p.id).collect();
        self.display.retain(|id, _| live.contains(id));

        let k = self.smoothing;
        players
            .iter()
            .map(|p| {
                let target = p.position();
                let display = match self.display.get_mut(&p.id) {
                    Some(current) => {
                        *current = current.lerp(target, k);
                        *current
                    }
                    None => {
                        trace!(id = %p.id, x = target.x, y = target.y, "First sight");
                        self.display.insert(p.id.clone(), target);
                        target
                    }
                };
                RenderEntity {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    position: target,
                    display,
                    is_local: local == Some(&p.id),
                }
            })
            .collect()
    }

    pub fn display_of(&self, id: &EntityId) -> Option<Vec2> {
        self.display.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    pub fn clear(&mut self) {
        self.display.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: f64 = 0.2;

    fn snap(entries: &[(&str, f64, f64)]) -> Vec<PlayerState> {
        entries
            .iter()
            .map(|(id, x, y)| PlayerState::new(*id, id.to_uppercase(), *x, *y))
            .collect()
    }

    #[test]
    fn first_sight_has_no_lag() {
        let mut interp = Interpolator::new(K);
        let out = interp.step(&snap(&[("p1", 100.0, 250.0)]), None);
        assert_eq!(out[0].display, Vec2::new(100.0, 250.0));
    }

    #[test]
    fn one_step_closes_k_of_gap() {
        let mut interp = Interpolator::new(K);
        let a1 = Vec2::new(10.0, -4.0);
        let a2 = Vec2::new(57.5, 31.0);
        interp.step(&snap(&[("p1", a1.x, a1.y)]), None);
        let out = interp.step(&snap(&[("p1", a2.x, a2.y)]), None);
        let expected = Vec2::new(a1.x + (a2.x - a1.x) * K, a1.y + (a2.y - a1.y) * K);
        assert_eq!(out[0].display, expected);
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let mut interp = Interpolator::new(K);
        interp.step(&snap(&[("p1", 0.0, 0.0)]), None);
        let target = snap(&[("p1", 100.0, -50.0)]);
        let goal = Vec2::new(100.0, -50.0);
        let mut last = f64::MAX;
        for _ in 0..100 {
            let d = interp.step(&target, None)[0].display;
            let gap = d.distance(goal);
            assert!(gap <= last);
            assert!(d.x <= 100.0 && d.y >= -50.0);
            last = gap;
        }
        assert!(last < 1e-6);
    }

    #[test]
    fn absent_entity_dropped_same_frame() {
        let mut interp = Interpolator::new(K);
        interp.step(&snap(&[("p1", 0.0, 0.0), ("p2", 5.0, 5.0)]), None);
        let out = interp.step(&snap(&[("p2", 5.0, 5.0)]), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id.as_str(), "p2");
        assert!(interp.display_of(&"p1".into()).is_none());
        assert_eq!(interp.len(), 1);
    }

    #[test]
    fn reappearance_reinitializes() {
        let mut interp = Interpolator::new(K);
        interp.step(&snap(&[("p1", 0.0, 0.0)]), None);
        interp.step(&snap(&[]), None);
        let out = interp.step(&snap(&[("p1", 400.0, 400.0)]), None);
        assert_eq!(out[0].display, Vec2::new(400.0, 400.0));
    }

    #[test]
    fn local_flag_and_order() {
        let mut interp = Interpolator::new(K);
        let local = EntityId::new("p2");
        let out = interp.step(
            &snap(&[("p3", 0.0, 0.0), ("p2", 1.0, 1.0), ("p1", 2.0, 2.0)]),
            Some(&local),
        );
        let ids: Vec<_> = out.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["p3", "p2", "p1"]);
        assert!(out[1].is_local);
        assert!(!out[0].is_local && !out[2].is_local);
    }
}
