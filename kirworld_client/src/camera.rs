//! Camera.
//!
//! The view is a translation that puts the focus point at the viewport
//! center, followed by a uniform scale about that same point. The local
//! player therefore stays centered at every zoom level.

use kirworld_shared::{config::ClientConfig, math::Vec2};

/// Screen-space viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Transform applied to the rendered world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Added to world coordinates; independent of zoom.
    pub translate: Vec2,
    pub scale: f64,
    /// World-space point the scale is centered on.
    pub origin: Vec2,
}

impl ViewTransform {
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        let pivot = self.origin + self.translate;
        pivot + (p + self.translate - pivot) * self.scale
    }
}

/// Pure view computation from focus, zoom and viewport.
pub fn view_transform(focus: Vec2, zoom: f64, viewport: Viewport) -> ViewTransform {
    ViewTransform {
        translate: viewport.center() - focus,
        scale: zoom,
        origin: focus,
    }
}

/// Zoom bounds and step sizes.
///
/// Built through [`ZoomLimits::new`], which guarantees finite bounds with
/// `0 < min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    min: f64,
    max: f64,
    step: f64,
    wheel_sensitivity: f64,
}

impl ZoomLimits {
    /// Swaps reversed bounds. Non-finite or non-positive bounds fall back to
    /// `[0.5, 2.0]`; a non-finite step or sensitivity becomes 0.
    pub fn new(min: f64, max: f64, step: f64, wheel_sensitivity: f64) -> Self {
        let (min, max) = if min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 {
            (min.min(max), min.max(max))
        } else {
            (0.5, 2.0)
        };
        let finite_or_zero = |v: f64| if v.is_finite() { v.abs() } else { 0.0 };
        Self {
            min,
            max,
            step: finite_or_zero(step),
            wheel_sensitivity: finite_or_zero(wheel_sensitivity),
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(cfg.min_zoom, cfg.max_zoom, cfg.zoom_step, cfg.wheel_sensitivity)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn wheel_sensitivity(&self) -> f64 {
        self.wheel_sensitivity
    }

    /// Zoom level used on a fresh session: 1.0 when allowed.
    pub fn initial(&self) -> f64 {
        1.0_f64.clamp(self.min, self.max)
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// User-controlled zoom, always within `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    zoom: f64,
    limits: ZoomLimits,
}

impl Camera {
    pub fn new(limits: ZoomLimits) -> Self {
        Self {
            zoom: limits.initial(),
            limits,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.limits.step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.limits.step);
    }

    /// Positive deltas (scrolling down) zoom out.
    pub fn wheel(&mut self, delta: f64) {
        if delta.is_finite() {
            self.set_zoom(self.zoom - delta * self.limits.wheel_sensitivity);
        }
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.limits.min, self.limits.max);
        }
    }

    pub fn reset(&mut self) {
        self.zoom = self.limits.initial();
    }

    pub fn transform(&self, focus: Vec2, viewport: Viewport) -> ViewTransform {
        view_transform(focus, self.zoom, viewport)
    }
}
