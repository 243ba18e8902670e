//! Rendering abstraction.
//!
//! This crate does not depend on a graphics backend. A host renderer
//! implements [`RenderBackend`] and receives one [`FrameView`] per frame.

use kirworld_shared::math::Vec2;
use tracing::trace;

use crate::{camera::ViewTransform, interp::RenderEntity};

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    pub entities: Vec<RenderEntity>,
    pub transform: ViewTransform,
}

impl FrameView {
    pub fn local(&self) -> Option<&RenderEntity> {
        self.entities.iter().find(|e| e.is_local)
    }

    /// Screen position of an entity's display point.
    pub fn screen_position(&self, entity: &RenderEntity) -> Vec2 {
        self.transform.world_to_screen(entity.display)
    }
}

/// A minimal rendering API.
pub trait RenderBackend {
    fn begin_frame(&mut self);
    fn set_view(&mut self, view: &ViewTransform);
    fn draw_player(&mut self, entity: &RenderEntity);
    fn end_frame(&mut self);

    /// Draws a complete frame.
    fn present(&mut self, frame: &FrameView) {
        self.begin_frame();
        self.set_view(&frame.transform);
        for entity in &frame.entities {
            self.draw_player(entity);
        }
        self.end_frame();
    }
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn set_view(&mut self, _view: &ViewTransform) {}
    fn draw_player(&mut self, _entity: &RenderEntity) {}
    fn end_frame(&mut self) {}
}

/// Logs where the local player lands on screen.
#[derive(Default)]
pub struct TraceRenderer {
    frame: u64,
    view: Option<ViewTransform>,
    drawn: usize,
}

impl TraceRenderer {
    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl RenderBackend for TraceRenderer {
    fn begin_frame(&mut self) {
        self.frame += 1;
        self.drawn = 0;
    }

    fn set_view(&mut self, view: &ViewTransform) {
        self.view = Some(*view);
    }

    fn draw_player(&mut self, entity: &RenderEntity) {
        self.drawn += 1;
        if !entity.is_local {
            return;
        }
        if let Some(view) = &self.view {
            let screen = view.world_to_screen(entity.display);
            trace!(
                frame = self.frame,
                name = %entity.name,
                x = screen.x,
                y = screen.y,
                zoom = view.scale,
                "Local player"
            );
        }
    }

    fn end_frame(&mut self) {
        trace!(frame = self.frame, drawn = self.drawn, "Frame");
    }
}
