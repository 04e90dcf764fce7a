use std::sync::Arc;

use anyhow::Context;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event_loop::ActiveEventLoop;
use winit::monitor::MonitorHandle;
use winit::window::{Fullscreen, Window, WindowButtons, WindowId};

use crate::backend::{NativeWindow, Toolkit};
use crate::descriptor::{Rect, WindowDescriptor, WindowFlags};

/// A winit window. Frames are logical pixels relative to the window's display.
#[derive(Debug, Clone)]
pub struct DesktopWindow {
    window: Arc<Window>,
}

impl DesktopWindow {
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

fn monitor_at(monitors: Vec<MonitorHandle>, screen: u32) -> Option<MonitorHandle> {
    let mut monitors = monitors;
    if (screen as usize) < monitors.len() {
        Some(monitors.swap_remove(screen as usize))
    } else {
        monitors.into_iter().next()
    }
}

fn buttons_for(flags: WindowFlags) -> WindowButtons {
    let mut buttons = WindowButtons::MAXIMIZE;
    if flags.contains(WindowFlags::CLOSABLE) {
        buttons |= WindowButtons::CLOSE;
    }
    if flags.contains(WindowFlags::MINIATURIZABLE) {
        buttons |= WindowButtons::MINIMIZE;
    }
    buttons
}

/// Physical position of `frame`'s origin on `monitor`.
fn origin_on(monitor: Option<&MonitorHandle>, frame: Rect) -> PhysicalPosition<i32> {
    let (base, scale) = monitor
        .map(|m| (m.position(), m.scale_factor()))
        .unwrap_or((PhysicalPosition::new(0, 0), 1.0));
    PhysicalPosition::new(
        base.x + (frame.x as f64 * scale).round() as i32,
        base.y + (frame.y as f64 * scale).round() as i32,
    )
}

impl NativeWindow for DesktopWindow {
    type Id = WindowId;

    fn id(&self) -> WindowId {
        self.window.id()
    }

    fn describe(&self) -> WindowDescriptor {
        let w = &self.window;
        let scale = w.scale_factor();
        let monitors: Vec<_> = w.available_monitors().collect();
        let current = w.current_monitor();

        let screen = current
            .as_ref()
            .and_then(|c| monitors.iter().position(|m| m == c))
            .unwrap_or(0) as u32;

        let base = current
            .as_ref()
            .map(|m| m.position())
            .unwrap_or(PhysicalPosition::new(0, 0));
        let outer = w.outer_position().unwrap_or(base);
        let size = w.inner_size();

        let mut flags = WindowFlags::empty();
        if w.is_resizable() {
            flags |= WindowFlags::RESIZABLE;
        }
        let buttons = w.enabled_buttons();
        if buttons.contains(WindowButtons::CLOSE) {
            flags |= WindowFlags::CLOSABLE;
        }
        if buttons.contains(WindowButtons::MINIMIZE) {
            flags |= WindowFlags::MINIATURIZABLE;
        }
        if w.fullscreen().is_some() {
            flags |= WindowFlags::FULLSCREEN;
        } else if !w.is_decorated() {
            flags |= WindowFlags::BORDERLESS;
        }

        WindowDescriptor {
            identifier: 0,
            frame: Rect::new(
                ((outer.x - base.x) as f64 / scale) as f32,
                ((outer.y - base.y) as f64 / scale) as f32,
                (size.width as f64 / scale) as f32,
                (size.height as f64 / scale) as f32,
            ),
            flags,
            screen,
            title: Some(w.title()),
        }
    }

    fn apply(&self, d: &WindowDescriptor) {
        let w = &self.window;
        let monitor = monitor_at(w.available_monitors().collect(), d.screen);

        if let Some(title) = &d.title {
            w.set_title(title);
        }
        w.set_resizable(d.flags.contains(WindowFlags::RESIZABLE));
        w.set_enabled_buttons(buttons_for(d.flags));

        if d.flags.contains(WindowFlags::FULLSCREEN) {
            w.set_fullscreen(Some(Fullscreen::Borderless(monitor)));
            return;
        }

        w.set_fullscreen(None);
        w.set_decorations(!d.flags.contains(WindowFlags::BORDERLESS));
        w.set_outer_position(origin_on(monitor.as_ref(), d.frame));
        let _ = w.request_inner_size(LogicalSize::new(d.frame.w as f64, d.frame.h as f64));
    }

    fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

impl Toolkit for ActiveEventLoop {
    type Window = DesktopWindow;

    fn create_window(&self, d: &WindowDescriptor) -> anyhow::Result<DesktopWindow> {
        anyhow::ensure!(
            !d.frame.is_empty() && d.frame.is_finite(),
            "cannot create a window with frame {:?}",
            d.frame
        );

        let monitor = monitor_at(self.available_monitors().collect(), d.screen);
        let fullscreen = d.flags.contains(WindowFlags::FULLSCREEN);

        let mut attrs = Window::default_attributes()
            .with_title(d.title.clone().unwrap_or_else(|| "lodestar".to_string()))
            .with_inner_size(LogicalSize::new(d.frame.w as f64, d.frame.h as f64))
            .with_position(origin_on(monitor.as_ref(), d.frame))
            .with_resizable(d.flags.contains(WindowFlags::RESIZABLE))
            .with_enabled_buttons(buttons_for(d.flags))
            .with_decorations(fullscreen || !d.flags.contains(WindowFlags::BORDERLESS));
        if fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(monitor)));
        }

        let window = ActiveEventLoop::create_window(self, attrs).context("failed to create window")?;
        Ok(DesktopWindow {
            window: Arc::new(window),
        })
    }
}
