use winit::event_loop::ActiveEventLoop;

use crate::backend::desktop::DesktopBackend;
use crate::context::RenderContext;
use crate::descriptor::WindowDescriptor;
use crate::error::Result;
use crate::server::RenderServer;
use crate::time::FrameTime;

/// Application driven by the [`Runtime`](super::Runtime).
pub trait Host {
    /// Runs once the configured windows and pipelines exist.
    /// Returning `false` ends the process.
    fn on_start(&mut self, ctx: &mut HostCtx<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// Runs once per tick. Returning `false` ends the process.
    fn on_frame(&mut self, ctx: &mut HostCtx<'_>, time: FrameTime) -> bool;

    /// Runs once before the event loop exits.
    fn on_close(&mut self, ctx: &mut HostCtx<'_>) {
        let _ = ctx;
    }
}

/// What a host callback may touch.
pub struct HostCtx<'a> {
    pub(super) server: &'a mut RenderServer<DesktopBackend>,
    pub(super) event_loop: &'a ActiveEventLoop,
}

impl<'a> HostCtx<'a> {
    pub fn server(&mut self) -> &mut RenderServer<DesktopBackend> {
        self.server
    }

    pub fn context(&mut self) -> &mut RenderContext<DesktopBackend> {
        self.server.context_mut()
    }

    /// Opens an extra window at runtime.
    pub fn create_window(&mut self, desc: &WindowDescriptor) -> Result<WindowDescriptor> {
        self.server.context_mut().create_window(self.event_loop, desc)
    }
}
