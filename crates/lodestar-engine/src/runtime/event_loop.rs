use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::backend::desktop::DesktopBackend;
use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::server::RenderServer;
use crate::time::{FixedTick, FrameClock};

use super::host::{Host, HostCtx};

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs until the host gives up or the last window closes.
    pub fn run<H>(config: EngineConfig, gpu: Arc<DesktopBackend>, host: H) -> Result<()>
    where
        H: Host + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState {
            server: RenderServer::new(gpu, config.pool_settings()),
            tick: FixedTick::new(config.tick_interval()),
            clock: FrameClock::default(),
            config,
            host,
            started: false,
            exit_requested: false,
            failure: None,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct RuntimeState<H: Host> {
    config: EngineConfig,
    server: RenderServer<DesktopBackend>,
    host: H,
    tick: FixedTick,
    clock: FrameClock,
    started: bool,
    exit_requested: bool,
    failure: Option<anyhow::Error>,
}

impl<H: Host> RuntimeState<H> {
    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<bool> {
        self.server
            .setup(event_loop, &self.config)
            .context("render server setup failed")?;

        let mut ctx = HostCtx {
            server: &mut self.server,
            event_loop,
        };
        let keep_going = self.host.on_start(&mut ctx);

        self.tick = FixedTick::new(self.config.tick_interval());
        self.clock.reset();
        Ok(keep_going)
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let time = self.clock.tick();
        let mut ctx = HostCtx {
            server: &mut self.server,
            event_loop,
        };
        if !self.host.on_frame(&mut ctx, time) {
            log::info!("host requested exit");
            self.request_exit(event_loop);
        }
    }
}

impl<H: Host> ApplicationHandler for RuntimeState<H> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        match self.start(event_loop) {
            Ok(true) => {}
            Ok(false) => self.request_exit(event_loop),
            Err(e) => {
                log::error!("{e:#}");
                self.failure = Some(e);
                self.request_exit(event_loop);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested || !self.started {
            return;
        }

        self.server.context().gpu().maintain();

        if self.tick.poll(Instant::now()) {
            self.frame(event_loop);
        }
        if self.server.window_count() == 0 {
            self.request_exit(event_loop);
            return;
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.tick.deadline()));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Some(handle) = self.server.close_native_window(window_id) {
                    log::debug!("window {handle} closed by the user");
                }
                if self.server.window_count() == 0 {
                    self.request_exit(event_loop);
                }
            }

            WindowEvent::Resized(size) => {
                self.resize(window_id, size.width, size.height);
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self
                    .server
                    .context()
                    .windows()
                    .handle_of(window_id)
                    .and_then(|h| self.server.context().windows().get(h))
                    .map(|e| e.native.window().inner_size());
                if let Some(size) = size {
                    self.resize(window_id, size.width, size.height);
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        if !self.started {
            return;
        }
        let mut ctx = HostCtx {
            server: &mut self.server,
            event_loop,
        };
        self.host.on_close(&mut ctx);
    }
}

impl<H: Host> RuntimeState<H> {
    fn resize(&mut self, window_id: WindowId, width: u32, height: u32) {
        let Some(handle) = self.server.context().windows().handle_of(window_id) else {
            return;
        };
        if let Err(e) = self.server.context_mut().resize_window(handle, width, height) {
            log::warn!("resize of window {handle} failed: {e}");
        }
    }
}
