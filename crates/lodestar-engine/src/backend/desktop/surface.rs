use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use super::DesktopInit;

/// Swapchain bound to one native window.
pub struct DesktopSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    /// Current drawable size in physical pixels; may be zero while minimized.
    size: (u32, u32),
}

impl DesktopSurface {
    pub(super) fn new(
        instance: &wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        window: Arc<Window>,
        init: &DesktopInit,
    ) -> Result<Self> {
        let inner = window.inner_size();
        anyhow::ensure!(inner.width > 0 && inner.height > 0, "window has zero size");

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let caps = surface.get_capabilities(adapter);
        let format = choose_surface_format(&caps, init.prefer_srgb)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: inner.width,
            height: inner.height,
            present_mode: init.present_mode,
            alpha_mode: choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(device, &config);

        Ok(Self {
            surface,
            config,
            size: (inner.width, inner.height),
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub(super) fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
    }

    /// Acquires the next texture; `None` means skip this frame.
    pub(super) fn acquire(&self, device: &wgpu::Device) -> Option<wgpu::SurfaceTexture> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return None;
        }

        match self.surface.get_current_texture() {
            Ok(texture) => Some(texture),
            Err(err) => {
                match err {
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                        log::debug!("surface {err}; reconfiguring");
                        self.surface.configure(device, &self.config);
                    }
                    wgpu::SurfaceError::OutOfMemory => {
                        log::error!("surface out of memory");
                    }
                    wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => {
                        log::debug!("surface {err}; skipping frame");
                    }
                }
                None
            }
        }
    }
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}

fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}
