use std::collections::HashMap;

use crate::backend::{Backend, NativeWindow, Toolkit};
use crate::descriptor::WindowDescriptor;
use crate::error::{RenderError, Result};
use crate::handle::{Handle, HandleAllocator};

/// A live window and the surface presenting into it.
pub struct WindowEntry<B: Backend> {
    pub native: B::Window,
    pub surface: B::Surface,
}

pub struct WindowRegistry<B: Backend> {
    entries: HashMap<Handle, WindowEntry<B>>,
    handles: HandleAllocator,
}

impl<B: Backend> Default for WindowRegistry<B> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            handles: HandleAllocator::new(),
        }
    }
}

impl<B: Backend> WindowRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a native window plus its surface and registers it under a new
    /// handle. Returns the window as the toolkit actually created it.
    pub fn create<T>(&mut self, toolkit: &T, gpu: &B, desc: &WindowDescriptor) -> Result<WindowDescriptor>
    where
        T: Toolkit<Window = B::Window> + ?Sized,
    {
        let native = toolkit.create_window(desc)?;
        let surface = gpu.create_surface(&native)?;
        let handle = self.handles.next().ok_or(RenderError::HandlesExhausted)?;

        self.entries.insert(handle, WindowEntry { native, surface });
        log::info!("window {handle} created");
        self.query(handle)
    }

    pub fn query(&self, handle: Handle) -> Result<WindowDescriptor> {
        let entry = self.entries.get(&handle).ok_or(RenderError::NotFound)?;
        Ok(WindowDescriptor {
            identifier: handle,
            ..entry.native.describe()
        })
    }

    /// Re-applies flags, title, frame and display of an existing window.
    pub fn update(&mut self, handle: Handle, desc: &WindowDescriptor) -> Result<WindowDescriptor> {
        let Some(entry) = self.entries.get(&handle) else {
            log::warn!("update of unknown window {handle} ignored");
            return Err(RenderError::NotFound);
        };
        entry.native.apply(desc);
        self.query(handle)
    }

    /// Destroys the native window. The handle stays stale forever.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        match self.entries.remove(&handle) {
            Some(entry) => {
                // Surface first; it presents into the window.
                drop(entry.surface);
                drop(entry.native);
                log::info!("window {handle} closed");
                Ok(())
            }
            None => {
                log::warn!("close of unknown window {handle} ignored");
                Err(RenderError::NotFound)
            }
        }
    }

    /// Maps a toolkit window id back to its handle.
    pub fn handle_of(&self, id: <B::Window as NativeWindow>::Id) -> Option<Handle> {
        self.entries
            .iter()
            .find(|(_, e)| e.native.id() == id)
            .map(|(h, _)| *h)
    }

    pub fn get(&self, handle: Handle) -> Option<&WindowEntry<B>> {
        self.entries.get(&handle)
    }

    pub fn surface(&self, handle: Handle) -> Option<&B::Surface> {
        self.entries.get(&handle).map(|e| &e.surface)
    }

    /// Reconfigures the window's surface after a native resize.
    pub fn resize(&mut self, gpu: &B, handle: Handle, width: u32, height: u32) -> Result<()> {
        let entry = self.entries.get_mut(&handle).ok_or(RenderError::NotFound)?;
        gpu.resize_surface(&mut entry.surface, width, height);
        Ok(())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessBackend, HeadlessToolkit};
    use crate::descriptor::{Rect, WindowFlags};

    fn desc() -> WindowDescriptor {
        WindowDescriptor::new(Rect::new(10.0, 20.0, 640.0, 480.0), WindowFlags::DEFAULT).with_title("main")
    }

    #[test]
    fn create_then_query_round_trips() {
        let (tk, gpu) = (HeadlessToolkit::default(), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();

        let created = reg.create(&tk, &gpu, &desc()).unwrap();
        assert_eq!(created.identifier, 1);
        assert_eq!(created.frame, Rect::new(10.0, 20.0, 640.0, 480.0));
        assert_eq!(created.title.as_deref(), Some("main"));
        assert_eq!(reg.query(1).unwrap(), created);
    }

    #[test]
    fn unknown_handles_are_not_found() {
        let (tk, gpu) = (HeadlessToolkit::default(), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();
        reg.create(&tk, &gpu, &desc()).unwrap();

        assert!(matches!(reg.query(7), Err(RenderError::NotFound)));
        assert!(matches!(reg.update(7, &desc()), Err(RenderError::NotFound)));
        assert!(matches!(reg.close(7), Err(RenderError::NotFound)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn closed_handle_is_never_resurrected() {
        let (tk, gpu) = (HeadlessToolkit::default(), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();

        let first = reg.create(&tk, &gpu, &desc()).unwrap().identifier;
        reg.close(first).unwrap();
        let second = reg.create(&tk, &gpu, &desc()).unwrap().identifier;

        assert_ne!(first, second);
        assert!(matches!(reg.query(first), Err(RenderError::NotFound)));
        assert_eq!(tk.open_windows(), 1);
    }

    #[test]
    fn update_reports_coerced_state() {
        let (tk, gpu) = (HeadlessToolkit::new(2), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();
        let h = reg.create(&tk, &gpu, &desc()).unwrap().identifier;

        let wanted = WindowDescriptor::new(
            Rect::new(0.0, 0.0, 800.0, 600.0),
            WindowFlags::FULLSCREEN | WindowFlags::BORDERLESS,
        )
        .on_screen(1);
        let got = reg.update(h, &wanted).unwrap();

        assert_eq!(got.identifier, h);
        assert_eq!(got.flags, WindowFlags::FULLSCREEN);
        assert_eq!(got.screen, 1);
        assert_eq!(got.frame.w, 800.0);
        // Title is kept when the update carries none.
        assert_eq!(got.title.as_deref(), Some("main"));
    }

    #[test]
    fn failed_native_creation_consumes_no_handle() {
        let (tk, gpu) = (HeadlessToolkit::default(), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();

        let empty = WindowDescriptor::new(Rect::default(), WindowFlags::DEFAULT);
        assert!(matches!(reg.create(&tk, &gpu, &empty), Err(RenderError::Backend(_))));
        assert_eq!(reg.create(&tk, &gpu, &desc()).unwrap().identifier, 1);
    }

    #[test]
    fn native_id_maps_back_to_handle() {
        let (tk, gpu) = (HeadlessToolkit::default(), HeadlessBackend::with_default_library());
        let mut reg = WindowRegistry::<HeadlessBackend>::new();
        let h = reg.create(&tk, &gpu, &desc()).unwrap().identifier;

        let id = reg.get(h).unwrap().native.id();
        assert_eq!(reg.handle_of(id), Some(h));
        assert_eq!(reg.handle_of(id + 100), None);
    }
}
