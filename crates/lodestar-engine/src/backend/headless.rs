//! In-memory backend.
//!
//! Windows, displays, buffers and drawables live in process memory. Submitted
//! frames are queued until [`HeadlessBackend::complete_submitted`] runs their
//! completion callbacks, which makes GPU asynchrony reproducible: a test
//! decides exactly when the "GPU" finishes reading a buffer.

use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::bail;

use crate::descriptor::{CullMode, WindowDescriptor, WindowFlags};

use super::{
    Backend, CompletionCallback, FrameEncoder, NativeWindow, PipelineSetup, ShaderStage, Toolkit,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── toolkit ───────────────────────────────────────────────────────────────

/// Headless window factory with a fixed number of displays.
#[derive(Debug)]
pub struct HeadlessToolkit {
    screens: u32,
    next_id: AtomicU64,
    open: Arc<Mutex<HashSet<u64>>>,
}

impl HeadlessToolkit {
    pub fn new(screens: u32) -> Self {
        Self {
            screens: screens.max(1),
            next_id: AtomicU64::new(1),
            open: Arc::default(),
        }
    }

    /// Number of native windows currently alive.
    pub fn open_windows(&self) -> usize {
        lock(&self.open).len()
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Toolkit for HeadlessToolkit {
    type Window = HeadlessWindow;

    fn create_window(&self, descriptor: &WindowDescriptor) -> anyhow::Result<HeadlessWindow> {
        if descriptor.frame.is_empty() || !descriptor.frame.is_finite() {
            bail!("cannot create a window with frame {:?}", descriptor.frame);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.open).insert(id);

        Ok(HeadlessWindow {
            id,
            screens: self.screens,
            state: Mutex::new(coerce(descriptor, self.screens)),
            open: Arc::clone(&self.open),
        })
    }
}

/// Applies the same coercions a desktop toolkit does.
fn coerce(requested: &WindowDescriptor, screens: u32) -> WindowDescriptor {
    let mut flags = requested.flags;
    if flags.contains(WindowFlags::FULLSCREEN) {
        flags.remove(WindowFlags::BORDERLESS);
    }

    WindowDescriptor {
        identifier: 0,
        frame: requested.frame,
        flags,
        screen: if requested.screen < screens { requested.screen } else { 0 },
        title: requested.title.clone(),
    }
}

#[derive(Debug)]
pub struct HeadlessWindow {
    id: u64,
    screens: u32,
    state: Mutex<WindowDescriptor>,
    open: Arc<Mutex<HashSet<u64>>>,
}

impl NativeWindow for HeadlessWindow {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn describe(&self) -> WindowDescriptor {
        lock(&self.state).clone()
    }

    fn apply(&self, descriptor: &WindowDescriptor) {
        let mut next = coerce(descriptor, self.screens);
        let mut state = lock(&self.state);
        if next.title.is_none() {
            next.title = state.title.take();
        }
        *state = next;
    }

    fn drawable_size(&self) -> (u32, u32) {
        let frame = lock(&self.state).frame;
        (frame.w.max(1.0) as u32, frame.h.max(1.0) as u32)
    }
}

impl Drop for HeadlessWindow {
    fn drop(&mut self) {
        lock(&self.open).remove(&self.id);
    }
}

// ── device ────────────────────────────────────────────────────────────────

/// A CPU-side stand-in for a GPU buffer.
#[derive(Debug, Clone)]
pub struct HeadlessBuffer {
    id: u64,
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl HeadlessBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn contents(&self) -> Vec<u8> {
        lock(&self.bytes).clone()
    }
}

/// Command recorded by a [`HeadlessFrame`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameCommand {
    Clear([f32; 4]),
    Bind { stage: ShaderStage, index: u32, buffer: u64 },
    Draw { vertices: Range<u32> },
}

#[derive(Default)]
struct SubmissionQueue {
    pending: VecDeque<Vec<CompletionCallback>>,
    history: Vec<Vec<FrameCommand>>,
}

pub struct HeadlessSurface {
    window: u64,
    size: (u32, u32),
}

impl HeadlessSurface {
    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

#[derive(Debug)]
pub struct HeadlessPipelineState {
    pub vertex: String,
    pub fragment: String,
    pub culling: CullMode,
    /// Size of the depth/stencil target; follows the surface.
    pub depth_size: (u32, u32),
}

/// In-memory GPU device.
pub struct HeadlessBackend {
    functions: HashSet<(ShaderStage, String)>,
    next_buffer: AtomicU64,
    drawable_available: AtomicBool,
    queue: Arc<Mutex<SubmissionQueue>>,
}

impl HeadlessBackend {
    /// Creates a device whose shader library contains `functions`.
    pub fn new<I, S>(functions: I) -> Self
    where
        I: IntoIterator<Item = (ShaderStage, S)>,
        S: Into<String>,
    {
        Self {
            functions: functions.into_iter().map(|(s, n)| (s, n.into())).collect(),
            next_buffer: AtomicU64::new(1),
            drawable_available: AtomicBool::new(true),
            queue: Arc::default(),
        }
    }

    /// Library holding `vs_main` and `fs_main`.
    pub fn with_default_library() -> Self {
        Self::new([
            (ShaderStage::Vertex, "vs_main"),
            (ShaderStage::Fragment, "fs_main"),
        ])
    }

    /// Simulates a surface with (or without) a presentable frame.
    pub fn set_drawable_available(&self, available: bool) {
        self.drawable_available.store(available, Ordering::Release);
    }

    /// Submissions whose completion has not been reported yet.
    pub fn pending_submissions(&self) -> usize {
        lock(&self.queue).pending.len()
    }

    /// Reports completion of every pending submission, oldest first.
    ///
    /// Returns how many submissions completed.
    pub fn complete_submitted(&self) -> usize {
        let drained: Vec<_> = lock(&self.queue).pending.drain(..).collect();
        let count = drained.len();
        // Callbacks run outside the queue lock; they take pool locks.
        for callbacks in drained {
            for cb in callbacks {
                cb();
            }
        }
        count
    }

    /// Reports completion of the oldest pending submission only.
    pub fn complete_next(&self) -> bool {
        let next = lock(&self.queue).pending.pop_front();
        match next {
            Some(callbacks) => {
                for cb in callbacks {
                    cb();
                }
                true
            }
            None => false,
        }
    }

    /// Commands of every submitted frame, in submission order.
    pub fn submitted_frames(&self) -> Vec<Vec<FrameCommand>> {
        lock(&self.queue).history.clone()
    }
}

impl Backend for HeadlessBackend {
    type Window = HeadlessWindow;
    type Buffer = HeadlessBuffer;
    type Surface = HeadlessSurface;
    type PipelineState = HeadlessPipelineState;
    type Frame = HeadlessFrame;

    fn create_buffer_with_data(&self, _label: &str, contents: &[u8]) -> HeadlessBuffer {
        HeadlessBuffer {
            id: self.next_buffer.fetch_add(1, Ordering::Relaxed),
            bytes: Arc::new(Mutex::new(contents.to_vec())),
        }
    }

    fn create_buffer(&self, _label: &str, size: u64) -> HeadlessBuffer {
        HeadlessBuffer {
            id: self.next_buffer.fetch_add(1, Ordering::Relaxed),
            bytes: Arc::new(Mutex::new(vec![0; size as usize])),
        }
    }

    fn write_buffer(&self, buffer: &HeadlessBuffer, data: &[u8]) {
        let mut bytes = lock(&buffer.bytes);
        let n = data.len().min(bytes.len());
        bytes[..n].copy_from_slice(&data[..n]);
    }

    fn has_function(&self, stage: ShaderStage, name: &str) -> bool {
        self.functions.contains(&(stage, name.to_owned()))
    }

    fn create_surface(&self, window: &HeadlessWindow) -> anyhow::Result<HeadlessSurface> {
        Ok(HeadlessSurface {
            window: window.id(),
            size: window.drawable_size(),
        })
    }

    fn resize_surface(&self, surface: &mut HeadlessSurface, width: u32, height: u32) {
        if width > 0 && height > 0 {
            surface.size = (width, height);
        }
    }

    fn create_pipeline_state(
        &self,
        surface: &HeadlessSurface,
        setup: &PipelineSetup<'_>,
    ) -> anyhow::Result<HeadlessPipelineState> {
        Ok(HeadlessPipelineState {
            vertex: setup.vertex.to_owned(),
            fragment: setup.fragment.to_owned(),
            culling: setup.culling,
            depth_size: surface.size,
        })
    }

    fn begin_frame(
        &self,
        surface: &HeadlessSurface,
        state: &mut HeadlessPipelineState,
        clear_color: [f32; 4],
    ) -> Option<HeadlessFrame> {
        if !self.drawable_available.load(Ordering::Acquire) {
            return None;
        }
        state.depth_size = surface.size;

        Some(HeadlessFrame {
            commands: vec![FrameCommand::Clear(clear_color)],
            completions: Vec::new(),
            queue: Arc::clone(&self.queue),
        })
    }
}

pub struct HeadlessFrame {
    commands: Vec<FrameCommand>,
    completions: Vec<CompletionCallback>,
    queue: Arc<Mutex<SubmissionQueue>>,
}

impl FrameEncoder for HeadlessFrame {
    type Buffer = HeadlessBuffer;

    fn set_buffer(&mut self, stage: ShaderStage, index: u32, buffer: &HeadlessBuffer) {
        self.commands.push(FrameCommand::Bind {
            stage,
            index,
            buffer: buffer.id,
        });
    }

    fn draw_triangles(&mut self, vertices: Range<u32>) {
        self.commands.push(FrameCommand::Draw { vertices });
    }

    fn on_completed(&mut self, callback: CompletionCallback) {
        self.completions.push(callback);
    }

    fn commit(self) {
        let mut queue = lock(&self.queue);
        queue.history.push(self.commands);
        queue.pending.push_back(self.completions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Rect;

    #[test]
    fn fullscreen_suppresses_borderless() {
        let tk = HeadlessToolkit::new(1);
        let w = tk
            .create_window(&WindowDescriptor::new(
                Rect::new(0.0, 0.0, 100.0, 100.0),
                WindowFlags::FULLSCREEN | WindowFlags::BORDERLESS,
            ))
            .unwrap();
        assert_eq!(w.describe().flags, WindowFlags::FULLSCREEN);
    }

    #[test]
    fn unknown_screen_falls_back_to_primary() {
        let tk = HeadlessToolkit::new(2);
        let w = tk
            .create_window(
                &WindowDescriptor::new(Rect::new(0.0, 0.0, 10.0, 10.0), WindowFlags::DEFAULT)
                    .on_screen(5),
            )
            .unwrap();
        assert_eq!(w.describe().screen, 0);
    }

    #[test]
    fn dropping_a_window_closes_it() {
        let tk = HeadlessToolkit::default();
        let w = tk
            .create_window(&WindowDescriptor::new(Rect::new(0.0, 0.0, 10.0, 10.0), WindowFlags::DEFAULT))
            .unwrap();
        assert_eq!(tk.open_windows(), 1);
        drop(w);
        assert_eq!(tk.open_windows(), 0);
    }

    #[test]
    fn completions_wait_for_explicit_report() {
        let gpu = HeadlessBackend::with_default_library();
        let tk = HeadlessToolkit::default();
        let w = tk
            .create_window(&WindowDescriptor::new(Rect::new(0.0, 0.0, 10.0, 10.0), WindowFlags::DEFAULT))
            .unwrap();
        let surface = gpu.create_surface(&w).unwrap();
        let setup = PipelineSetup { vertex: "vs_main", fragment: "fs_main", culling: CullMode::Back };
        let mut state = gpu.create_pipeline_state(&surface, &setup).unwrap();

        let fired = Arc::new(AtomicBool::new(false));
        let mut frame = gpu.begin_frame(&surface, &mut state, [0.0; 4]).unwrap();
        let flag = Arc::clone(&fired);
        frame.on_completed(Box::new(move || flag.store(true, Ordering::SeqCst)));
        frame.commit();

        assert_eq!(gpu.pending_submissions(), 1);
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(gpu.complete_submitted(), 1);
        assert!(fired.load(Ordering::SeqCst));
    }
}
