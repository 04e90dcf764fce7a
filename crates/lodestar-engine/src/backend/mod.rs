//! Native windowing + GPU seams.
//!
//! The registries never touch a toolkit or GPU API directly; they go through
//! these traits. Two implementations ship:
//! - [`desktop`]: winit windows + wgpu device/surfaces
//! - [`headless`]: in-memory windows, buffers and deferred completion, used by
//!   tests and by hosts without a display

use std::ops::Range;

use crate::descriptor::{CullMode, WindowDescriptor};

pub mod desktop;
pub mod headless;

/// Shader stage a function or buffer binding belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Callback run once the GPU finished executing a submitted command buffer.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A live native window.
pub trait NativeWindow {
    /// Toolkit-side identity, used to route toolkit-originated events.
    type Id: Copy + Eq + std::hash::Hash + std::fmt::Debug;

    fn id(&self) -> Self::Id;

    /// Reads the current native state. The returned identifier is always `0`;
    /// the registry fills in the handle.
    fn describe(&self) -> WindowDescriptor;

    /// Re-applies flags, title, frame and display placement.
    fn apply(&self, descriptor: &WindowDescriptor);

    /// Drawable size in physical pixels.
    fn drawable_size(&self) -> (u32, u32);
}

/// Native window factory.
pub trait Toolkit {
    type Window: NativeWindow;

    fn create_window(&self, descriptor: &WindowDescriptor) -> anyhow::Result<Self::Window>;
}

/// Parameters for building native pipeline state.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSetup<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub culling: CullMode,
}

/// GPU device.
///
/// Shared across threads: buffer writes happen on the driving thread while
/// completion callbacks arrive on a backend-defined context.
pub trait Backend: Send + Sync + 'static {
    type Window: NativeWindow;
    type Buffer: Clone + Send + Sync + 'static;
    type Surface;
    type PipelineState;
    type Frame: FrameEncoder<Buffer = Self::Buffer>;

    /// Creates a buffer holding `contents`, visible to the GPU on return.
    fn create_buffer_with_data(&self, label: &str, contents: &[u8]) -> Self::Buffer;

    /// Creates a CPU-writable buffer of `size` bytes.
    fn create_buffer(&self, label: &str, size: u64) -> Self::Buffer;

    /// Copies `data` to the start of `buffer` and marks the range modified.
    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]);

    /// Looks a function up by name in the compiled shader library.
    fn has_function(&self, stage: ShaderStage, name: &str) -> bool;

    fn create_surface(&self, window: &Self::Window) -> anyhow::Result<Self::Surface>;

    fn resize_surface(&self, surface: &mut Self::Surface, width: u32, height: u32);

    fn create_pipeline_state(
        &self,
        surface: &Self::Surface,
        setup: &PipelineSetup<'_>,
    ) -> anyhow::Result<Self::PipelineState>;

    /// Acquires the next drawable and opens an encoder on it.
    ///
    /// Returns `None` when no drawable is ready.
    fn begin_frame(
        &self,
        surface: &Self::Surface,
        state: &mut Self::PipelineState,
        clear_color: [f32; 4],
    ) -> Option<Self::Frame>;

    /// Gives the device a chance to deliver pending completion callbacks.
    ///
    /// Called while a thread waits for a pooled buffer. Must not block.
    fn maintain(&self) {}
}

/// One encoding session on an acquired drawable.
pub trait FrameEncoder {
    type Buffer;

    fn set_buffer(&mut self, stage: ShaderStage, index: u32, buffer: &Self::Buffer);

    /// Triangle-list draw over `vertices`.
    fn draw_triangles(&mut self, vertices: Range<u32>);

    /// Registers `callback` to run once the submitted work completes.
    fn on_completed(&mut self, callback: CompletionCallback);

    /// Ends encoding, presents the drawable and submits the work.
    fn commit(self);
}
