//! End-to-end frame flow against the headless backend.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lodestar_engine::backend::headless::{FrameCommand, HeadlessBackend, HeadlessToolkit};
use lodestar_engine::backend::ShaderStage;
use lodestar_engine::buffer::PoolSettings;
use lodestar_engine::descriptor::{
    BufferDescriptor, PipelineDescriptor, Rect, WindowDescriptor, WindowFlags, SHARED_MANAGER,
};
use lodestar_engine::render_pass::PassState;
use lodestar_engine::{Handle, RenderContext, RenderError};

struct Rig {
    gpu: Arc<HeadlessBackend>,
    toolkit: HeadlessToolkit,
    ctx: RenderContext<HeadlessBackend>,
}

fn rig(pool_size: usize) -> Rig {
    let gpu = Arc::new(HeadlessBackend::with_default_library());
    let ctx = RenderContext::new(Arc::clone(&gpu), PoolSettings { pool_size, gate_timeout: None });
    Rig { gpu, toolkit: HeadlessToolkit::new(2), ctx }
}

impl Rig {
    fn window(&mut self) -> Handle {
        let desc = WindowDescriptor::new(Rect::new(10.0, 10.0, 320.0, 240.0), WindowFlags::DEFAULT)
            .with_title("frame flow");
        self.ctx.create_window(&self.toolkit, &desc).unwrap().identifier
    }

    fn pipeline(&mut self, window: Handle, manager: Option<Handle>) -> PipelineDescriptor {
        let mut desc = PipelineDescriptor::new(window, "vs_main", "fs_main");
        if let Some(m) = manager {
            desc = desc.with_buffer_manager(m);
        }
        self.ctx.create_pipeline(&desc).unwrap()
    }

    /// One full frame binding `buffer` at vertex index 1.
    fn frame_with(&mut self, window: Handle, buffer: &BufferDescriptor) {
        self.ctx.render_pass(window).unwrap();
        self.ctx.set_vertex_buffer_at(window, buffer, 1).unwrap();
        self.ctx.render_triangles(window, 3, 0).unwrap();
        assert!(self.ctx.commit_render_pass(window).unwrap());
    }
}

#[test]
fn fifth_assign_waits_for_the_oldest_frame() {
    let mut r = rig(4);
    let w = r.window();
    let p = r.pipeline(w, None);

    let pool = r
        .ctx
        .allocate_buffer(&BufferDescriptor::mutable(p.buffer_manager, 64, 100), &[])
        .unwrap();

    for expected in 1..=4 {
        let id = r.ctx.assign_buffer(&pool, &[expected as u8; 64]).unwrap();
        assert_eq!(id, expected);
        r.frame_with(w, &BufferDescriptor { identifier: id, ..pool });
    }
    assert_eq!(r.gpu.pending_submissions(), 4);

    let manager = r.ctx.manager(p.buffer_manager).unwrap();
    let (tx, rx) = mpsc::channel();
    let waiter = thread::spawn(move || {
        tx.send(manager.assign_mutable(&pool, &[5; 64])).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "assign did not block");

    // The GPU finishes the first frame; its slot comes back.
    assert!(r.gpu.complete_next());
    let id = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(id, 1);
    waiter.join().unwrap();
}

#[test]
fn slots_come_back_in_circular_order() {
    let mut r = rig(3);
    let w = r.window();
    let p = r.pipeline(w, None);
    let pool = r
        .ctx
        .allocate_buffer(&BufferDescriptor::mutable(p.buffer_manager, 16, 1), &[])
        .unwrap();

    let ids: Vec<_> = (0..3)
        .map(|_| r.ctx.try_assign_buffer(&pool, &[0; 16]).unwrap())
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    // Slot 2 is free but slot 1 is next in order.
    r.ctx.free_buffer(&BufferDescriptor { identifier: 2, ..pool }).unwrap();
    assert_eq!(r.ctx.try_assign_buffer(&pool, &[0; 16]).unwrap(), None);

    r.ctx.free_buffer(&BufferDescriptor { identifier: 1, ..pool }).unwrap();
    assert_eq!(r.ctx.try_assign_buffer(&pool, &[0; 16]).unwrap(), Some(1));
    assert_eq!(r.ctx.try_assign_buffer(&pool, &[0; 16]).unwrap(), Some(2));
    assert_eq!(r.ctx.try_assign_buffer(&pool, &[0; 16]).unwrap(), None);
}

#[test]
fn shared_manager_keeps_one_pool_per_shape() {
    let mut r = rig(4);
    let a = r.window();
    let b = r.window();
    r.pipeline(a, Some(SHARED_MANAGER));
    r.pipeline(b, Some(SHARED_MANAGER));

    for _ in 0..2 {
        r.ctx
            .allocate_buffer(&BufferDescriptor::mutable(SHARED_MANAGER, 16, 1), &[])
            .unwrap();
    }

    let shared = r.ctx.manager(SHARED_MANAGER).unwrap();
    assert_eq!(shared.pool_count(), 1);
    assert!(r.ctx.manager(a).is_err());
}

#[test]
fn closed_windows_stay_closed() {
    let mut r = rig(4);
    let w = r.window();
    r.pipeline(w, None);

    r.ctx.close_window(w).unwrap();
    assert!(matches!(r.ctx.query_window(w), Err(RenderError::NotFound)));
    assert!(matches!(r.ctx.query_pipeline(w), Err(RenderError::NotFound)));
    assert!(!r.ctx.window_query(w).is_valid());
    assert!(!r.ctx.window_update(w, &WindowDescriptor::invalid()).is_valid());

    let next = r.window();
    assert_ne!(next, w);
    assert!(matches!(r.ctx.query_window(w), Err(RenderError::NotFound)));
    assert_eq!(r.toolkit.open_windows(), 1);
}

#[test]
fn unknown_shader_function_creates_no_pipeline() {
    let mut r = rig(4);
    let w = r.window();

    let err = r
        .ctx
        .create_pipeline(&PipelineDescriptor::new(w, "vs_main", "does_not_exist"))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidFragmentFunction(ref name) if name == "does_not_exist"));
    assert!(matches!(r.ctx.query_pipeline(w), Err(RenderError::NotFound)));
    assert!(!r.ctx.pipeline_create(&PipelineDescriptor::new(w, "nope", "fs_main")).is_valid());
}

#[test]
fn immutable_buffers_number_from_one() {
    let mut r = rig(4);
    let w = r.window();
    let p = r.pipeline(w, None);

    for i in 1..=5u32 {
        let d = r
            .ctx
            .allocate_buffer(&BufferDescriptor::immutable(p.buffer_manager, 4, 3), &[i as u8; 12])
            .unwrap();
        assert_eq!(d.identifier, i);
    }
    assert_eq!(r.ctx.manager(p.buffer_manager).unwrap().immutable_count(), 5);
}

#[test]
fn committed_pass_rejects_further_work() {
    let mut r = rig(4);
    let w = r.window();
    let p = r.pipeline(w, None);
    let verts = r
        .ctx
        .allocate_buffer(&BufferDescriptor::immutable(p.buffer_manager, 4, 3), &[0; 12])
        .unwrap();

    r.frame_with(w, &verts);
    assert_eq!(r.ctx.pass_state(w), PassState::Committed);

    assert!(!r.ctx.commit_render_pass(w).unwrap());
    assert!(matches!(r.ctx.set_fragment_buffer_at(w, &verts, 0), Err(RenderError::PassCommitted)));
    assert!(matches!(r.ctx.render_triangles(w, 3, 0), Err(RenderError::PassCommitted)));
    assert_eq!(r.gpu.submitted_frames().len(), 1);

    // The next access opens a fresh pass.
    r.frame_with(w, &verts);
    assert_eq!(r.gpu.submitted_frames().len(), 2);
}

#[test]
fn submitted_frame_records_clear_binds_and_draw() {
    let mut r = rig(4);
    let w = r.window();
    let p = r.pipeline(w, None);
    let verts = r
        .ctx
        .allocate_buffer(&BufferDescriptor::immutable(p.buffer_manager, 4, 3), &[0; 12])
        .unwrap();

    r.frame_with(w, &verts);

    let frames = r.gpu.submitted_frames();
    let commands = &frames[0];
    assert!(matches!(commands[0], FrameCommand::Clear(_)));
    assert!(matches!(
        commands[1],
        FrameCommand::Bind { stage: ShaderStage::Vertex, index: 1, .. }
    ));
    assert!(matches!(&commands[2], FrameCommand::Draw { vertices } if *vertices == (0..3)));
}

#[test]
fn missing_drawable_skips_the_frame() {
    let mut r = rig(4);
    let w = r.window();
    r.pipeline(w, None);

    r.gpu.set_drawable_available(false);
    assert!(matches!(r.ctx.render_pass(w), Err(RenderError::NoDrawableAvailable)));
    assert!(!r.ctx.pass_create(w));

    r.gpu.set_drawable_available(true);
    assert!(r.ctx.pass_create(w));
    assert_eq!(r.ctx.pass_state(w), PassState::Encoding);
}

#[test]
fn second_access_reuses_the_encoding_pass() {
    let mut r = rig(4);
    let w = r.window();
    r.pipeline(w, None);

    r.ctx.render_pass(w).unwrap();
    // Only a fresh pass needs a drawable.
    r.gpu.set_drawable_available(false);
    assert!(r.ctx.render_pass(w).is_ok());
    assert_eq!(r.ctx.pass_state(w), PassState::Encoding);

    assert!(r.ctx.commit_render_pass(w).unwrap());
    assert_eq!(r.gpu.submitted_frames().len(), 1);
}
