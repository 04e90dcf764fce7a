//! Per-frame encoding session of one pipeline.
//!
//! `Uninitialized -> Encoding -> Committed`. A pass is opened on a freshly
//! acquired drawable, records binds and draws, and on commit hands the work
//! to the GPU. Mutable buffers bound during the pass go back to their pool
//! only when the GPU reports the submission complete.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{Backend, FrameEncoder, ShaderStage};
use crate::buffer::BufferManager;
use crate::descriptor::{BufferDescriptor, BufferKind, PoolKey};
use crate::error::{RenderError, Result};
use crate::handle::Handle;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassState {
    /// No pass was opened since the last commit.
    Uninitialized,
    Encoding,
    /// Terminal.
    Committed,
}

pub struct RenderPass<B: Backend> {
    frame: Option<B::Frame>,
    state: PassState,
    /// Mutable slots whose release is already scheduled for this submission.
    releases: HashSet<(PoolKey, Handle)>,
    draws: usize,
}

impl<B: Backend> RenderPass<B> {
    /// Acquires a drawable and opens the encoder.
    pub(crate) fn begin(
        gpu: &B,
        surface: &B::Surface,
        pipeline_state: &mut B::PipelineState,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let frame = gpu
            .begin_frame(surface, pipeline_state, clear_color)
            .ok_or(RenderError::NoDrawableAvailable)?;

        Ok(Self {
            frame: Some(frame),
            state: PassState::Encoding,
            releases: HashSet::new(),
            draws: 0,
        })
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state == PassState::Committed
    }

    /// Draw calls recorded so far.
    pub fn draw_count(&self) -> usize {
        self.draws
    }

    fn encoder(&mut self) -> Result<&mut B::Frame> {
        self.frame.as_mut().ok_or(RenderError::PassCommitted)
    }

    pub fn set_vertex_buffer_at(
        &mut self,
        manager: &BufferManager<B>,
        desc: &BufferDescriptor,
        index: u32,
    ) -> Result<()> {
        self.bind(ShaderStage::Vertex, manager, desc, index)
    }

    pub fn set_fragment_buffer_at(
        &mut self,
        manager: &BufferManager<B>,
        desc: &BufferDescriptor,
        index: u32,
    ) -> Result<()> {
        self.bind(ShaderStage::Fragment, manager, desc, index)
    }

    fn bind(
        &mut self,
        stage: ShaderStage,
        manager: &BufferManager<B>,
        desc: &BufferDescriptor,
        index: u32,
    ) -> Result<()> {
        self.encoder()?;

        match desc.kind {
            BufferKind::Immutable => {
                let buffer = manager.immutable(desc)?;
                self.encoder()?.set_buffer(stage, index, &buffer);
            }
            BufferKind::Mutable => {
                let pool = manager.pool(desc.shape()).ok_or(RenderError::PoolUnresolved)?;
                let buffer = pool.buffer(desc.identifier).cloned().ok_or(RenderError::NotFound)?;
                let schedule = self.releases.insert((desc.shape(), desc.identifier));

                let frame = self.encoder()?;
                frame.set_buffer(stage, index, &buffer);
                if schedule {
                    let identifier = desc.identifier;
                    let pool = Arc::clone(&pool);
                    frame.on_completed(Box::new(move || {
                        pool.release(identifier);
                    }));
                }
            }
            BufferKind::Invalid => {
                return Err(RenderError::InvalidDescriptor("buffer kind is invalid"));
            }
        }
        Ok(())
    }

    /// Triangle-list draw over vertices `from..from + count`.
    pub fn render_triangles(&mut self, count: u32, from: u32) -> Result<()> {
        let end = from
            .checked_add(count)
            .ok_or(RenderError::InvalidDescriptor("vertex range overflows"))?;
        self.encoder()?.draw_triangles(from..end);
        self.draws += 1;
        Ok(())
    }

    /// Ends encoding, presents and submits.
    ///
    /// Returns `false` if the pass was already committed.
    pub fn commit(&mut self) -> bool {
        let Some(frame) = self.frame.take() else {
            return false;
        };
        frame.commit();
        self.state = PassState::Committed;
        log::trace!("render pass committed with {} draws", self.draws);
        true
    }
}
