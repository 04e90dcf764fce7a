//! WGSL shader library.
//!
//! One module holds every entry point. The index records which functions are
//! `@vertex` / `@fragment` entry points and which `@group/@binding` buffers
//! the module declares, so bind group layouts can be built up front. It is
//! read from naga's parse of the source, not from the text.

use std::collections::HashSet;

use anyhow::Context;
use thiserror::Error;
use wgpu::naga;

use crate::backend::ShaderStage;

/// Bind groups the pipeline layout provides: 0 for vertex-stage buffers,
/// 1 for fragment-stage buffers.
const BUFFER_GROUPS: u32 = 2;

/// How a declared binding is exposed to the shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Uniform,
    /// `var<storage, read>`; writable storage is not supported for bound buffers.
    Storage,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("shader library does not parse:\n{0}")]
    Parse(String),

    #[error("@group({group}) @binding({binding}): only groups 0 and 1 hold bound buffers")]
    UnsupportedGroup { group: u32, binding: u32 },

    #[error("@group({group}) @binding({binding}): only uniform and read-only storage buffers can be bound")]
    UnsupportedResource { group: u32, binding: u32 },
}

/// Entry points and resources found in a WGSL source.
#[derive(Debug, Default, Clone)]
pub struct LibraryIndex {
    functions: HashSet<(ShaderStage, String)>,
    bindings: Vec<BindingDecl>,
}

impl LibraryIndex {
    pub fn parse(source: &str) -> Result<Self, LibraryError> {
        let module =
            naga::front::wgsl::parse_str(source).map_err(|e| LibraryError::Parse(e.emit_to_string(source)))?;
        Self::from_module(&module)
    }

    fn from_module(module: &naga::Module) -> Result<Self, LibraryError> {
        let functions = module
            .entry_points
            .iter()
            .filter_map(|ep| {
                let stage = match ep.stage {
                    naga::ShaderStage::Vertex => ShaderStage::Vertex,
                    naga::ShaderStage::Fragment => ShaderStage::Fragment,
                    _ => return None,
                };
                Some((stage, ep.name.clone()))
            })
            .collect();

        let mut bindings = Vec::new();
        for (_, var) in module.global_variables.iter() {
            let Some(rb) = &var.binding else {
                continue;
            };
            let (group, binding) = (rb.group, rb.binding);

            let kind = match var.space {
                naga::AddressSpace::Uniform => BindingKind::Uniform,
                naga::AddressSpace::Storage { access } if !access.contains(naga::StorageAccess::STORE) => {
                    BindingKind::Storage
                }
                _ => return Err(LibraryError::UnsupportedResource { group, binding }),
            };
            if group >= BUFFER_GROUPS {
                return Err(LibraryError::UnsupportedGroup { group, binding });
            }
            bindings.push(BindingDecl { group, binding, kind });
        }

        Ok(Self { functions, bindings })
    }

    pub fn has_function(&self, stage: ShaderStage, name: &str) -> bool {
        self.functions.contains(&(stage, name.to_owned()))
    }

    /// Buffer bindings declared in `group`, ordered by binding index.
    pub fn bindings_in(&self, group: u32) -> Vec<BindingDecl> {
        let mut out: Vec<_> = self.bindings.iter().copied().filter(|b| b.group == group).collect();
        out.sort_by_key(|b| b.binding);
        out
    }
}

/// Compiled WGSL module plus its index.
pub struct ShaderLibrary {
    pub module: wgpu::ShaderModule,
    pub index: LibraryIndex,
}

impl ShaderLibrary {
    /// Indexes `source`, then compiles it on `device`.
    ///
    /// Validation failures come back as errors instead of reaching the
    /// device's uncaptured-error handler.
    pub fn compile(device: &wgpu::Device, source: &str) -> anyhow::Result<Self> {
        let index = LibraryIndex::parse(source)?;

        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lodestar shader library"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(err).context("shader library failed validation");
        }

        Ok(Self { module, index })
    }
}
