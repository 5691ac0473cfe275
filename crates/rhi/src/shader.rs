//! WGSL to SPIR-V translation and shader modules.
//!
//! Shaders ship as WGSL source and are translated with `naga` when the
//! pipeline is built, so no precompiled binaries live in the repository.
//!
//! ```no_run
//! use std::sync::Arc;
//! use objview_rhi::device::Device;
//! use objview_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>, source: &str) -> Result<(), objview_rhi::RhiError> {
//! let vs = Shader::from_wgsl(device, source, ShaderStage::Vertex, "vs_main")?;
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use naga::back::spv;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn vk_flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    fn naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

fn shader_error(what: &str, detail: impl std::fmt::Display) -> RhiError {
    RhiError::ShaderError(format!("{what}: {detail}"))
}

/// Translates the `entry_point` of `stage` in a WGSL source into SPIR-V words.
///
/// # Errors
///
/// [`RhiError::ShaderError`] on parse or validation failure, a missing entry
/// point, or a SPIR-V writer failure.
pub fn compile_wgsl(source: &str, stage: ShaderStage, entry_point: &str) -> RhiResult<Vec<u32>> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| shader_error("WGSL parse error", e.emit_to_string(source)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| shader_error("WGSL validation error", e))?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == stage.naga());
    if !has_entry {
        return Err(shader_error(
            "missing entry point",
            format_args!("no {:?} entry point named '{}'", stage, entry_point),
        ));
    }

    // Projections already produce Vulkan clip space; no Y flip in the writer
    let options = spv::Options {
        lang_version: (1, 3),
        flags: spv::WriterFlags::empty(),
        ..Default::default()
    };
    let pipeline_options = spv::PipelineOptions {
        shader_stage: stage.naga(),
        entry_point: entry_point.to_string(),
    };
    spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .map_err(|e| shader_error("SPIR-V generation error", e))
}

/// A shader module holding one entry point.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry: CString,
}

impl Shader {
    /// Compiles `entry_point` from WGSL `source` and creates the module.
    pub fn from_wgsl(
        device: Arc<Device>,
        source: &str,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let entry =
            CString::new(entry_point).map_err(|e| shader_error("bad entry point name", e))?;
        let words = compile_wgsl(source, stage, entry_point)?;

        let module = unsafe {
            device
                .handle()
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&words), None)?
        };
        debug!("{:?} shader '{}': {} SPIR-V words", stage, entry_point, words.len());

        Ok(Self {
            device,
            module,
            stage,
            entry,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Stage description for pipeline creation; borrows the entry name.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.vk_flags())
            .module(self.module)
            .name(&self.entry)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_shader_module(self.module, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSTHROUGH: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
"#;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_stage_flags() {
        assert_eq!(ShaderStage::Vertex.vk_flags(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.vk_flags(), vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_both_entry_points_compile() {
        let vs = compile_wgsl(PASSTHROUGH, ShaderStage::Vertex, "vs_main").unwrap();
        let fs = compile_wgsl(PASSTHROUGH, ShaderStage::Fragment, "fs_main").unwrap();
        assert_eq!(vs[0], SPIRV_MAGIC);
        assert_eq!(fs[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_entry_point_must_match_stage() {
        let err = compile_wgsl(PASSTHROUGH, ShaderStage::Fragment, "vs_main").unwrap_err();
        assert!(matches!(err, RhiError::ShaderError(_)));
        let err = compile_wgsl(PASSTHROUGH, ShaderStage::Vertex, "main").unwrap_err();
        assert!(matches!(err, RhiError::ShaderError(_)));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = compile_wgsl("fn broken( {", ShaderStage::Vertex, "vs_main").unwrap_err();
        assert!(matches!(err, RhiError::ShaderError(msg) if msg.starts_with("WGSL parse error")));
    }
}
