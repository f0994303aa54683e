// Shader module loading
//
// Vulkan uses SPIR-V bytecode for shaders. The compiled files are read from
// disk at startup (build.rs produces them) and repacked into aligned words
// before a module is created from them.

use super::driver::{Driver, GpuObject};
use crate::context::Ledger;
use crate::error::{check, ObjectKind, Op, RenderError, Result};
use ash::vk;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// A SPIR-V blob read from disk
#[derive(Debug, Clone)]
pub struct ShaderBytecode {
    pub path: PathBuf,
    pub words: Vec<u32>,
}

impl ShaderBytecode {
    /// Repack raw bytes into SPIR-V words. `read_spv` handles alignment and
    /// byte order; the magic number check catches files that are not SPIR-V
    /// at all.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self> {
        let path = path.into();
        let words = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| {
            RenderError::InvalidShader {
                path: path.clone(),
                source,
            }
        })?;

        if words.first() != Some(&SPIRV_MAGIC) {
            return Err(RenderError::InvalidShader {
                path,
                source: io::Error::new(io::ErrorKind::InvalidData, "missing SPIR-V magic number"),
            });
        }

        Ok(Self { path, words })
    }

    pub fn size_in_bytes(&self) -> usize {
        self.words.len() * 4
    }
}

pub fn load_shader_bytecode<P: AsRef<Path>>(path: P) -> Result<ShaderBytecode> {
    let path = path.as_ref();
    let result = std::fs::read(path)
        .map_err(|source| RenderError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|bytes| ShaderBytecode::from_bytes(path, &bytes));

    match &result {
        Ok(code) => log::info!("Loaded shader {:?} ({} bytes)", path, code.size_in_bytes()),
        Err(e) => log::error!("{}", e),
    }
    result
}

pub fn create_shader_module<D: Driver>(
    driver: &mut D,
    ledger: &mut Ledger,
    code: &ShaderBytecode,
) -> Result<vk::ShaderModule> {
    let module = check(
        driver.create_shader_module(&code.words),
        Op::Create(ObjectKind::ShaderModule),
    )?;
    ledger.record(GpuObject::ShaderModule(module));
    Ok(module)
}
