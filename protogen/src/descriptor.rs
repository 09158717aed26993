// protoc invocation
//
// .proto files are never parsed here: protoc compiles them into a descriptor
// set, which is decoded with prost-types.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info};
use prost::Message;
use prost_types::FileDescriptorSet;

use crate::emit::Target;
use crate::ProtoError;

/// Wrapper around the `protoc` binary
#[derive(Debug, Clone)]
pub struct Protoc {
    program: PathBuf,
    include_dirs: Vec<PathBuf>,
}

impl Default for Protoc {
    fn default() -> Self {
        Self::new("protoc")
    }
}

impl Protoc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            include_dirs: Vec::new(),
        }
    }

    /// Extra `--proto_path` directory, searched before the files' own directories
    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Compile `files` into a descriptor set including their imports
    pub fn descriptor_set(&self, files: &[PathBuf]) -> Result<FileDescriptorSet, ProtoError> {
        let out_dir = tempfile::tempdir()?;
        let out_file = out_dir.path().join("descriptors.pb");

        let mut command = self.command(files);
        command
            .arg("--include_imports")
            .arg(format!("--descriptor_set_out={}", out_file.display()))
            .args(files);
        self.run(command)?;

        let bytes = fs::read(&out_file)?;
        decode_descriptor_set(&bytes)
    }

    /// Generate message codecs for `target` through its protoc plugin
    pub fn generate_helpers(
        &self,
        target: Target,
        plugin: &Path,
        files: &[PathBuf],
        out_dir: &Path,
    ) -> Result<(), ProtoError> {
        fs::create_dir_all(out_dir)?;
        let (plugin_name, out_flag) = target.protoc_plugin();

        let mut command = self.command(files);
        command
            .arg(format!("--plugin={}={}", plugin_name, plugin.display()))
            .arg(format!("{}={}", out_flag, out_dir.display()))
            .args(files);
        self.run(command)?;

        info!("Generated {} message helpers in {}", target, out_dir.display());
        Ok(())
    }

    fn command(&self, files: &[PathBuf]) -> Command {
        let mut command = Command::new(&self.program);
        for dir in &self.include_dirs {
            command.arg(format!("--proto_path={}", dir.display()));
        }
        let mut own_dirs: Vec<&Path> = files
            .iter()
            .map(|file| file.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")))
            .collect();
        own_dirs.dedup();
        for dir in own_dirs {
            command.arg(format!("--proto_path={}", dir.display()));
        }
        command
    }

    fn run(&self, mut command: Command) -> Result<Output, ProtoError> {
        debug!("Running {:?}", command);
        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProtoError::ProtocNotFound(self.program.clone()),
            _ => ProtoError::Io(e),
        })?;

        if !output.status.success() {
            return Err(ProtoError::Protoc {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

pub fn decode_descriptor_set(bytes: &[u8]) -> Result<FileDescriptorSet, ProtoError> {
    Ok(FileDescriptorSet::decode(bytes)?)
}
