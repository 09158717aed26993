// AssemblyScript compiler wrapper
//
// Finds contract entry points, orders them by embedded bytecode and runs
// `asc` once per entry. Every output is checked to be a valid module.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use common::{inspect_wasm, WasmError, WasmSummary};
use log::{debug, info, warn};
use thiserror::Error;
use walkdir::WalkDir;

pub mod deps;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Contracts directory {0} not found")]
    ContractsDirNotFound(PathBuf),
    #[error("No contract sources in {0}")]
    NoEntries(PathBuf),
    #[error("Contracts {first} and {second} would both produce {name}.wasm")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Contracts embed each other: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("Compiler {0:?} not found")]
    CompilerNotFound(String),
    #[error("Compiling {source_file} failed with {status}")]
    Failed { source_file: PathBuf, status: String },
    #[error("Compiler did not produce {0}")]
    MissingOutput(PathBuf),
    #[error("Invalid bytecode in {path}: {source}")]
    InvalidOutput {
        path: PathBuf,
        #[source]
        source: WasmError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk contracts: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// `asc --target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    Release,
    Debug,
}

impl BuildTarget {
    fn as_str(&self) -> &'static str {
        match self {
            BuildTarget::Release => "release",
            BuildTarget::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub project_root: PathBuf,
    /// Relative to the project root
    pub contracts_dir: PathBuf,
    /// Relative to the project root
    pub out_dir: PathBuf,
    pub program: String,
    /// Arguments placed before the entry file, `asc` for `npx asc`
    pub program_args: Vec<String>,
    pub target: BuildTarget,
    pub transform: Option<String>,
    pub extra_args: Vec<String>,
    pub validate: bool,
}

impl CompilerConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            contracts_dir: PathBuf::from("assembly/contracts"),
            out_dir: PathBuf::from("build"),
            program: "npx".to_string(),
            program_args: vec!["asc".to_string()],
            target: BuildTarget::Release,
            transform: Some("@massalabs/as-transformer".to_string()),
            extra_args: Vec::new(),
            validate: true,
        }
    }
}

/// One contract to compile. Paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub source: PathBuf,
    pub name: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub entry: Entry,
    pub summary: Option<WasmSummary>,
}

pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Contract sources, sorted by path
    pub fn collect_entries(&self) -> Result<Vec<Entry>, CompileError> {
        let root = &self.config.project_root;
        let contracts_dir = root.join(&self.config.contracts_dir);
        if !contracts_dir.is_dir() {
            return Err(CompileError::ContractsDirNotFound(contracts_dir));
        }

        let walker = WalkDir::new(&contracts_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == "__tests__"));

        let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut entries = Vec::new();
        for dir_entry in walker {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let file_name = dir_entry.file_name().to_string_lossy();
            if !file_name.ends_with(".ts") || file_name.ends_with(".spec.ts") || file_name.ends_with(".d.ts") {
                continue;
            }

            let source = dir_entry
                .path()
                .strip_prefix(root)
                .unwrap_or_else(|_| dir_entry.path())
                .to_path_buf();
            let name = file_name.trim_end_matches(".ts").to_string();

            if let Some(first) = by_name.get(&name) {
                return Err(CompileError::DuplicateName {
                    name,
                    first: first.clone(),
                    second: source,
                });
            }
            by_name.insert(name.clone(), source.clone());

            entries.push(Entry {
                output: self.config.out_dir.join(format!("{}.wasm", name)),
                source,
                name,
            });
        }

        if entries.is_empty() {
            return Err(CompileError::NoEntries(contracts_dir));
        }
        Ok(entries)
    }

    /// Entries in build order
    pub fn plan(&self) -> Result<Vec<Entry>, CompileError> {
        let entries = self.collect_entries()?;
        let sources = entries
            .iter()
            .map(|entry| fs::read_to_string(self.config.project_root.join(&entry.source)))
            .collect::<Result<Vec<_>, _>>()?;
        deps::build_order(entries, &sources)
    }

    /// Arguments passed to the compiler program for `entry`
    pub fn command_args(&self, entry: &Entry) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.program_args.iter().map(OsString::from).collect();
        args.push(entry.source.clone().into_os_string());
        args.push("--target".into());
        args.push(self.config.target.as_str().into());
        args.push("--exportRuntime".into());
        if let Some(transform) = &self.config.transform {
            args.push("--transform".into());
            args.push(transform.into());
        }
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args.push("-o".into());
        args.push(entry.output.clone().into_os_string());
        args
    }

    pub fn command(&self, entry: &Entry) -> Command {
        let mut command = Command::new(&self.config.program);
        command.args(self.command_args(entry)).current_dir(&self.config.project_root);
        command
    }

    /// Compile every entry in build order
    pub fn compile_all(&self) -> Result<Vec<CompiledContract>, CompileError> {
        let plan = self.plan()?;
        fs::create_dir_all(self.config.project_root.join(&self.config.out_dir))?;

        let mut compiled = Vec::with_capacity(plan.len());
        for entry in plan {
            info!("Compiling {}", entry.source.display());
            let status = self.command(&entry).status().map_err(|e| match e.kind() {
                ErrorKind::NotFound => CompileError::CompilerNotFound(self.config.program.clone()),
                _ => CompileError::Io(e),
            })?;
            if !status.success() {
                return Err(CompileError::Failed {
                    source_file: entry.source,
                    status: status.to_string(),
                });
            }

            let summary = if self.config.validate {
                Some(self.validate_output(&entry)?)
            } else {
                None
            };
            compiled.push(CompiledContract { entry, summary });
        }
        Ok(compiled)
    }

    fn validate_output(&self, entry: &Entry) -> Result<WasmSummary, CompileError> {
        let path = self.config.project_root.join(&entry.output);
        let bytecode = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CompileError::MissingOutput(path)),
            Err(e) => return Err(e.into()),
        };

        let summary = inspect_wasm(&bytecode).map_err(|source| CompileError::InvalidOutput {
            path: path.clone(),
            source,
        })?;
        debug!(
            "{}: {} bytes, {} exports",
            entry.output.display(),
            summary.size,
            summary.exported_functions.len()
        );
        if summary.exported_functions.is_empty() {
            warn!("{} exports no functions", entry.output.display());
        }
        Ok(summary)
    }
}

/// Compile the project at `project_root` with the default settings
pub fn compile_project(project_root: &Path) -> Result<Vec<CompiledContract>, CompileError> {
    Compiler::new(CompilerConfig::new(project_root)).compile_all()
}
