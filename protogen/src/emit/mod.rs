use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;

use crate::function::ProtoFunction;
use crate::ProtoError;

mod assemblyscript;
mod typescript;

/// Language of the generated callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Off-chain callers built on the web3 client
    TypeScript,
    /// Contract-to-contract callers built on the contract SDK
    AssemblyScript,
}

impl Target {
    /// Plugin name and output flag understood by protoc
    pub fn protoc_plugin(&self) -> (&'static str, &'static str) {
        match self {
            Target::TypeScript => ("protoc-gen-ts", "--ts_out"),
            Target::AssemblyScript => ("protoc-gen-as", "--as_out"),
        }
    }

    /// Parameter names the generated function declares itself
    fn reserved_parameters(&self) -> &'static [&'static str] {
        match self {
            Target::TypeScript => typescript::RESERVED_PARAMETERS,
            Target::AssemblyScript => assemblyscript::RESERVED_PARAMETERS,
        }
    }
}

impl FromStr for Target {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ts" | "typescript" => Ok(Target::TypeScript),
            "as" | "assemblyscript" => Ok(Target::AssemblyScript),
            _ => Err(ProtoError::UnknownTarget(s.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::TypeScript => write!(f, "TypeScript"),
            Target::AssemblyScript => write!(f, "AssemblyScript"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub file_name: String,
    pub contents: String,
}

/// Emits one caller file per contract function
#[derive(Debug, Clone)]
pub struct CallerGenerator {
    target: Target,
    contract_address: Option<String>,
}

impl CallerGenerator {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            contract_address: None,
        }
    }

    /// Default the callers to a deployed contract
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn generate(&self, function: &ProtoFunction) -> Result<GeneratedFile, ProtoError> {
        let reserved = self.target.reserved_parameters();
        if let Some(arg) = function.args.iter().find(|arg| reserved.contains(&arg.name.as_str())) {
            return Err(ProtoError::ReservedName {
                function: function.name.clone(),
                field: arg.name.clone(),
            });
        }

        let address = self.contract_address.as_deref();
        let contents = match self.target {
            Target::TypeScript => typescript::caller(function, address),
            Target::AssemblyScript => assemblyscript::caller(function, address),
        };

        Ok(GeneratedFile {
            file_name: format!("{}Caller.ts", function.name),
            contents,
        })
    }

    /// Generate every caller and write them to `out_dir`
    pub fn write_all(&self, functions: &[ProtoFunction], out_dir: &Path) -> Result<Vec<PathBuf>, ProtoError> {
        // Generate everything first so a bad function leaves no partial output
        let files = functions
            .iter()
            .map(|function| self.generate(function))
            .collect::<Result<Vec<_>, _>>()?;

        fs::create_dir_all(out_dir)?;
        let mut written = Vec::with_capacity(files.len());
        for file in files {
            let path = out_dir.join(&file.file_name);
            fs::write(&path, file.contents)?;
            info!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn header(function: &ProtoFunction) -> String {
    format!(
        "// Generated by sc-toolkit from {}. Do not edit.\n\n",
        function.source
    )
}

/// `sayHello` -> `SAY_HELLO`
fn screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut previous_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            out.push('_');
        }
        previous_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_uppercase());
    }
    out
}
