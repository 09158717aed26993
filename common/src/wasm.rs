use wasmparser::{ExternalKind, Parser, Payload, Validator, WasmFeatures};

use crate::WasmError;

const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Name of the export run by the node when a contract is created
pub const CONSTRUCTOR_EXPORT: &str = "constructor";

/// What a contract module exposes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WasmSummary {
    /// Size of the bytecode
    pub size: usize,
    /// Exported function names, in declaration order
    pub exported_functions: Vec<String>,
    /// Imported functions as `module.name`
    pub imported_functions: Vec<String>,
}

impl WasmSummary {
    pub fn has_constructor(&self) -> bool {
        self.exported_functions.iter().any(|name| name == CONSTRUCTOR_EXPORT)
    }

    pub fn exports(&self, name: &str) -> bool {
        self.exported_functions.iter().any(|export| export == name)
    }
}

/// Validate a WASM binary and collect its function exports and imports
pub fn inspect_wasm(bytecode: &[u8]) -> Result<WasmSummary, WasmError> {
    if !bytecode.starts_with(&WASM_MAGIC) {
        return Err(WasmError::BadMagic);
    }

    let mut validator = Validator::new_with_features(WasmFeatures::default());
    validator.validate_all(bytecode)?;

    let mut summary = WasmSummary {
        size: bytecode.len(),
        ..Default::default()
    };

    for payload in Parser::new(0).parse_all(bytecode) {
        match payload? {
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import?;
                    if let wasmparser::TypeRef::Func(_) = import.ty {
                        summary
                            .imported_functions
                            .push(format!("{}.{}", import.module, import.name));
                    }
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export?;
                    if export.kind == ExternalKind::Func {
                        summary.exported_functions.push(export.name.to_string());
                    }
                }
            }
            _ => {} // Ignore other sections
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wat::parse_str;

    #[test]
    fn test_inspect_contract() {
        let wasm = parse_str(
            r#"
            (module
                (import "massa" "assembly_script_generate_event" (func $event (param i32)))
                (memory (export "memory") 1)
                (func (export "constructor") (param i32) (result i32)
                    i32.const 0
                )
                (func (export "transfer") (param i32) (result i32)
                    i32.const 0
                )
            )"#,
        )
        .expect("Failed to parse WAT");

        let summary = inspect_wasm(&wasm).expect("Inspection failed");

        assert_eq!(summary.size, wasm.len());
        assert_eq!(summary.exported_functions, vec!["constructor", "transfer"]);
        assert_eq!(
            summary.imported_functions,
            vec!["massa.assembly_script_generate_event"]
        );
        assert!(summary.has_constructor());
        assert!(!summary.exports("memory"));
    }

    #[test]
    fn test_reject_non_wasm() {
        assert!(matches!(inspect_wasm(b"not wasm"), Err(WasmError::BadMagic)));
    }

    #[test]
    fn test_reject_truncated_module() {
        let wasm = parse_str("(module (func (export \"main\")))").expect("Failed to parse WAT");
        let truncated = &wasm[..wasm.len() - 2];
        assert!(matches!(inspect_wasm(truncated), Err(WasmError::Invalid(_))));
    }
}
