// AssemblyScript callers, for contracts calling other contracts.
// Codecs come from as-proto: one module per message exporting the class and
// its `encode<Message>` / `decode<Message>` functions.

use crate::function::{ProtoFunction, ProtoType, Scalar};

use super::{header, screaming_snake};

pub(super) const RESERVED_PARAMETERS: &[&str] = &["at", "coins"];

fn as_type(ty: &ProtoType) -> String {
    match ty {
        ProtoType::Scalar(scalar) => match scalar {
            Scalar::Double => "f64",
            Scalar::Float => "f32",
            Scalar::Int32 | Scalar::Sint32 | Scalar::Sfixed32 => "i32",
            Scalar::Uint32 | Scalar::Fixed32 => "u32",
            Scalar::Int64 | Scalar::Sint64 | Scalar::Sfixed64 => "i64",
            Scalar::Uint64 | Scalar::Fixed64 => "u64",
            Scalar::Bool => "bool",
            Scalar::String => "string",
            Scalar::Bytes => "Uint8Array",
        }
        .to_string(),
        ProtoType::Message(name) | ProtoType::Enum(name) => name.clone(),
        ProtoType::Repeated(inner) => format!("Array<{}>", as_type(inner)),
    }
}

pub(super) fn caller(function: &ProtoFunction, address: Option<&str>) -> String {
    let name = &function.name;
    let args_message = function.args_message();
    let return_message = function.return_message();

    let mut out = header(function);
    out.push_str("import { Address, call } from '@massalabs/massa-as-sdk';\n");
    out.push_str("import { Args } from '@massalabs/as-types';\n");
    out.push_str(&format!(
        "import {{ {0}, encode{0} }} from './{0}';\n",
        args_message
    ));
    if function.returns.is_some() {
        out.push_str(&format!("import {{ decode{0} }} from './{0}';\n", return_message));
    }
    for name in function.referenced_types() {
        out.push_str(&format!("import {{ {0} }} from './{0}';\n", name));
    }
    out.push('\n');

    if let Some(address) = address {
        out.push_str(&format!(
            "export const {}_ADDRESS = '{}';\n\n",
            screaming_snake(name),
            address
        ));
    }

    let mut params = vec!["at: Address".to_string()];
    params.extend(function.args.iter().map(|arg| format!("{}: {}", arg.name, as_type(&arg.ty))));
    params.push("coins: u64 = 0".to_string());
    let return_type = function.returns.as_ref().map(as_type).unwrap_or_else(|| "void".to_string());

    out.push_str(&format!(
        "export function {}({}): {} {{\n",
        name,
        params.join(", "),
        return_type
    ));
    let fields: Vec<&str> = function.args.iter().map(|arg| arg.name.as_str()).collect();
    out.push_str(&format!(
        "  const encoded = encode{}(new {}({}));\n",
        args_message,
        args_message,
        fields.join(", ")
    ));

    let call = format!(
        "call(at, '{}', new Args(changetype<StaticArray<u8>>(encoded.buffer)), coins)",
        name
    );
    if function.returns.is_some() {
        out.push_str(&format!("  const result = {};\n", call));
        out.push_str(&format!(
            "  return decode{}(Uint8Array.wrap(changetype<ArrayBuffer>(result))).value;\n",
            return_message
        ));
    } else {
        out.push_str(&format!("  {};\n", call));
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ProtoField;

    #[test]
    fn test_contract_caller() {
        let function = ProtoFunction {
            name: "balanceOf".into(),
            args: vec![ProtoField {
                name: "owner".into(),
                ty: ProtoType::Scalar(Scalar::String),
            }],
            returns: Some(ProtoType::Scalar(Scalar::Uint64)),
            source: "balanceOf.proto".into(),
        };

        let code = caller(&function, Some("AS1token"));

        assert!(code.contains("export const BALANCE_OF_ADDRESS = 'AS1token';"));
        assert!(code.contains("export function balanceOf(at: Address, owner: string, coins: u64 = 0): u64 {"));
        assert!(code.contains("const encoded = encodebalanceOfHelper(new balanceOfHelper(owner));"));
        assert!(code.contains("return decodebalanceOfRHelper("));
    }

    #[test]
    fn test_imports_message_and_enum_types() {
        let function = ProtoFunction {
            name: "setOwner".into(),
            args: vec![ProtoField {
                name: "owner".into(),
                ty: ProtoType::Message("Account".into()),
            }],
            returns: Some(ProtoType::Enum("Status".into())),
            source: "setOwner.proto".into(),
        };

        let code = caller(&function, None);

        assert!(code.contains("import { Account } from './Account';\n"));
        assert!(code.contains("import { Status } from './Status';\n"));
        assert!(code.contains("(at: Address, owner: Account, coins: u64 = 0): Status {"));
    }

    #[test]
    fn test_void_caller_types() {
        let function = ProtoFunction {
            name: "setRates".into(),
            args: vec![ProtoField {
                name: "rates".into(),
                ty: ProtoType::Repeated(Box::new(ProtoType::Scalar(Scalar::Float))),
            }],
            returns: None,
            source: "setRates.proto".into(),
        };

        let code = caller(&function, None);

        assert!(code.contains("(at: Address, rates: Array<f32>, coins: u64 = 0): void {"));
        assert!(code.contains("  call(at, 'setRates', "));
        assert!(!code.contains("decode"));
    }
}
