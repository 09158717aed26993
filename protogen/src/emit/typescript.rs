// TypeScript callers
//
// Arguments are encoded with the protobuf-ts codecs generated next to the
// caller. The call is simulated first to estimate gas and obtain the return
// value, then sent and awaited until final.

use crate::function::{ProtoFunction, ProtoType, Scalar};

use super::{header, screaming_snake};

pub(super) const RESERVED_PARAMETERS: &[&str] = &["client", "options", "address"];

fn ts_type(ty: &ProtoType) -> String {
    match ty {
        ProtoType::Scalar(scalar) => match scalar {
            Scalar::Double
            | Scalar::Float
            | Scalar::Int32
            | Scalar::Uint32
            | Scalar::Sint32
            | Scalar::Fixed32
            | Scalar::Sfixed32 => "number".to_string(),
            Scalar::Int64
            | Scalar::Uint64
            | Scalar::Sint64
            | Scalar::Fixed64
            | Scalar::Sfixed64 => "bigint".to_string(),
            Scalar::Bool => "boolean".to_string(),
            Scalar::String => "string".to_string(),
            Scalar::Bytes => "Uint8Array".to_string(),
        },
        ProtoType::Message(name) | ProtoType::Enum(name) => name.clone(),
        ProtoType::Repeated(inner) => format!("{}[]", ts_type(inner)),
    }
}

pub(super) fn caller(function: &ProtoFunction, address: Option<&str>) -> String {
    let name = &function.name;
    let args_message = function.args_message();
    let return_message = function.return_message();
    let module = function.source_stem();
    let address_const = format!("{}_ADDRESS", screaming_snake(name));

    let mut out = header(function);
    out.push_str("import { Client, EOperationStatus, fromMAS } from '@massalabs/massa-web3';\n");
    // protobuf-ts emits every message and enum of a file in one module
    let mut imports = vec![args_message.clone()];
    if function.returns.is_some() {
        imports.push(return_message.clone());
    }
    imports.extend(function.referenced_types().into_iter().map(str::to_string));
    out.push_str(&format!("import {{ {} }} from './{}';\n", imports.join(", "), module));
    out.push('\n');

    if let Some(address) = address {
        out.push_str(&format!("export const {} = '{}';\n\n", address_const, address));
    }

    out.push_str(
        "export interface CallOptions {\n  coins?: bigint;\n  fee?: bigint;\n  maxGas?: bigint;\n}\n\n",
    );

    let return_type = function.returns.as_ref().map(ts_type).unwrap_or_else(|| "void".to_string());
    out.push_str(&format!("/**\n * Calls `{}` on the contract at `address`.\n */\n", name));
    out.push_str(&format!("export async function {}(\n  client: Client,\n", name));
    for arg in &function.args {
        out.push_str(&format!("  {}: {},\n", arg.name, ts_type(&arg.ty)));
    }
    match address {
        Some(_) => {
            out.push_str("  options: CallOptions = {},\n");
            out.push_str(&format!("  address: string = {},\n", address_const));
        }
        None => {
            out.push_str("  address: string,\n");
            out.push_str("  options: CallOptions = {},\n");
        }
    }
    out.push_str(&format!("): Promise<{}> {{\n", return_type));

    let fields: Vec<String> = function.args.iter().map(|arg| format!("{0}: {0}", arg.name)).collect();
    out.push_str(&format!(
        "  const parameter = Array.from({0}.toBinary({0}.create({{ {1} }})));\n",
        args_message,
        fields.join(", ")
    ));
    out.push_str("  const fee = options.fee ?? fromMAS(0.01);\n\n");

    out.push_str("  // Simulate to estimate gas and read the return value\n");
    out.push_str("  const simulation = await client.smartContracts().readSmartContract({\n");
    out.push_str("    targetAddress: address,\n");
    out.push_str(&format!("    targetFunction: '{}',\n", name));
    out.push_str("    parameter,\n    maxGas: options.maxGas,\n    fee,\n  });\n");
    out.push_str("  const maxGas = options.maxGas ?? BigInt(simulation.info.gas_cost);\n\n");

    out.push_str("  const operationId = await client.smartContracts().callSmartContract({\n");
    out.push_str("    targetAddress: address,\n");
    out.push_str(&format!("    targetFunction: '{}',\n", name));
    out.push_str("    parameter,\n    coins: options.coins ?? 0n,\n    fee,\n    maxGas,\n  });\n");
    out.push_str("  const status = await client\n    .smartContracts()\n    .awaitRequiredOperationStatus(operationId, EOperationStatus.FINAL_SUCCESS);\n");
    out.push_str("  if (status !== EOperationStatus.FINAL_SUCCESS) {\n");
    out.push_str(&format!(
        "    throw new Error(`{} failed: operation ${{operationId}} ended with status ${{status}}`);\n",
        name
    ));
    out.push_str("  }\n");

    if function.returns.is_some() {
        out.push_str(&format!(
            "\n  return {}.fromBinary(simulation.returnValue).value;\n",
            return_message
        ));
    }
    out.push_str("}\n");
    out
}
