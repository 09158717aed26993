use std::collections::{BTreeSet, HashSet};
use std::fmt;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorSet};

use crate::ProtoError;

const ARGS_SUFFIX: &str = "Helper";
const RETURN_SUFFIX: &str = "RHelper";
const RETURN_FIELD: &str = "value";

/// Scalar protobuf types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtoType {
    Scalar(Scalar),
    /// Message type, by its unqualified name
    Message(String),
    /// Enum type, by its unqualified name
    Enum(String),
    Repeated(Box<ProtoType>),
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoType::Scalar(scalar) => write!(f, "{}", format!("{:?}", scalar).to_lowercase()),
            ProtoType::Message(name) | ProtoType::Enum(name) => write!(f, "{}", name),
            ProtoType::Repeated(inner) => write!(f, "repeated {}", inner),
        }
    }
}

impl ProtoType {
    /// Message or enum name, looking through `repeated`
    pub fn named_type(&self) -> Option<&str> {
        match self {
            ProtoType::Scalar(_) => None,
            ProtoType::Message(name) | ProtoType::Enum(name) => Some(name),
            ProtoType::Repeated(inner) => inner.named_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoField {
    pub name: String,
    pub ty: ProtoType,
}

/// A contract function described by a `.proto` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFunction {
    pub name: String,
    pub args: Vec<ProtoField>,
    /// `None` for functions returning nothing
    pub returns: Option<ProtoType>,
    /// File the function was read from, as named in the descriptor set
    pub source: String,
}

impl ProtoFunction {
    pub fn args_message(&self) -> String {
        format!("{}{}", self.name, ARGS_SUFFIX)
    }

    pub fn return_message(&self) -> String {
        format!("{}{}", self.name, RETURN_SUFFIX)
    }

    /// Message and enum types a caller has to import, sorted
    pub fn referenced_types(&self) -> BTreeSet<&str> {
        self.args
            .iter()
            .map(|arg| &arg.ty)
            .chain(self.returns.as_ref())
            .filter_map(ProtoType::named_type)
            .collect()
    }

    /// Module name of the generated codecs (the file stem)
    pub fn source_stem(&self) -> &str {
        let file = self.source.rsplit('/').next().unwrap_or(&self.source);
        file.strip_suffix(".proto").unwrap_or(file)
    }
}

/// Extract every function described in `set`
pub fn functions_from_descriptors(set: &FileDescriptorSet) -> Result<Vec<ProtoFunction>, ProtoError> {
    let mut functions = Vec::new();
    let mut seen = HashSet::new();

    for file in &set.file {
        for message in &file.message_type {
            let name = message.name();
            let Some(function_name) = name.strip_suffix(ARGS_SUFFIX) else {
                continue;
            };
            // `fooRHelper` also ends with `Helper`
            if let Some(base) = name.strip_suffix(RETURN_SUFFIX) {
                if has_message(&file.message_type, &format!("{}{}", base, ARGS_SUFFIX)) {
                    continue;
                }
            }
            validate_identifier(function_name)?;

            let args = message
                .field
                .iter()
                .map(|field| -> Result<ProtoField, ProtoError> {
                    validate_identifier(field.name())?;
                    Ok(ProtoField {
                        name: field.name().to_string(),
                        ty: field_type(name, field)?,
                    })
                })
                .collect::<Result<Vec<_>, ProtoError>>()?;

            let return_name = format!("{}{}", function_name, RETURN_SUFFIX);
            let returns = match file.message_type.iter().find(|m| m.name() == return_name) {
                Some(message) => return_type(message)?,
                None => None,
            };

            if !seen.insert(function_name.to_string()) {
                return Err(ProtoError::DuplicateFunction(function_name.to_string()));
            }
            functions.push(ProtoFunction {
                name: function_name.to_string(),
                args,
                returns,
                source: file.name().to_string(),
            });
        }
    }

    if functions.is_empty() {
        let names: Vec<&str> = set.file.iter().map(|file| file.name()).collect();
        return Err(ProtoError::NoFunction(names.join(", ")));
    }
    Ok(functions)
}

fn has_message(messages: &[DescriptorProto], name: &str) -> bool {
    messages.iter().any(|message| message.name() == name)
}

fn return_type(message: &DescriptorProto) -> Result<Option<ProtoType>, ProtoError> {
    match message.field.as_slice() {
        [] => Ok(None),
        [field] if field.name() == RETURN_FIELD => Ok(Some(field_type(message.name(), field)?)),
        _ => Err(ProtoError::InvalidReturn(message.name().to_string())),
    }
}

fn field_type(message: &str, field: &FieldDescriptorProto) -> Result<ProtoType, ProtoError> {
    let unsupported = |kind: &str| ProtoError::UnsupportedType {
        message: message.to_string(),
        field: field.name().to_string(),
        kind: kind.to_string(),
    };

    let ty = match field.r#type() {
        Type::Double => ProtoType::Scalar(Scalar::Double),
        Type::Float => ProtoType::Scalar(Scalar::Float),
        Type::Int32 => ProtoType::Scalar(Scalar::Int32),
        Type::Int64 => ProtoType::Scalar(Scalar::Int64),
        Type::Uint32 => ProtoType::Scalar(Scalar::Uint32),
        Type::Uint64 => ProtoType::Scalar(Scalar::Uint64),
        Type::Sint32 => ProtoType::Scalar(Scalar::Sint32),
        Type::Sint64 => ProtoType::Scalar(Scalar::Sint64),
        Type::Fixed32 => ProtoType::Scalar(Scalar::Fixed32),
        Type::Fixed64 => ProtoType::Scalar(Scalar::Fixed64),
        Type::Sfixed32 => ProtoType::Scalar(Scalar::Sfixed32),
        Type::Sfixed64 => ProtoType::Scalar(Scalar::Sfixed64),
        Type::Bool => ProtoType::Scalar(Scalar::Bool),
        Type::String => ProtoType::Scalar(Scalar::String),
        Type::Bytes => ProtoType::Scalar(Scalar::Bytes),
        Type::Message => ProtoType::Message(short_type_name(field.type_name()).to_string()),
        Type::Enum => ProtoType::Enum(short_type_name(field.type_name()).to_string()),
        Type::Group => return Err(unsupported("group")),
    };

    if field.label() == Label::Repeated {
        // Map fields are repeated entry messages generated by protoc
        if field.type_name().ends_with("Entry") && matches!(ty, ProtoType::Message(_)) {
            return Err(unsupported("map"));
        }
        return Ok(ProtoType::Repeated(Box::new(ty)));
    }
    Ok(ty)
}

/// `.package.Outer.Inner` -> `Inner`
fn short_type_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Names must be usable as-is in TypeScript and AssemblyScript
pub fn validate_identifier(name: &str) -> Result<(), ProtoError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if !valid_start || !valid_rest || RESERVED_WORDS.contains(&name) {
        return Err(ProtoError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}
