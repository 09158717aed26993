// Built-in project template
//
// Embedded so the binary can scaffold a project without a template checkout.

/// `(relative path, contents)` of every file in the default template
pub const BUILTIN_FILES: &[(&str, &str)] = &[
    (
        "package.json",
        include_str!("../../templates/assemblyscript/package.json"),
    ),
    (
        "gitignore",
        include_str!("../../templates/assemblyscript/gitignore"),
    ),
    (
        ".env.example",
        include_str!("../../templates/assemblyscript/.env.example"),
    ),
    (
        "deploy.json",
        include_str!("../../templates/assemblyscript/deploy.json"),
    ),
    (
        "README.md",
        include_str!("../../templates/assemblyscript/README.md"),
    ),
    (
        "assembly/contracts/main.ts",
        include_str!("../../templates/assemblyscript/assembly/contracts/main.ts"),
    ),
    (
        "assembly/__tests__/massa-example.spec.ts",
        include_str!("../../templates/assemblyscript/assembly/__tests__/massa-example.spec.ts"),
    ),
];
