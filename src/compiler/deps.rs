// Build order between contracts
//
// A contract that embeds another contract's bytecode with
// `fileToByteArray('build/<name>.wasm')` must be compiled after it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;

use super::{CompileError, Entry};

/// Names of the `.wasm` outputs referenced by `source`
pub fn embedded_outputs(source: &str) -> Result<BTreeSet<String>, CompileError> {
    let pattern = Regex::new(r#"fileToByteArray\(\s*['"]([^'"]+)['"]\s*\)"#)?;
    Ok(pattern
        .captures_iter(source)
        .filter_map(|caps| {
            let path = Path::new(caps.get(1)?.as_str());
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("wasm") => path.file_stem()?.to_str().map(str::to_string),
                _ => None,
            }
        })
        .collect())
}

/// Order entries so every embedded output is built before its embedder.
///
/// References to outputs no entry produces are left to the compiler. Among
/// independent entries the input order is kept.
pub fn build_order(entries: Vec<Entry>, sources: &[String]) -> Result<Vec<Entry>, CompileError> {
    let index: BTreeMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name.as_str(), i))
        .collect();

    let mut requires = Vec::with_capacity(entries.len());
    for source in sources {
        let deps: BTreeSet<usize> = embedded_outputs(source)?
            .iter()
            .filter_map(|name| index.get(name.as_str()).copied())
            .collect();
        requires.push(deps);
    }

    let mut state = vec![Visit::New; entries.len()];
    let mut order = Vec::with_capacity(entries.len());
    for i in 0..entries.len() {
        visit(i, &requires, &mut state, &mut order, &entries, &mut Vec::new())?;
    }

    let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

fn visit(
    i: usize,
    requires: &[BTreeSet<usize>],
    state: &mut [Visit],
    order: &mut Vec<usize>,
    entries: &[Entry],
    path: &mut Vec<usize>,
) -> Result<(), CompileError> {
    match state[i] {
        Visit::Done => return Ok(()),
        Visit::Active => {
            let start = path.iter().position(|&p| p == i).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|&p| entries[p].name.clone()).collect();
            cycle.push(entries[i].name.clone());
            return Err(CompileError::DependencyCycle(cycle));
        }
        Visit::New => {}
    }

    state[i] = Visit::Active;
    path.push(i);
    for &dep in &requires[i] {
        visit(dep, requires, state, order, entries, path)?;
    }
    path.pop();
    state[i] = Visit::Done;
    order.push(i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(name: &str) -> Entry {
        Entry {
            source: PathBuf::from(format!("assembly/contracts/{}.ts", name)),
            name: name.to_string(),
            output: PathBuf::from(format!("build/{}.wasm", name)),
        }
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_embedded_outputs() {
        let source = r#"
            const token = fileToByteArray('build/token.wasm');
            const vault = fileToByteArray( "build/nested/vault.wasm" );
            const data = fileToByteArray('assets/logo.png');
        "#;
        let found = embedded_outputs(source).unwrap();
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["token", "vault"]);
    }

    #[test]
    fn test_embedded_contract_builds_first() {
        let entries = vec![entry("factory"), entry("main"), entry("token")];
        let sources = vec![
            "fileToByteArray('build/token.wasm')".to_string(),
            "fileToByteArray('build/factory.wasm')".to_string(),
            String::new(),
        ];

        let ordered = build_order(entries, &sources).unwrap();
        assert_eq!(names(&ordered), vec!["token", "factory", "main"]);
    }

    #[test]
    fn test_independent_entries_keep_order() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        let sources = vec![
            String::new(),
            "fileToByteArray('build/external.wasm')".to_string(),
            String::new(),
        ];

        let ordered = build_order(entries, &sources).unwrap();
        assert_eq!(names(&ordered), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle() {
        let entries = vec![entry("a"), entry("b")];
        let sources = vec![
            "fileToByteArray('build/b.wasm')".to_string(),
            "fileToByteArray('build/a.wasm')".to_string(),
        ];

        match build_order(entries, &sources) {
            Err(CompileError::DependencyCycle(cycle)) => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other.map(|e| names(&e).join(","))),
        }
    }
}
