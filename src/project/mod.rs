// Project initializer
//
// Copies a template into a new directory, names the package and installs
// its dependencies with the chosen package manager.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use serde_json::Value;
use thiserror::Error;
use walkdir::WalkDir;

mod template;

pub use template::BUILTIN_FILES;

/// Directories never copied from a template directory
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "build"];
const MAX_PACKAGE_NAME_LEN: usize = 214;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Invalid package name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("Directory {0} already exists and is not empty")]
    DirectoryNotEmpty(PathBuf),
    #[error("Template directory {0} not found")]
    TemplateNotFound(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to walk template: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid package.json: {0}")]
    PackageJson(#[from] serde_json::Error),
    #[error("Package manager {0:?} not found")]
    PackageManagerNotFound(String),
    #[error("`{command} install` failed with {status}")]
    InstallFailed { command: String, status: String },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProjectError + '_ {
    move |source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the project files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// Template embedded in the binary
    Builtin,
    /// Copy of a template directory
    Directory(PathBuf),
}

/// What `init` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub root: PathBuf,
    pub files: usize,
    pub installed: bool,
}

/// Scaffolds new contract projects
pub struct ProjectInitializer {
    template: Template,
    package_manager: String,
    install: bool,
}

impl ProjectInitializer {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            package_manager: "npm".to_string(),
            install: true,
        }
    }

    pub fn package_manager(mut self, command: impl Into<String>) -> Self {
        self.package_manager = command.into();
        self
    }

    pub fn skip_install(mut self, skip: bool) -> Self {
        self.install = !skip;
        self
    }

    /// Create project `name` inside `parent`
    pub fn init(&self, parent: &Path, name: &str) -> Result<InitReport, ProjectError> {
        validate_package_name(name)?;
        // Scoped packages live in a directory named after the bare name
        let dir_name = name.rsplit('/').next().unwrap_or(name);
        let root = parent.join(dir_name);

        if root.exists() && fs::read_dir(&root).map_err(io_error(&root))?.next().is_some() {
            return Err(ProjectError::DirectoryNotEmpty(root));
        }
        fs::create_dir_all(&root).map_err(io_error(&root))?;

        let files = match &self.template {
            Template::Builtin => copy_builtin(&root)?,
            Template::Directory(dir) => copy_directory(dir, &root)?,
        };
        info!("Copied {} template files to {}", files, root.display());

        restore_gitignore(&root)?;
        rename_package(&root, name)?;
        seed_env(&root)?;

        if self.install {
            self.install_dependencies(&root)?;
        }

        Ok(InitReport {
            root,
            files,
            installed: self.install,
        })
    }

    fn install_dependencies(&self, root: &Path) -> Result<(), ProjectError> {
        info!("Running `{} install` in {}", self.package_manager, root.display());
        let status = Command::new(&self.package_manager)
            .arg("install")
            .current_dir(root)
            .status()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ProjectError::PackageManagerNotFound(self.package_manager.clone()),
                _ => ProjectError::Io {
                    path: root.to_path_buf(),
                    source: e,
                },
            })?;

        if !status.success() {
            return Err(ProjectError::InstallFailed {
                command: self.package_manager.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// npm package naming rules
pub fn validate_package_name(name: &str) -> Result<(), ProjectError> {
    let invalid = |reason| ProjectError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_PACKAGE_NAME_LEN {
        return Err(invalid("longer than 214 characters"));
    }
    if name.trim() != name {
        return Err(invalid("leading or trailing spaces"));
    }

    let bare = match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, bare)) if !scope.is_empty() && !bare.is_empty() && !bare.contains('/') => bare,
            _ => return Err(invalid("scoped names must look like @scope/name")),
        },
        None => name,
    };
    if bare.starts_with('.') || bare.starts_with('_') {
        return Err(invalid("cannot start with a period or underscore"));
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("must be lowercase"));
    }
    let url_safe = |c: char| c.is_ascii_alphanumeric() || "-._~".contains(c);
    if !bare.chars().all(url_safe) {
        return Err(invalid("contains characters not allowed in a URL"));
    }
    if bare == "node_modules" || bare == "favicon.ico" {
        return Err(invalid("reserved name"));
    }
    Ok(())
}

fn copy_builtin(root: &Path) -> Result<usize, ProjectError> {
    for (relative, contents) in BUILTIN_FILES {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(&path, contents).map_err(io_error(&path))?;
    }
    Ok(BUILTIN_FILES.len())
}

fn copy_directory(template: &Path, root: &Path) -> Result<usize, ProjectError> {
    if !template.is_dir() {
        return Err(ProjectError::TemplateNotFound(template.to_path_buf()));
    }

    let mut copied = 0;
    let walker = WalkDir::new(template).min_depth(1).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| SKIPPED_DIRS.contains(&name))
                .unwrap_or(false))
    });

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(template)
            .unwrap_or_else(|_| entry.path());
        let target = root.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if entry.file_type().is_file() {
            debug!("Copying {}", relative.display());
            fs::copy(entry.path(), &target).map_err(io_error(&target))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Package registries drop `.gitignore`, so templates ship it as `gitignore`
fn restore_gitignore(root: &Path) -> Result<(), ProjectError> {
    let shipped = root.join("gitignore");
    let restored = root.join(".gitignore");
    if shipped.exists() && !restored.exists() {
        fs::rename(&shipped, &restored).map_err(io_error(&restored))?;
    }
    Ok(())
}

fn rename_package(root: &Path, name: &str) -> Result<(), ProjectError> {
    let path = root.join("package.json");
    if !path.exists() {
        return Ok(());
    }

    let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
    let mut package: Value = serde_json::from_str(&contents)?;
    if let Some(object) = package.as_object_mut() {
        object.insert("name".to_string(), Value::String(name.to_string()));
    }
    let mut contents = serde_json::to_string_pretty(&package)?;
    contents.push('\n');
    fs::write(&path, contents).map_err(io_error(&path))
}

fn seed_env(root: &Path) -> Result<(), ProjectError> {
    let example = root.join(".env.example");
    let env = root.join(".env");
    if example.exists() && !env.exists() {
        fs::copy(&example, &env).map_err(io_error(&env))?;
    }
    Ok(())
}
