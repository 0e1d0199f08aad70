//! One compilation pass over the input files.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{load_options, load_service, ConfigError, GeneratorOptions};
use crate::listener::{self, CompileError};

/// Errors from a full load-compile-render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Paths of the two inputs a pass reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    pub service: PathBuf,
    /// Defaults apply when no options file is given.
    pub options: Option<PathBuf>,
}

impl Inputs {
    pub fn new(service: impl Into<PathBuf>, options: Option<PathBuf>) -> Self {
        Self {
            service: service.into(),
            options,
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.service.as_path()).chain(self.options.as_deref())
    }

    pub fn load_options(&self) -> Result<GeneratorOptions, ConfigError> {
        match &self.options {
            Some(path) => load_options(path),
            None => Ok(GeneratorOptions::default()),
        }
    }
}

/// Load both inputs, compile, and render pretty JSON.
pub fn render(inputs: &Inputs) -> Result<String, RenderError> {
    let opts = inputs.load_options()?;
    let info = load_service(&inputs.service)?;
    let listener = listener::compile(&info, &opts)?;
    Ok(listener.to_json_pretty()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_render_without_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = dir.path().join("service.json");
        fs::write(&service, r#"{"name": "svc", "apis": [{"name": "a"}]}"#).unwrap();

        let output = render(&Inputs::new(&service, None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            value["address"]["socket_address"]["port_value"],
            serde_json::json!(8080)
        );
    }

    #[test]
    fn test_conflict_surfaces_as_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = dir.path().join("service.json");
        let options = dir.path().join("options.toml");
        fs::write(&service, r#"{"name": "svc", "apis": [{"name": "a"}]}"#).unwrap();
        fs::write(
            &options,
            "[backend]\nenable_routing = true\n\n[credentials]\nservice_account_key = \"/k.json\"\n",
        )
        .unwrap();

        let err = render(&Inputs::new(&service, Some(options))).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Compile(CompileError::ConfigConflict(_))
        ));
    }

    #[test]
    fn test_paths_lists_both_inputs() {
        let inputs = Inputs::new("/s.json", Some(PathBuf::from("/o.toml")));
        assert_eq!(
            inputs.paths().collect::<Vec<_>>(),
            vec![Path::new("/s.json"), Path::new("/o.toml")]
        );
    }
}
