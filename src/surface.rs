//! Named on-screen sources the synchronizer writes into.

use std::{fs, path::Path};

use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SceneError;

/// Read/write access to the host's scene sources.
pub trait PresentationSurface {
    type Handle;

    /// First source, in enumeration order, whose name starts with `prefix`.
    fn find_source_by_name_prefix(&self, prefix: &str) -> Option<Self::Handle>;
    /// Set the text of the source named exactly `name`. Returns `false` if there is none.
    fn set_text(&mut self, name: &str, text: &str) -> bool;
    fn set_embed_url(&mut self, handle: &Self::Handle, url: &str);
    fn rename(&mut self, handle: &Self::Handle, new_name: &str);
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
}

impl Source {
    #[cfg(test)]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Scene kept as a JSON document of sources, in enumeration order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneFile {
    pub sources: Vec<Source>,
}

impl SceneFile {
    #[cfg(test)]
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let json = fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SceneError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    #[cfg(test)]
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.name == name)
    }
}

impl PresentationSurface for SceneFile {
    type Handle = usize;

    fn find_source_by_name_prefix(&self, prefix: &str) -> Option<usize> {
        self.sources
            .iter()
            .position(|source| source.name.starts_with(prefix))
    }

    fn set_text(&mut self, name: &str, text: &str) -> bool {
        match self.sources.iter_mut().find(|source| source.name == name) {
            Some(source) => {
                source.text = text.to_string();
                true
            }
            None => {
                warn!(source = %name, "source not found");
                false
            }
        }
    }

    fn set_embed_url(&mut self, handle: &usize, url: &str) {
        if let Some(source) = self.sources.get_mut(*handle) {
            source.url = url.to_string();
        }
    }

    fn rename(&mut self, handle: &usize, new_name: &str) {
        if let Some(source) = self.sources.get_mut(*handle) {
            source.name = new_name.to_string();
        }
    }
}
