//! RON model loader

use crate::error::{Error, Result};
use crate::schema::ModelDef;
use qnet_core::ObjectTypeDescriptor;
use qnet_sim::{ActivityDescriptor, Simulation};
use std::fs;
use std::path::Path;
use tracing::info;

/// Loader for RON model files
///
/// A model is read from one main file; object type and activity
/// definitions may come from additional files.
#[derive(Debug, Default)]
pub struct Loader {
    model: Option<ModelDef>,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete model
    pub fn parse(content: &str) -> Result<ModelDef> {
        Ok(ron::from_str(content)?)
    }

    /// Load the main model from a RON string
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        if self.model.is_some() {
            return Err(Error::DuplicateDefinition("model".into()));
        }
        self.model = Some(Self::parse(content)?);
        Ok(())
    }

    /// Load a RON file
    ///
    /// Files holding only `object_types:` or `activities:` extend the main
    /// model; anything else is taken as the main model.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        info!(path = %path.display(), "loading model file");
        if !content.contains("net:") && content.contains("object_types:") {
            self.load_object_types_str(&content)
        } else if !content.contains("net:") && content.contains("activities:") {
            self.load_activities_str(&content)
        } else {
            self.load_str(&content)
        }
    }

    /// Add object type definitions
    pub fn load_object_types_str(&mut self, content: &str) -> Result<()> {
        #[derive(serde::Deserialize)]
        struct ObjectTypeFile {
            object_types: Vec<ObjectTypeDescriptor>,
        }

        let file: ObjectTypeFile = ron::from_str(content)?;
        let model = self.model.get_or_insert_with(ModelDef::default);
        for descriptor in file.object_types {
            if model.object_types.iter().any(|d| d.name == descriptor.name) {
                return Err(Error::DuplicateDefinition(format!("object type {}", descriptor.name)));
            }
            model.object_types.push(descriptor);
        }
        Ok(())
    }

    /// Add activity definitions
    pub fn load_activities_str(&mut self, content: &str) -> Result<()> {
        #[derive(serde::Deserialize)]
        struct ActivityFile {
            activities: Vec<ActivityDescriptor>,
        }

        let file: ActivityFile = ron::from_str(content)?;
        let model = self.model.get_or_insert_with(ModelDef::default);
        for descriptor in file.activities {
            if model.activities.iter().any(|d| d.name == descriptor.name) {
                return Err(Error::DuplicateDefinition(format!("activity {}", descriptor.name)));
            }
            model.activities.push(descriptor);
        }
        Ok(())
    }

    /// Get the current model (for inspection during loading)
    pub fn model(&self) -> Option<&ModelDef> {
        self.model.as_ref()
    }

    /// Finish loading and return the model definition
    pub fn finish(self) -> ModelDef {
        self.model.unwrap_or_default()
    }

    /// Load a model file and build its simulation
    pub fn load_simulation(path: impl AsRef<Path>) -> Result<Simulation> {
        let mut loader = Self::new();
        loader.load_file(path)?;
        loader.finish().build()
    }
}
