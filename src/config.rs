//! Deploy-time configuration: storage paths, report assets and the checklist
//! catalog that data entry is validated against.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_DATABASE: &str = "audit_feedback.db";
pub const DEFAULT_CHART_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

const DEFAULT_PROJECTS: [&str; 7] = [
    "Buxar-1",
    "Buxar-2",
    "Khurja-1",
    "Khurja-2",
    "Ghatampur-1",
    "Ghatampur-2",
    "Ghatampur-3",
];

const DEFAULT_CATEGORIES: [(&str, &[&str]); 3] = [
    (
        "1. General",
        &[
            "1.01 Organization chart",
            "1.02 Communication (Internet, cellular network, server etc)",
            "1.03 Drawing control",
            "1.04 Safety control",
        ],
    ),
    (
        "2. 1st column lifting to final tier erection",
        &[
            "2.01 Civil work",
            "2.02 Primary structure",
            "2.03 Grouting work",
            "2.04 Secondary structure(including walkway, staircase,)",
        ],
    ),
    (
        "3. Assembly of Ceiling Girder Block",
        &[
            "3.01 Ground condition before assembly of ceiling girder block",
            "3.02 Centre line and level checking",
            "3.03 Raising and temporary placement of Girder J (first girder)",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PathBuf,
    pub output_dir: PathBuf,
    /// Branding image placed in the report header. Not checked until a
    /// report is rendered.
    pub logo: Option<PathBuf>,
    /// TrueType font used for chart labels
    pub chart_font: PathBuf,
    pub catalog: Catalog,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            output_dir: PathBuf::from("."),
            logo: None,
            chart_font: PathBuf::from(DEFAULT_CHART_FONT),
            catalog: Catalog::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, or fall back to built-in defaults when no
    /// file is given. Missing keys take their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let config = Self::from_toml(&content)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                debug!("No configuration file given, using built-in defaults");
                Self::default()
            }
        };
        config.catalog.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub subcategories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub projects: Vec<String>,
    pub categories: Vec<Category>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            projects: DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect(),
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, subcategories)| Category {
                    name: name.to_string(),
                    subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }
}

impl Catalog {
    pub fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(Error::Config("catalog has no projects".to_string()));
        }
        if self.categories.is_empty() {
            return Err(Error::Config("catalog has no categories".to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.projects.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(Error::Config(format!("duplicate project '{dup}'")));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.name.as_str()) {
                return Err(Error::Config(format!("duplicate category '{}'", category.name)));
            }
            if category.subcategories.is_empty() {
                return Err(Error::Config(format!(
                    "category '{}' has no subcategories",
                    category.name
                )));
            }
        }
        Ok(())
    }

    pub fn require_project(&self, project: &str) -> Result<()> {
        if self.projects.iter().any(|p| p == project) {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("unknown project '{project}'")))
        }
    }

    pub fn category(&self, name: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{name}'")))
    }
}
