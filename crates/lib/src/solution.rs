//! JSON solution files.
//!
//! A solution file lists projects and, per configuration, the evaluated
//! [`ConfiguredInput`] a host would otherwise deliver through a snapshot
//! source. Paths are relative to the solution file's directory.
//!
//! ```json
//! {
//!   "projects": [
//!     {
//!       "path": "app/app.proj",
//!       "configurations": [
//!         { "dimensions": { "TargetFramework": "net8.0" }, "input": { ... } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::project::{ConfigurationSnapshot, ConfiguredInput, ProjectConfiguration, ProjectSnapshot};
use crate::util::paths::{PathKey, make_absolute, make_rooted};

#[derive(Debug, Error)]
pub enum SolutionError {
  #[error("failed to read solution file {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse solution file {path}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("project references form a cycle through {0}")]
  Cycle(PathBuf),

  #[error("no project in the solution matches '{0}'")]
  UnknownProject(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolutionFile {
  #[serde(default)]
  pub projects: Vec<SolutionProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionProject {
  pub path: PathBuf,
  #[serde(default)]
  pub configurations: Vec<SolutionConfiguration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionConfiguration {
  #[serde(default)]
  pub dimensions: ProjectConfiguration,
  #[serde(default)]
  pub input: ConfiguredInput,
}

/// A loaded solution with every project path made absolute.
#[derive(Debug, Clone)]
pub struct Solution {
  root: PathBuf,
  projects: Vec<SolutionProject>,
}

impl Solution {
  /// Load the solution at `path`. Project paths come out absolute whatever
  /// the form of `path`.
  pub fn load(path: &Path) -> Result<Self, SolutionError> {
    let path = &make_absolute(path).map_err(|source| SolutionError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let content = fs::read_to_string(path).map_err(|source| SolutionError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: SolutionFile = serde_json::from_str(&content).map_err(|source| SolutionError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    let root = path.parent().unwrap_or(Path::new("")).to_path_buf();
    debug!(path = %path.display(), projects = file.projects.len(), "loaded solution");
    Ok(Self::from_file(&root, file))
  }

  /// Resolve `file`'s project paths against `root`.
  pub fn from_file(root: &Path, file: SolutionFile) -> Self {
    let projects = file
      .projects
      .into_iter()
      .map(|project| SolutionProject {
        path: make_rooted(root, &project.path),
        configurations: project.configurations,
      })
      .collect();
    Self {
      root: root.to_path_buf(),
      projects,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn projects(&self) -> &[SolutionProject] {
    &self.projects
  }

  /// The project whose path, file name, or file stem matches `name`.
  pub fn find_project(&self, name: &str) -> Result<&SolutionProject, SolutionError> {
    let rooted = PathKey::new(&make_rooted(&self.root, Path::new(name)));
    self
      .projects
      .iter()
      .find(|project| {
        PathKey::new(&project.path) == rooted
          || project.path.file_name().is_some_and(|file| file == name)
          || project.path.file_stem().is_some_and(|stem| stem == name)
      })
      .ok_or_else(|| SolutionError::UnknownProject(name.to_string()))
  }

  /// The snapshot a host would publish for `project`.
  pub fn snapshot(project: &SolutionProject, version: u64) -> ProjectSnapshot {
    ProjectSnapshot {
      version,
      configurations: project
        .configurations
        .iter()
        .map(|configuration| ConfigurationSnapshot {
          configuration: configuration.dimensions.clone(),
          input: configuration.input.clone(),
        })
        .collect(),
    }
  }

  /// Projects ordered so that every project follows the projects it references.
  ///
  /// References are matched through copy-data target paths; references to
  /// target paths no project in the solution produces are ignored.
  pub fn build_order(&self) -> Result<Vec<&SolutionProject>, SolutionError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..self.projects.len()).map(|i| graph.add_node(i)).collect();

    let mut producers: HashMap<PathKey, usize> = HashMap::new();
    for (index, project) in self.projects.iter().enumerate() {
      for target in target_paths(project) {
        producers.insert(PathKey::new(&target), index);
      }
    }

    for (index, project) in self.projects.iter().enumerate() {
      for reference in referenced_paths(project) {
        if let Some(&producer) = producers.get(&PathKey::new(&reference))
          && producer != index
        {
          graph.update_edge(nodes[producer], nodes[index], ());
        }
      }
    }

    let sorted = toposort(&graph, None)
      .map_err(|cycle| SolutionError::Cycle(self.projects[graph[cycle.node_id()]].path.clone()))?;
    Ok(sorted.into_iter().map(|node| &self.projects[graph[node]]).collect())
  }
}

fn project_dir(project: &SolutionProject) -> &Path {
  project.path.parent().unwrap_or(Path::new(""))
}

fn target_paths(project: &SolutionProject) -> impl Iterator<Item = PathBuf> + '_ {
  let dir = project_dir(project);
  project
    .configurations
    .iter()
    .filter_map(|configuration| configuration.input.copy_data.as_ref())
    .map(move |data| make_rooted(dir, &data.target_path))
}

fn referenced_paths(project: &SolutionProject) -> impl Iterator<Item = PathBuf> + '_ {
  let dir = project_dir(project);
  project
    .configurations
    .iter()
    .filter_map(|configuration| configuration.input.copy_data.as_ref())
    .flat_map(|data| data.referenced_project_target_paths.iter())
    .map(move |path| make_rooted(dir, path))
}
