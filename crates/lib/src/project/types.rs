use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::TARGET_FRAMEWORK_DIMENSION;
use crate::copy::ProjectCopyData;

/// One build variant of a project, identified by its dimension values.
///
/// Dimensions are kept sorted, so equality and hashing do not depend on the
/// order in which they were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectConfiguration {
  pub dimensions: BTreeMap<String, String>,
}

impl ProjectConfiguration {
  pub fn new<I, K, V>(dimensions: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      dimensions: dimensions.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
    }
  }

  pub fn dimension(&self, name: &str) -> Option<&str> {
    self.dimensions.get(name).map(String::as_str)
  }

  pub fn target_framework(&self) -> Option<&str> {
    self.dimension(TARGET_FRAMEWORK_DIMENSION)
  }
}

impl fmt::Display for ProjectConfiguration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.dimensions.is_empty() {
      return write!(f, "(default)");
    }
    let values: Vec<&str> = self.dimensions.values().map(String::as_str).collect();
    write!(f, "{}", values.join("|"))
  }
}

/// Per-project build acceleration setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAcceleration {
  Enabled,
  Disabled,
  /// Not set by the project; the solution-wide default applies.
  #[default]
  Unspecified,
}

/// A typed input item. JSON accepts a bare path (required) or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "InputItemRepr")]
pub struct InputItem {
  pub path: PathBuf,
  pub required: bool,
}

impl InputItem {
  pub fn required(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      required: true,
    }
  }

  pub fn optional(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      required: false,
    }
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputItemRepr {
  Path(PathBuf),
  Item {
    path: PathBuf,
    #[serde(default = "default_required")]
    required: bool,
  },
}

fn default_required() -> bool {
  true
}

impl From<InputItemRepr> for InputItem {
  fn from(repr: InputItemRepr) -> Self {
    match repr {
      InputItemRepr::Path(path) => Self::required(path),
      InputItemRepr::Item { path, required } => Self { path, required },
    }
  }
}

/// Kind name to paths.
pub type ItemsByKind = BTreeMap<String, Vec<PathBuf>>;

/// Set name to kind name to paths. The default set is the empty name.
pub type ItemsByKindBySet = BTreeMap<String, ItemsByKind>;

/// A file produced directly from a single input by a transform or copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltFromInputFile {
  pub destination: PathBuf,
  pub source: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemChangeKind {
  Added,
  Removed,
}

/// An item that joined or left a configuration's declared input set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemChange {
  pub kind: ItemChangeKind,
  pub item_type: String,
  pub path: PathBuf,
}

impl fmt::Display for ItemChange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = match self.kind {
      ItemChangeKind::Added => '+',
      ItemChangeKind::Removed => '-',
    };
    write!(f, "{} {}: {}", sign, self.item_type, self.path.display())
  }
}

/// Everything the checker needs to know about one configuration.
///
/// Paths may be relative; they are resolved against the project directory
/// before any comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfiguredInput {
  pub is_disabled: bool,
  pub build_acceleration: BuildAcceleration,
  pub acceleration_incompatible_packages: Vec<String>,
  pub newest_import_input: Option<PathBuf>,
  pub input_items_by_type: BTreeMap<String, Vec<InputItem>>,
  pub input_items_by_kind_by_set: ItemsByKindBySet,
  pub output_items_by_kind_by_set: ItemsByKindBySet,
  pub built_items_by_kind_by_set: ItemsByKindBySet,
  pub copy_up_to_date_marker: Option<PathBuf>,
  pub copy_reference_inputs: Vec<PathBuf>,
  pub built_from_input_files: Vec<BuiltFromInputFile>,
  pub last_items_changed_at: Option<DateTime<Utc>>,
  pub last_item_changes: Vec<ItemChange>,
  pub output_path: Option<PathBuf>,
  pub intermediate_output_path: Option<PathBuf>,
  pub copy_data: Option<ProjectCopyData>,
}

/// One configuration's entry in a project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
  pub configuration: ProjectConfiguration,
  pub input: ConfiguredInput,
}

/// Immutable, versioned view of all of a project's configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
  pub version: u64,
  pub configurations: Vec<ConfigurationSnapshot>,
}
