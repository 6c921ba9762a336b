use crate::container::Container;
use crate::error::AntiparserError;
use crate::integer::{FixedInt, IntWidth};
use crate::object::{ByteOrder, DataField, DataObject, MutationMode};
use crate::strings::{FreeformString, KeywordString};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The `[generator]` table: how many payloads to produce and where they go.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GeneratorSettings {
    /// Seed for the container's `ChaCha8Rng`; the same seed yields the same payloads.
    #[serde(default)]
    pub seed: u64,
    /// Number of permutations, one payload file each.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Directory receiving `payload_NNNNNN_<md5>.bin` files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// When set, every permutation is also saved to a snapshot store here.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    /// Shuffle the object order before each permutation.
    #[serde(default)]
    pub shuffle: bool,
}

pub fn default_iterations() -> u64 {
    100
}

pub fn default_output_dir() -> PathBuf {
    PathBuf::from("./payloads")
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: default_iterations(),
            output_dir: default_output_dir(),
            snapshot_dir: None,
            shuffle: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    String,
    Cstring,
    Keyword,
    Int8,
    Int16,
    Int32,
}

/// One `[[objects]]` table of a template. Fields that do not apply to the
/// chosen `kind` are rejected by [`ObjectSpec::build`].
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ObjectSpec {
    pub kind: ObjectKind,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub mode: MutationMode,
    pub content: Option<String>,
    pub illegal_chars: Option<String>,
    pub terminator: Option<String>,
    pub separator: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub signed: Option<bool>,
    pub value: Option<i64>,
}

impl ObjectSpec {
    /// Turns the table into a configured data object, running every setter's checks.
    pub fn build(&self) -> Result<DataObject, AntiparserError> {
        let mut object = match self.kind {
            ObjectKind::String => DataObject::Freeform(self.build_string()?),
            ObjectKind::Cstring => DataObject::CString(self.build_string()?),
            ObjectKind::Keyword => DataObject::Keyword(self.build_keyword()?),
            ObjectKind::Int8 => DataObject::Int(self.build_int(IntWidth::Bits8)?),
            ObjectKind::Int16 => DataObject::Int(self.build_int(IntWidth::Bits16)?),
            ObjectKind::Int32 => DataObject::Int(self.build_int(IntWidth::Bits32)?),
        };
        let min = self.min_size.unwrap_or(object.min_size());
        let max = self.max_size.unwrap_or(object.max_size());
        object.set_bounds(min, max)?;
        object.set_mode(self.mode)?;
        object.set_optional(self.optional);
        object.set_static(self.is_static);
        object.set_byte_order(self.byte_order);
        Ok(object)
    }

    fn reject(&self, field: &str, present: bool) -> Result<(), AntiparserError> {
        if present {
            return Err(AntiparserError::config(format!(
                "`{field}` does not apply to {:?} objects",
                self.kind
            )));
        }
        Ok(())
    }

    fn build_string(&self) -> Result<FreeformString, AntiparserError> {
        self.reject("separator", self.separator.is_some())?;
        self.reject("keywords", self.keywords.is_some())?;
        self.reject("signed", self.signed.is_some())?;
        self.reject("value", self.value.is_some())?;
        let mut string = FreeformString::with_content(self.content.clone().unwrap_or_default());
        self.apply_string_bounds(&mut string)?;
        if let Some(chars) = &self.illegal_chars {
            string.set_illegal_chars(chars.as_bytes())?;
        }
        if let Some(terminator) = &self.terminator {
            string.set_terminator(terminator.as_str());
        }
        Ok(string)
    }

    fn build_keyword(&self) -> Result<KeywordString, AntiparserError> {
        self.reject("signed", self.signed.is_some())?;
        self.reject("value", self.value.is_some())?;
        let keywords = self.keywords.clone().unwrap_or_default();
        let mut keyword = KeywordString::new(keywords)?;
        self.apply_string_bounds(&mut keyword)?;
        if let Some(chars) = &self.illegal_chars {
            keyword.set_illegal_chars(chars.as_bytes())?;
        }
        if let Some(terminator) = &self.terminator {
            keyword.set_terminator(terminator.as_str());
        }
        if let Some(separator) = &self.separator {
            keyword.set_separator(separator.as_str());
        }
        if let Some(content) = &self.content {
            keyword.set_content(content.as_str());
        }
        Ok(keyword)
    }

    /// Bounds go in before the illegal characters, so a template may narrow
    /// the length to zero and then exclude every byte.
    fn apply_string_bounds<T: DataField>(&self, field: &mut T) -> Result<(), AntiparserError> {
        let min = self.min_size.unwrap_or(field.min_size());
        let max = self.max_size.unwrap_or(field.max_size());
        field.set_bounds(min, max)
    }

    fn build_int(&self, width: IntWidth) -> Result<FixedInt, AntiparserError> {
        self.reject("content", self.content.is_some())?;
        self.reject("illegal-chars", self.illegal_chars.is_some())?;
        self.reject("terminator", self.terminator.is_some())?;
        self.reject("separator", self.separator.is_some())?;
        self.reject("keywords", self.keywords.is_some())?;
        let mut int = FixedInt::new(width);
        // Signedness resets the bounds, so it goes first.
        int.set_signed(self.signed.unwrap_or(false));
        int.set_content(self.value.unwrap_or(0));
        Ok(int)
    }
}

/// A payload template: generator settings plus the ordered object list.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct AntiparserConfig {
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
}

impl AntiparserConfig {
    /// Reads and parses a TOML template.
    ///
    /// # Arguments
    /// * `path`: Path to the template file.
    ///
    /// # Returns
    /// The parsed template. Objects are not built yet; see [`Self::build_container`].
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: AntiparserConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }

    /// Builds a container seeded from `generator.seed`, appending the objects
    /// in template order.
    pub fn build_container(&self) -> Result<Container<ChaCha8Rng>, AntiparserError> {
        let mut container = Container::seeded(self.generator.seed);
        for (index, spec) in self.objects.iter().enumerate() {
            let object = spec.build().map_err(|e| match e {
                AntiparserError::Configuration(msg) => {
                    AntiparserError::Configuration(format!("objects[{index}]: {msg}"))
                }
                other => other,
            })?;
            container.append(object)?;
        }
        Ok(container)
    }
}
