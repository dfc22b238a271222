//! Configuration types deserialized from `kiln.toml`.

use kiln_common::{OutputMode, Staleness};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata (name, version).
    pub project: ProjectMeta,
    /// Build directory and classpath shared by both source sets.
    #[serde(default)]
    pub build: BuildConfig,
    /// Compiler selection and options shared by both source sets.
    #[serde(default)]
    pub compiler: CompilerSection,
    /// Main source set.
    #[serde(default)]
    pub main: SourceSetConfig,
    /// Test source set.
    #[serde(default)]
    pub test: SourceSetConfig,
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    pub version: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// Build layout and dependency paths.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Build directory, relative to the project root.
    #[serde(default = "default_build_dir")]
    pub directory: String,
    /// Resolved dependency paths, in classpath order.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub classpath: Vec<String>,
    /// Annotation processor path entries.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub processor_path: Vec<String>,
    /// How changed sources are detected.
    #[serde(default)]
    pub staleness: Staleness,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            directory: default_build_dir(),
            classpath: Vec::new(),
            processor_path: Vec::new(),
            staleness: Staleness::default(),
        }
    }
}

/// The `[compiler]` section.
#[derive(Debug, Deserialize)]
pub struct CompilerSection {
    /// Compiler identifier, used for registry and toolchain lookup.
    #[serde(default = "default_compiler_id")]
    pub id: String,
    /// Explicit path of the external compiler executable.
    pub executable: Option<String>,
    /// Run the compiler as a separate process.
    #[serde(default)]
    pub fork: bool,
    /// Source language level.
    pub source: Option<String>,
    /// Target bytecode level.
    pub target: Option<String>,
    /// Release level; when set, supersedes `source` and `target`.
    pub release: Option<String>,
    /// Source file encoding.
    pub encoding: Option<String>,
    /// Emit debug information.
    #[serde(default = "yes")]
    pub debug: bool,
    /// Report compiler warnings.
    #[serde(default = "yes")]
    pub show_warnings: bool,
    /// Report deprecated API usage in detail.
    #[serde(default)]
    pub show_deprecation: bool,
    /// Run annotation processors.
    #[serde(default = "yes")]
    pub annotation_processing: bool,
    /// Abort the build when compilation fails.
    #[serde(default = "yes")]
    pub fail_on_error: bool,
    /// Treat any warning as a failure.
    #[serde(default)]
    pub fail_on_warning: bool,
    /// Extension of source files selected when no includes are configured.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    /// One output per source, or a single aggregate output.
    #[serde(default)]
    pub output: OutputMode,
    /// Extra arguments passed to the compiler unmodified.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub args: Vec<String>,
    /// Command-line length above which a forked compiler receives an
    /// argument file. Defaults to the platform limit.
    pub max_command_line: Option<usize>,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            id: default_compiler_id(),
            executable: None,
            fork: false,
            source: None,
            target: None,
            release: None,
            encoding: None,
            debug: true,
            show_warnings: true,
            show_deprecation: false,
            annotation_processing: true,
            fail_on_error: true,
            fail_on_warning: false,
            source_extension: default_source_extension(),
            output: OutputMode::default(),
            args: Vec::new(),
            max_command_line: None,
        }
    }
}

/// The `[main]` or `[test]` section.
///
/// Empty or absent fields fall back to the role's conventional layout.
#[derive(Debug, Default, Deserialize)]
pub struct SourceSetConfig {
    /// Source roots, relative to the project root.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub roots: Vec<String>,
    /// Include globs, relative to each root.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub includes: Vec<String>,
    /// Exclude globs, relative to each root.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub excludes: Vec<String>,
    /// Output directory, relative to the build directory.
    pub output: Option<String>,
    /// Skip compiling this source set.
    #[serde(default)]
    pub skip: bool,
    /// Classpath entries added after `[build] classpath`.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub classpath: Vec<String>,
    /// Overrides `[compiler] source` for this source set.
    pub source: Option<String>,
    /// Overrides `[compiler] target` for this source set.
    pub target: Option<String>,
    /// Overrides `[compiler] release` for this source set.
    pub release: Option<String>,
    /// Arguments appended after `[compiler] args`.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub args: Vec<String>,
}

fn default_build_dir() -> String {
    "target".to_string()
}

fn default_compiler_id() -> String {
    "javac".to_string()
}

fn default_source_extension() -> String {
    "java".to_string()
}

fn yes() -> bool {
    true
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `roots = "src"` as well as `roots = ["src", "generated"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
