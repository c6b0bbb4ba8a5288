//! `package.xml` parser for PECL source packages.
//!
//! Extracts the parts of a version 2.0 package definition needed to check
//! dependencies and configure a build. File lists, maintainers and binary
//! package sections are ignored.
//!
//! # Supported elements
//!
//! ```xml
//! <package version="2.0">
//!   <name>redis</name>
//!   <summary>...</summary>
//!   <version><release>5.1.1</release><api>5.1.0</api></version>
//!   <stability><release>stable</release><api>stable</api></stability>
//!   <dependencies>
//!     <required>
//!       <php><min>7.0.0</min><max>8.99.99</max><exclude>7.1.0</exclude></php>
//!       <extension><name>json</name></extension>
//!     </required>
//!     <optional>
//!       <extension><name>igbinary</name></extension>
//!     </optional>
//!   </dependencies>
//!   <extsrcrelease>
//!     <configureoption name="enable-redis-igbinary" default="no" prompt="enable igbinary?"/>
//!   </extsrcrelease>
//!   <changelog><release>...</release></changelog>
//! </package>
//! ```

use serde::Deserialize;
use tracing::warn;

use crate::manifest::{
    ChangelogEntry, ConfigureOption, ExtensionDependency, Manifest, RuntimeRequirement,
};
use crate::stability::Stability;

/// Error type for manifest parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document is not well-formed or does not have the expected shape.
    Malformed(String),
    /// Required element is missing or empty.
    MissingField(&'static str),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Malformed(message) => write!(f, "malformed package.xml: {}", message),
            ParseError::MissingField(field) => write!(f, "missing required element: {}", field),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PackageXml {
    #[serde(default)]
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: VersionPair,
    #[serde(default)]
    stability: VersionPair,
    #[serde(default)]
    license: Text,
    #[serde(default)]
    dependencies: Dependencies,
    #[serde(default)]
    extsrcrelease: ExtSrcRelease,
    #[serde(default)]
    changelog: Changelog,
}

#[derive(Debug, Default, Deserialize)]
struct VersionPair {
    #[serde(default)]
    release: String,
    #[serde(default)]
    api: String,
}

#[derive(Debug, Default, Deserialize)]
struct Dependencies {
    #[serde(default)]
    required: Required,
    #[serde(default)]
    optional: Optional,
}

#[derive(Debug, Default, Deserialize)]
struct Required {
    #[serde(default)]
    php: Bounds,
    #[serde(rename = "extension", default)]
    extensions: Vec<ExtensionXml>,
}

#[derive(Debug, Default, Deserialize)]
struct Optional {
    #[serde(rename = "extension", default)]
    extensions: Vec<ExtensionXml>,
}

#[derive(Debug, Default, Deserialize)]
struct Bounds {
    min: Option<String>,
    max: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtensionXml {
    #[serde(default)]
    name: String,
    min: Option<String>,
    max: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtSrcRelease {
    #[serde(rename = "configureoption", default)]
    options: Vec<ConfigureOptionXml>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigureOptionXml {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@default", default)]
    default: String,
    #[serde(rename = "@prompt", default)]
    prompt: String,
}

#[derive(Debug, Default, Deserialize)]
struct Changelog {
    #[serde(rename = "release", default)]
    releases: Vec<ChangelogRelease>,
}

#[derive(Debug, Default, Deserialize)]
struct ChangelogRelease {
    #[serde(default)]
    version: VersionPair,
    #[serde(default)]
    stability: VersionPair,
    #[serde(default)]
    date: String,
    #[serde(default)]
    notes: String,
}

/// Parses a `package.xml` document into a [`Manifest`].
///
/// Stability labels the registry does not know degrade to
/// [`Stability::Unknown`] with a warning instead of failing the parse.
pub fn parse_package_xml(xml: &str) -> Result<Manifest, ParseError> {
    let doc: PackageXml =
        quick_xml::de::from_str(xml).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let name = doc.name.trim().to_string();
    if name.is_empty() {
        return Err(ParseError::MissingField("name"));
    }

    let required = doc.dependencies.required;

    Ok(Manifest {
        summary: doc.summary.trim().to_string(),
        description: doc.description.trim().to_string(),
        version: doc.version.release.trim().to_string(),
        api_version: doc.version.api.trim().to_string(),
        stability: stability(&doc.stability.release),
        api_stability: stability(&doc.stability.api),
        license: doc.license.value.trim().to_string(),
        php: RuntimeRequirement {
            min: non_empty(required.php.min),
            max: non_empty(required.php.max),
            exclude: trimmed(required.php.exclude),
        },
        required_extensions: required.extensions.into_iter().map(extension).collect(),
        optional_extensions: doc
            .dependencies
            .optional
            .extensions
            .into_iter()
            .map(extension)
            .collect(),
        configure_options: doc
            .extsrcrelease
            .options
            .into_iter()
            .filter(|o| !o.name.trim().is_empty())
            .map(|o| ConfigureOption {
                name: o.name.trim().to_string(),
                default: o.default,
                prompt: o.prompt,
            })
            .collect(),
        changelog: doc
            .changelog
            .releases
            .into_iter()
            .map(|r| ChangelogEntry {
                version: r.version.release.trim().to_string(),
                stability: stability(&r.stability.release),
                date: r.date.trim().to_string(),
                notes: r.notes.trim().to_string(),
            })
            .collect(),
        name,
    })
}

fn stability(label: &str) -> Stability {
    let parsed = Stability::from_label(label);
    if parsed == Stability::Unknown && !label.trim().is_empty() {
        warn!(stability = label.trim(), "unsupported stability in package.xml");
    }
    parsed
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn extension(ext: ExtensionXml) -> ExtensionDependency {
    ExtensionDependency {
        name: ext.name.trim().to_string(),
        min: non_empty(ext.min),
        max: non_empty(ext.max),
        exclude: trimmed(ext.exclude),
    }
}
