//! Registry data: release sets, release descriptions and package listings.
//!
//! The PECL REST documents are small XML files with terse element names
//! (`<r><v>5.1.1</v><s>stable</s></r>`). They are parsed here so that the
//! HTTP client only has to move bytes.

use std::collections::HashMap;
use std::collections::hash_map;

use serde::Deserialize;

use crate::Error;
use crate::stability::Stability;
use crate::version::sort_descending;

/// Every published version of a package with its stability.
///
/// Keys are unique and carry no order: call [`ReleaseSet::sorted_versions`]
/// before scanning for a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSet {
    releases: HashMap<String, Stability>,
}

impl ReleaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, version: impl Into<String>, stability: Stability) {
        self.releases.insert(version.into(), stability);
    }

    pub fn stability(&self, version: &str) -> Option<Stability> {
        self.releases.get(version).copied()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Stability> {
        self.releases.iter()
    }

    /// Versions in descending precedence order.
    pub fn sorted_versions(&self) -> Vec<String> {
        sort_descending(self.releases.keys())
    }
}

impl<S: Into<String>> FromIterator<(S, Stability)> for ReleaseSet {
    fn from_iter<I: IntoIterator<Item = (S, Stability)>>(iter: I) -> Self {
        let mut set = ReleaseSet::new();
        for (version, stability) in iter {
            set.insert(version, stability);
        }
        set
    }
}

/// Details of one release, as served by `/r/{name}/{version}.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub package: String,
    pub version: String,
    pub stability: Stability,
    pub license: String,
    pub maintainer: String,
    pub summary: String,
    pub description: String,
    pub release_date: String,
    pub release_notes: String,
    /// Archive location without the `.tgz` extension.
    pub archive_base: String,
    pub package_xml: String,
}

impl ReleaseInfo {
    pub fn archive_url(&self) -> Option<String> {
        let base = self.archive_base.trim();
        if base.is_empty() {
            None
        } else {
            Some(format!("{}.tgz", base))
        }
    }
}

/// Package metadata, as served by `/p/{name}/info.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub category: String,
    pub license: String,
    pub summary: String,
    pub description: String,
    pub parent_package: Option<String>,
    pub deprecated_by: Option<String>,
}

/// Element content, ignoring attributes such as `xlink:href`.
#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AllReleasesDoc {
    #[serde(rename = "r", default)]
    releases: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    v: String,
    #[serde(default)]
    s: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseDoc {
    #[serde(default)]
    p: Text,
    #[serde(default)]
    v: String,
    #[serde(default)]
    st: String,
    #[serde(default)]
    l: String,
    #[serde(default)]
    m: String,
    #[serde(default)]
    s: String,
    #[serde(default)]
    d: String,
    #[serde(default)]
    da: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    g: String,
    #[serde(default)]
    x: Text,
}

#[derive(Debug, Deserialize)]
struct PackageListDoc {
    #[serde(rename = "p", default)]
    packages: Vec<Text>,
}

#[derive(Debug, Deserialize)]
struct PackageDoc {
    #[serde(default)]
    n: String,
    #[serde(default)]
    ca: Text,
    #[serde(default)]
    l: String,
    #[serde(default)]
    s: String,
    #[serde(default)]
    d: String,
    #[serde(default)]
    pa: Option<String>,
    #[serde(default)]
    dp: Option<String>,
}

fn protocol(document: &str, err: quick_xml::DeError) -> Error {
    Error::ProtocolFailure {
        message: format!("malformed {}: {}", document, err),
    }
}

/// Parse an `allreleases.xml` document.
pub fn parse_release_list(xml: &str) -> Result<ReleaseSet, Error> {
    let doc: AllReleasesDoc =
        quick_xml::de::from_str(xml).map_err(|e| protocol("release list", e))?;

    Ok(doc
        .releases
        .into_iter()
        .map(|r| (r.v.trim().to_string(), Stability::from_label(&r.s)))
        .collect())
}

/// Parse a `{version}.xml` release document.
pub fn parse_release_info(xml: &str) -> Result<ReleaseInfo, Error> {
    let doc: ReleaseDoc =
        quick_xml::de::from_str(xml).map_err(|e| protocol("release description", e))?;

    Ok(ReleaseInfo {
        package: doc.p.value.trim().to_string(),
        version: doc.v.trim().to_string(),
        stability: Stability::from_label(&doc.st),
        license: doc.l,
        maintainer: doc.m,
        summary: doc.s,
        description: doc.d,
        release_date: doc.da,
        release_notes: doc.n,
        archive_base: doc.g.trim().to_string(),
        package_xml: doc.x.value,
    })
}

/// Parse a `packages.xml` listing, either global or per category.
pub fn parse_package_list(xml: &str) -> Result<Vec<String>, Error> {
    let doc: PackageListDoc =
        quick_xml::de::from_str(xml).map_err(|e| protocol("package list", e))?;

    Ok(doc
        .packages
        .into_iter()
        .map(|p| p.value.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect())
}

/// Parse an `info.xml` package document.
pub fn parse_package_info(xml: &str) -> Result<PackageInfo, Error> {
    let doc: PackageDoc =
        quick_xml::de::from_str(xml).map_err(|e| protocol("package description", e))?;

    let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    Ok(PackageInfo {
        name: doc.n.trim().to_string(),
        category: doc.ca.value.trim().to_string(),
        license: doc.l,
        summary: doc.s,
        description: doc.d,
        parent_package: non_empty(doc.pa),
        deprecated_by: non_empty(doc.dp),
    })
}
