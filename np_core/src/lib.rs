pub mod configure;
pub mod constraint;
pub mod errors;
pub mod manifest;
pub mod manifest_parser;
pub mod release;
pub mod resolve;
pub mod stability;
pub mod version;

pub use configure::{derive_flag, flag_name, missing_options};
pub use constraint::Constraint;
pub use errors::Error;
pub use manifest::{
    ChangelogEntry, ConfigureOption, ExtensionDependency, Manifest, RuntimeRequirement,
};
pub use manifest_parser::{ParseError, parse_package_xml};
pub use release::{PackageInfo, ReleaseInfo, ReleaseSet};
pub use resolve::select_version;
pub use stability::Stability;
pub use version::Version;
