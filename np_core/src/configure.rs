//! `./configure` flag handling.

use std::collections::HashSet;

use crate::manifest::ConfigureOption;

/// Name of a configure argument: `--enable-x=yes` gives `enable-x`.
pub fn flag_name(arg: &str) -> &str {
    let name = arg.split_once('=').map_or(arg, |(name, _)| name);
    name.trim_start_matches('-')
}

/// Turn an answered option into a configure argument.
///
/// `with-*` options answered `yes` or `autodetect` become the bare flag.
pub fn derive_flag(option_name: &str, answer: &str) -> String {
    if option_name.starts_with("with-") && (answer == "yes" || answer == "autodetect") {
        format!("--{}", option_name)
    } else {
        format!("--{}={}", option_name, answer)
    }
}

/// Options the manifest declares that `args` does not already set, in
/// manifest order.
pub fn missing_options<'a>(
    options: &'a [ConfigureOption],
    args: &[String],
) -> Vec<&'a ConfigureOption> {
    let present: HashSet<&str> = args.iter().map(|a| flag_name(a)).collect();
    options
        .iter()
        .filter(|o| !present.contains(o.name.as_str()))
        .collect()
}
