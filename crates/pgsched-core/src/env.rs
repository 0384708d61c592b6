//! Parsers for raw environment values.
//!
//! Every setting is read as a string and converted exactly once, at load
//! time. The conversions mirror the conventions the scheduler API and worker
//! have always relied on, including the strict `"1"`-only boolean flag.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// A flag is on only when the value is exactly `"1"`.
///
/// `"true"`, `"yes"`, `" 1"` and the empty string are all off.
pub(crate) fn parse_flag(raw: &str) -> bool {
    raw == "1"
}

/// Parse a base-10 integer, tolerating surrounding whitespace.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidInteger`] naming the variable if the value
/// does not parse. There is no fallback to the default.
pub(crate) fn parse_integer<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidInteger {
            var,
            value: raw.to_owned(),
            reason: e.to_string(),
        })
}

/// Split a comma-separated value, trimming each element and dropping blanks.
///
/// Order and duplicates are preserved.
pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Like [`parse_list`], but case-folded to lowercase and deduplicated.
pub(crate) fn parse_key_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Expand a leading `~` or `~/` to `home`.
///
/// `~user` forms and paths without a leading tilde are returned unchanged,
/// as is everything when no home directory is known.
pub(crate) fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_true_only_for_exact_one() {
        assert!(parse_flag("1"));
        for raw in ["0", "yes", "true", "TRUE", " 1", "1 ", "", "01"] {
            assert!(!parse_flag(raw), "{raw:?} must not enable a flag");
        }
    }

    #[test]
    fn integer_parses_with_surrounding_whitespace() {
        let v: u64 = parse_integer("DEFAULT_QUERY_INTERVAL", " 21600\n").unwrap();
        assert_eq!(v, 21600);
    }

    #[test]
    fn integer_rejects_garbage() {
        let err = parse_integer::<u32>("KEEP_DAYS", "two hundred").unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::InvalidInteger { var, value, .. }
                if *var == "KEEP_DAYS" && value == "two hundred"
        ));
    }

    #[test]
    fn integer_rejects_empty_and_negative() {
        assert!(parse_integer::<u32>("GZIP_AFTER_DAYS", "").is_err());
        assert!(parse_integer::<u32>("GZIP_AFTER_DAYS", "-7").is_err());
        assert!(parse_integer::<u32>("GZIP_AFTER_DAYS", "7.5").is_err());
    }

    #[test]
    fn list_trims_and_drops_blanks_in_order() {
        assert_eq!(parse_list(" a , b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_keeps_duplicates() {
        assert_eq!(parse_list("b,a,b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn list_of_only_separators_is_empty() {
        assert!(parse_list(" , ,").is_empty());
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn key_set_is_lowercased_and_unique() {
        let set = parse_key_set("Token, PASSWORD,token");
        let expected: BTreeSet<String> = ["token", "password"].into_iter().map(String::from).collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn expand_home_handles_bare_and_nested_tilde() {
        let home = Path::new("/home/sched");
        assert_eq!(expand_home(Path::new("~"), Some(home)), PathBuf::from("/home/sched"));
        assert_eq!(
            expand_home(Path::new("~/keys/app.b64"), Some(home)),
            PathBuf::from("/home/sched/keys/app.b64")
        );
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        let home = Path::new("/home/sched");
        assert_eq!(
            expand_home(Path::new("/etc/keys/app.b64"), Some(home)),
            PathBuf::from("/etc/keys/app.b64")
        );
        assert_eq!(
            expand_home(Path::new("~other/app.b64"), Some(home)),
            PathBuf::from("~other/app.b64")
        );
        assert_eq!(expand_home(Path::new("~/x"), None), PathBuf::from("~/x"));
    }
}
