//! On-disk path derivation: `<l1>/<l2>/<l3>/<l4>/<file_num:08x>.bin`.

use std::path::PathBuf;

/// Derives the nested subdirectory prefixes for `trimmed_name`: the
/// 1..4-character lowercase prefixes of the name, never exceeding the
/// characters actually available (a 2-character name yields only 2
/// levels).
pub(crate) fn subdir_prefixes(trimmed_name: &str) -> Vec<String> {
    let lower: Vec<char> = trimmed_name.to_ascii_lowercase().chars().collect();
    let chars = if lower.is_empty() { vec!['x'] } else { lower };
    let depth = chars.len().min(4);
    (1..=depth).map(|n| chars[..n].iter().collect()).collect()
}

/// Builds the full relative path `<l1>/.../<file_num:08x>.bin` for a file
/// whose base name (trimmed) is `trimmed_name`.
pub(crate) fn relative_artifact_path(trimmed_name: &str, file_num: u32) -> PathBuf {
    let mut path = PathBuf::new();
    for prefix in subdir_prefixes(trimmed_name) {
        path.push(prefix);
    }
    path.push(format!("{file_num:08x}.bin"));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_yields_fewer_levels() {
        assert_eq!(subdir_prefixes("HI"), vec!["h", "hi"]);
    }

    #[test]
    fn long_name_caps_at_four_levels() {
        assert_eq!(subdir_prefixes("HELLOWORLD"), vec!["h", "he", "hel", "hell"]);
    }

    #[test]
    fn empty_name_falls_back_to_x() {
        assert_eq!(subdir_prefixes(""), vec!["x"]);
    }

    #[test]
    fn relative_path_shape() {
        let path = relative_artifact_path("HELLO", 1001);
        assert_eq!(path, PathBuf::from("h/he/hel/hell/000003e9.bin"));
    }
}
