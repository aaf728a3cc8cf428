use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Cheap content digest used to skip passes over content already processed.
/// Not cryptographic; a collision only costs one skipped diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    lines: usize,
    bytes: usize,
    digest: u64,
}

impl Fingerprint {
    pub fn of(lines: &[String]) -> Self {
        let mut hasher = DefaultHasher::new();
        let mut bytes = 0;
        for line in lines {
            line.hash(&mut hasher);
            bytes += line.len();
        }
        Fingerprint {
            lines: lines.len(),
            bytes,
            digest: hasher.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn equal_content_equal_fingerprint() {
        assert_eq!(
            Fingerprint::of(&lines(&["a", "b"])),
            Fingerprint::of(&lines(&["a", "b"]))
        );
        assert_eq!(Fingerprint::of(&[]), Fingerprint::of(&[]));
    }

    #[test]
    fn same_length_middle_edit_is_detected() {
        assert_ne!(
            Fingerprint::of(&lines(&["a", "b", "c"])),
            Fingerprint::of(&lines(&["a", "X", "c"]))
        );
    }

    #[test]
    fn line_split_is_detected() {
        assert_ne!(
            Fingerprint::of(&lines(&["ab"])),
            Fingerprint::of(&lines(&["a", "b"]))
        );
        assert_ne!(Fingerprint::of(&lines(&[""])), Fingerprint::of(&[]));
    }
}
