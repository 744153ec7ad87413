use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDateTime;
use log::warn;

use crate::error::AppError;
use crate::fs::node::FileNode;

/// Sort key applied to one directory listing.
///
/// The enum is closed, so an unknown method is unrepresentable at the sort
/// site; only parsing user/config text can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMethod {
    DateAsc,
    #[default]
    DateDesc,
    NameAsc,
    NameDesc,
    SizeAsc,
    SizeDesc,
    CreatedTimeAsc,
    CreatedTimeDesc,
    /// High-precision modification time; falls back to `date` when the
    /// nanosecond field is missing on either operand.
    MtimeNsAsc,
    MtimeNsDesc,
    /// High-precision creation time; falls back to `created_time`.
    CtimeNsAsc,
    CtimeNsDesc,
}

impl SortMethod {
    pub const ALL: &'static [SortMethod] = &[
        SortMethod::DateAsc,
        SortMethod::DateDesc,
        SortMethod::NameAsc,
        SortMethod::NameDesc,
        SortMethod::SizeAsc,
        SortMethod::SizeDesc,
        SortMethod::CreatedTimeAsc,
        SortMethod::CreatedTimeDesc,
        SortMethod::MtimeNsAsc,
        SortMethod::MtimeNsDesc,
        SortMethod::CtimeNsAsc,
        SortMethod::CtimeNsDesc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMethod::DateAsc => "date-asc",
            SortMethod::DateDesc => "date-desc",
            SortMethod::NameAsc => "name-asc",
            SortMethod::NameDesc => "name-desc",
            SortMethod::SizeAsc => "size-asc",
            SortMethod::SizeDesc => "size-desc",
            SortMethod::CreatedTimeAsc => "created-time-asc",
            SortMethod::CreatedTimeDesc => "created-time-desc",
            SortMethod::MtimeNsAsc => "mtime-ns-asc",
            SortMethod::MtimeNsDesc => "mtime-ns-desc",
            SortMethod::CtimeNsAsc => "ctime-ns-asc",
            SortMethod::CtimeNsDesc => "ctime-ns-desc",
        }
    }
}

impl std::fmt::Display for SortMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| AppError::InvalidSortMethod(s.to_string()))
    }
}

fn parse_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

// Unparseable timestamps sort before everything else; Option's None < Some
// gives a total order without special cases.
fn compare_by_date(a: &FileNode, b: &FileNode) -> Ordering {
    parse_time(&a.date).cmp(&parse_time(&b.date))
}

fn compare_by_created(a: &FileNode, b: &FileNode) -> Ordering {
    parse_time(&a.created_time).cmp(&parse_time(&b.created_time))
}

fn compare_by_name(a: &FileNode, b: &FileNode) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn compare_by_size(a: &FileNode, b: &FileNode) -> Ordering {
    a.bytes.cmp(&b.bytes)
}

fn compare_by_type(a: &FileNode, b: &FileNode) -> Ordering {
    // directories first, whatever the secondary key
    b.is_dir().cmp(&a.is_dir())
}

/// Sort a listing: directories before files, then by `method`. Pure,
/// non-mutating, stable for ties.
pub fn sort_files(files: &[FileNode], method: SortMethod) -> Vec<FileNode> {
    let hp_fallback = match method {
        SortMethod::MtimeNsAsc | SortMethod::MtimeNsDesc => {
            files.iter().any(|f| f.mtime_ns.is_none())
        }
        SortMethod::CtimeNsAsc | SortMethod::CtimeNsDesc => {
            files.iter().any(|f| f.ctime_ns.is_none())
        }
        _ => false,
    };
    if hp_fallback {
        warn!(
            "high-precision timestamps missing for {}, falling back to second precision",
            method
        );
    }

    let by_mtime_ns = |a: &FileNode, b: &FileNode| match (a.mtime_ns, b.mtime_ns) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => compare_by_date(a, b),
    };
    let by_ctime_ns = |a: &FileNode, b: &FileNode| match (a.ctime_ns, b.ctime_ns) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => compare_by_created(a, b),
    };

    let compare = |a: &FileNode, b: &FileNode| match method {
        SortMethod::DateAsc => compare_by_date(a, b),
        SortMethod::DateDesc => compare_by_date(b, a),
        SortMethod::NameAsc => compare_by_name(a, b),
        SortMethod::NameDesc => compare_by_name(b, a),
        SortMethod::SizeAsc => compare_by_size(a, b),
        SortMethod::SizeDesc => compare_by_size(b, a),
        SortMethod::CreatedTimeAsc => compare_by_created(a, b),
        SortMethod::CreatedTimeDesc => compare_by_created(b, a),
        SortMethod::MtimeNsAsc => by_mtime_ns(a, b),
        SortMethod::MtimeNsDesc => by_mtime_ns(b, a),
        SortMethod::CtimeNsAsc => by_ctime_ns(a, b),
        SortMethod::CtimeNsDesc => by_ctime_ns(b, a),
    };

    let mut sorted = files.to_vec();
    sorted.sort_by(|a, b| compare_by_type(a, b).then_with(|| compare(a, b)));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::node::NodeKind;

    fn node(name: &str, kind: NodeKind, bytes: i64, date: &str) -> FileNode {
        FileNode {
            name: name.into(),
            fullpath: format!("/t/{}", name),
            kind,
            size: "-".into(),
            bytes,
            date: date.into(),
            created_time: date.into(),
            mtime_ns: None,
            ctime_ns: None,
            is_under_scanned_path: false,
        }
    }

    #[test]
    fn dirs_precede_files_for_every_method() {
        let files = vec![
            node("zz.png", NodeKind::File, 10, "2024-03-01 08:00:00"),
            node("aa", NodeKind::Dir, 0, "2024-01-01 08:00:00"),
        ];
        for &method in SortMethod::ALL {
            let sorted = sort_files(&files, method);
            assert_eq!(sorted[0].name, "aa", "method {}", method);
        }
    }

    #[test]
    fn sort_is_idempotent() {
        let files = vec![
            node("b.png", NodeKind::File, 5, "2024-02-01 08:00:00"),
            node("a.png", NodeKind::File, 9, "2024-01-01 08:00:00"),
            node("sub", NodeKind::Dir, 0, "2024-03-01 08:00:00"),
        ];
        let once = sort_files(&files, SortMethod::NameAsc);
        let twice = sort_files(&once, SortMethod::NameAsc);
        assert_eq!(once, twice);
    }

    #[test]
    fn name_sort_is_case_insensitive() {
        let files = vec![
            node("Beta.png", NodeKind::File, 1, "2024-01-01 08:00:00"),
            node("alpha.png", NodeKind::File, 1, "2024-01-01 08:00:00"),
        ];
        let sorted = sort_files(&files, SortMethod::NameAsc);
        assert_eq!(sorted[0].name, "alpha.png");
    }

    #[test]
    fn date_desc_orders_newest_first() {
        let files = vec![
            node("old.png", NodeKind::File, 1, "2023-01-01 08:00:00"),
            node("new.png", NodeKind::File, 1, "2024-06-01 08:00:00"),
        ];
        let sorted = sort_files(&files, SortMethod::DateDesc);
        assert_eq!(sorted[0].name, "new.png");
    }

    #[test]
    fn size_asc_orders_smallest_first() {
        let files = vec![
            node("big.png", NodeKind::File, 900, "2024-01-01 08:00:00"),
            node("small.png", NodeKind::File, 3, "2024-01-01 08:00:00"),
        ];
        let sorted = sort_files(&files, SortMethod::SizeAsc);
        assert_eq!(sorted[0].name, "small.png");
    }

    #[test]
    fn unparseable_dates_sort_first_ascending() {
        let files = vec![
            node("ok.png", NodeKind::File, 1, "2024-01-01 08:00:00"),
            node("bad.png", NodeKind::File, 1, ""),
        ];
        let sorted = sort_files(&files, SortMethod::DateAsc);
        assert_eq!(sorted[0].name, "bad.png");
    }

    #[test]
    fn mtime_ns_used_when_present() {
        let mut a = node("a.png", NodeKind::File, 1, "2024-01-01 08:00:00");
        let mut b = node("b.png", NodeKind::File, 1, "2024-01-01 08:00:00");
        // identical second-precision dates, ns breaks the tie
        a.mtime_ns = Some(100);
        b.mtime_ns = Some(200);
        let sorted = sort_files(&[b.clone(), a.clone()], SortMethod::MtimeNsAsc);
        assert_eq!(sorted[0].name, "a.png");
        let sorted = sort_files(&[a, b], SortMethod::MtimeNsDesc);
        assert_eq!(sorted[0].name, "b.png");
    }

    #[test]
    fn mtime_ns_falls_back_to_date_when_missing() {
        let a = node("a.png", NodeKind::File, 1, "2023-01-01 08:00:00");
        let mut b = node("b.png", NodeKind::File, 1, "2024-01-01 08:00:00");
        b.mtime_ns = Some(1);
        let sorted = sort_files(&[b, a], SortMethod::MtimeNsAsc);
        assert_eq!(sorted[0].name, "a.png");
    }

    #[test]
    fn sort_does_not_mutate_input() {
        let files = vec![
            node("b.png", NodeKind::File, 1, "2024-01-01 08:00:00"),
            node("a.png", NodeKind::File, 1, "2024-01-01 08:00:00"),
        ];
        let _ = sort_files(&files, SortMethod::NameAsc);
        assert_eq!(files[0].name, "b.png");
    }

    #[test]
    fn method_round_trips_through_str() {
        for &m in SortMethod::ALL {
            assert_eq!(m.as_str().parse::<SortMethod>().unwrap(), m);
        }
        assert!("date-sideways".parse::<SortMethod>().is_err());
    }
}
