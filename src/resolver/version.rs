use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment<'a> {
    Text(&'a str),
    Number(u64),
}

fn segments(part: &str) -> Vec<Segment<'_>> {
    part
        .split(|c: char| matches!(c, '.' | '-' | '_' | '+'))
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map(Segment::Number).unwrap_or(Segment::Text(s)))
        .collect()
}

/// Sort key of a tag. Fields compare in declaration order, so a release core compares first,
/// a pre-release sorts before the plain release sharing its core, and the raw tag breaks ties.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct VersionKey<'a> {
    core: Vec<Segment<'a>>,
    is_release: bool,
    pre_release: Vec<Segment<'a>>,
    raw: &'a str,
}

impl<'a> VersionKey<'a> {
    fn of(tag: &'a str) -> Self {
        let trimmed = match tag.strip_prefix('v') {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => tag,
        };
        let (core, pre_release) = match trimmed.split_once('-') {
            Some((core, pre_release)) => (core, Some(pre_release)),
            None => (trimmed, None),
        };
        Self {
            core: segments(core),
            is_release: pre_release.is_none(),
            pre_release: pre_release.map(segments).unwrap_or_default(),
            raw: tag,
        }
    }
}

/// Version-aware ordering of tags.
///
/// Every tag maps to the same kind of key: the part before the first `-` is the release core,
/// compared segment by segment with numeric segments compared as numbers and ranked above text.
/// A `-suffix` marks a pre-release that sorts before the release with the same core, so
/// `1.0.0-rc.1 < 1.0.0 < 1.0.0.1` and date builds like `2024.01.15 < 2024.01.15.2` both hold.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::of(a).cmp(&VersionKey::of(b))
}

/// Greatest version of `candidates`, if any.
pub fn latest<'a, I>(candidates: I) -> Option<&'a str>
    where I: IntoIterator<Item=&'a str>,
{
    candidates.into_iter().max_by(|a, b| compare_versions(a, b))
}
