//! Part-name arithmetic
//!
//! Part names are kept in archive form: no leading slash, `/` separators.
//! The package root (the source of `_rels/.rels`) is the empty string.

/// Relationship-list part for a source part (`""` is the package root)
pub fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Source part of a relationship-list part, or `None` if `rels` is not one
pub fn part_for_rels(rels: &str) -> Option<String> {
    let stem = rels.strip_suffix(".rels")?;
    let (dir, file_name) = match stem.rsplit_once("/_rels/") {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, stem.strip_prefix("_rels/")?),
    };
    if file_name.contains('/') {
        return None;
    }
    Some(match dir {
        Some(dir) if !file_name.is_empty() => format!("{dir}/{file_name}"),
        Some(dir) => dir.to_string(),
        None => file_name.to_string(),
    })
}

/// Whether an archive entry is a relationship-list part
pub fn is_rels_part(name: &str) -> bool {
    name.ends_with(".rels") && (name.starts_with("_rels/") || name.contains("/_rels/"))
}

/// Resolve a relationship target relative to its source part
pub fn resolve_target(source_part: &str, target: &str) -> String {
    // Targets are URIs; fragments never name a part.
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Relative target that reaches `to_part` from `from_part`
pub fn relative_target(from_part: &str, to_part: &str) -> String {
    let from_dir: Vec<&str> = match from_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to: Vec<&str> = to_part.split('/').collect();

    let common = from_dir
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never share the file-name segment of the target.
    let common = common.min(to.len().saturating_sub(1));

    let mut segments: Vec<&str> = Vec::new();
    for _ in common..from_dir.len() {
        segments.push("..");
    }
    segments.extend_from_slice(&to[common..]);
    segments.join("/")
}

/// Part name as written in `[Content_Types].xml` overrides
pub fn to_part_uri(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

/// Archive form of a content-type part URI
pub fn from_part_uri(uri: &str) -> String {
    normalize(uri)
}

/// Lower-cased extension of a part name, without the dot
pub fn extension(part: &str) -> Option<String> {
    let file_name = part.rsplit('/').next().unwrap_or(part);
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// First unused part name of the form `{dir}/{stem}{n}.{ext}`
pub fn next_numbered_name<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    dir: &str,
    stem: &str,
    ext: &str,
) -> String {
    let prefix = format!("{dir}/{stem}");
    let max = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(&prefix))
        .filter_map(|rest| rest.split_once('.'))
        .filter_map(|(num, _)| num.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}{}.{ext}", max + 1)
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
