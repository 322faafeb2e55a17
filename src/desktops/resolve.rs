use crate::config::WorkspaceConfig;
use crate::desktops::LiveDesktop;

const ONE_BASED_PREFIX: &str = "desktop ";

/// Maps a free-form desktop identifier to a zero-based index. Never fails.
///
/// The rules are tried in order and the first match wins:
/// 1. blank → 0
/// 2. integer → itself (may exceed the live count, provisioning covers it)
/// 3. `desktop N` with N ≥ 1 → N-1
/// 4. name of a configured desktop → its configured index
/// 5. name of a live desktop → its live position
/// 6. contains `thing 1` / `thing 2` → 0 / 1
/// 7. anything else → 0
///
/// Name comparisons ignore case. Existing configs rely on this exact order.
pub fn resolve(identifier: &str, config: &WorkspaceConfig, live: &[LiveDesktop]) -> usize {
    let value = identifier.trim();
    if value.is_empty() {
        return 0;
    }

    if let Some(n) = parse_index(value) {
        return n;
    }

    if let Some(tail) = strip_prefix_ignore_case(value, ONE_BASED_PREFIX)
        && let Some(one_based) = parse_index(tail.trim())
        && one_based > 0
    {
        return one_based - 1;
    }

    if let Some(desktop) = config
        .desktops
        .iter()
        .find(|d| eq_ignore_case(&d.name, value))
    {
        return desktop.index;
    }

    if let Some(pos) = live.iter().position(|d| eq_ignore_case(&d.name, value)) {
        return pos;
    }

    let lower = value.to_lowercase();
    if lower.contains("thing 1") {
        return 0;
    }
    if lower.contains("thing 2") {
        return 1;
    }

    log::debug!("Desktop identifier {identifier:?} matched no rule, using desktop 0");
    0
}

/// Direct integer parse, the only form provisioning trusts for sizing.
pub fn parse_index(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}
