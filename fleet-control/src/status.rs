//! Parsers for the real cluster tool's status lines.
//!
//! The output format of `ceph osd stat`, `ceph osd lspools` and
//! `ceph pg stat` is not stable across releases. Each check is a pure
//! function from raw text to a [`Verdict`]; anything we cannot make sense of
//! is logged and reported as [`Verdict::Indeterminate`], which the poller
//! treats the same as "not converged yet".

/// Pools a freshly deployed cluster carries, in the order the tool lists them.
pub const DEFAULT_POOLS: [(u32, &str); 3] = [(0, "data"), (1, "metadata"), (2, "rbd")];

/// PG state a healthy cluster reports for every placement group.
pub const ACTIVE_CLEAN: &str = "active+clean";

/// Outcome of evaluating one status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The invariant holds.
    Converged,
    /// Output parsed, invariant does not hold (yet).
    NotConverged,
    /// Output did not match the expected format.
    Indeterminate,
}

impl Verdict {
    /// Only [`Verdict::Converged`] ends a poll.
    pub fn is_converged(self) -> bool {
        self == Verdict::Converged
    }

    fn from_bool(ok: bool) -> Self {
        if ok {
            Verdict::Converged
        } else {
            Verdict::NotConverged
        }
    }
}

/// OSD counts from `osd stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsdStat {
    /// OSDs in the map.
    pub total: u32,
    /// OSDs up.
    pub up: u32,
    /// OSDs in.
    pub r#in: u32,
}

/// PG summary from `pg stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgStat {
    /// Total placement groups.
    pub total: u32,
    /// `(count, state)` pairs, in the order reported.
    pub states: Vec<(u32, String)>,
}

/// Parse `... N osds: N up, N in ...`.
///
/// Looks for a count followed by each of the labels `osds`, `up` and `in`,
/// ignoring whatever surrounds them (`osdmap e12:` prefixes, trailing
/// `; N remapped pgs` and so on).
pub fn parse_osd_stat(output: &str) -> Option<OsdStat> {
    let tokens: Vec<&str> = output
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | ';'))
        .filter(|t| !t.is_empty())
        .collect();

    let count_before = |label: &str| {
        tokens
            .windows(2)
            .find(|w| w[1] == label)
            .and_then(|w| w[0].parse::<u32>().ok())
    };

    Some(OsdStat {
        total: count_before("osds")?,
        up: count_before("up")?,
        r#in: count_before("in")?,
    })
}

/// Parse `0 data,1 metadata,2 rbd,` into `(id, name)` pairs.
pub fn parse_pools(output: &str) -> Option<Vec<(u32, String)>> {
    output
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (id, name) = entry.split_once(' ')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((id.parse().ok()?, name.to_string()))
        })
        .collect()
}

/// Parse `vN: T pgs: C state[, C state]; ...`.
///
/// The `vN:` version prefix is optional; newer releases drop it.
pub fn parse_pg_stat(output: &str) -> Option<PgStat> {
    let parts: Vec<&str> = output.trim().split([':', ';']).collect();

    let (index, total) = parts.iter().enumerate().find_map(|(i, part)| {
        match part.split_whitespace().collect::<Vec<_>>().as_slice() {
            [count, "pgs"] => count.parse::<u32>().ok().map(|n| (i, n)),
            _ => None,
        }
    })?;

    let states = parts
        .get(index + 1)?
        .split(',')
        .map(|entry| {
            let mut words = entry.split_whitespace();
            let count = words.next()?.parse::<u32>().ok()?;
            let state = words.next()?.to_string();
            Some((count, state))
        })
        .collect::<Option<Vec<_>>>()?;

    if states.is_empty() {
        return None;
    }

    Some(PgStat { total, states })
}

/// Converged when every OSD in the map is both up and in.
pub fn check_osds_up_and_in(output: &str) -> Verdict {
    if output.trim().is_empty() {
        return Verdict::NotConverged;
    }
    match parse_osd_stat(output) {
        Some(stat) => Verdict::from_bool(stat.total == stat.up && stat.up == stat.r#in),
        None => {
            tracing::warn!("osd stat format may have changed: {:?}", output.trim());
            Verdict::Indeterminate
        }
    }
}

/// Converged when exactly the default pools exist, in default order.
pub fn check_default_pools_only(output: &str) -> Verdict {
    if output.trim().is_empty() {
        return Verdict::NotConverged;
    }
    match parse_pools(output) {
        Some(pools) => Verdict::from_bool(
            pools.len() == DEFAULT_POOLS.len()
                && pools
                    .iter()
                    .zip(DEFAULT_POOLS)
                    .all(|((id, name), (want_id, want_name))| *id == want_id && name == want_name),
        ),
        None => {
            tracing::warn!("osd lspools format may have changed: {:?}", output.trim());
            Verdict::Indeterminate
        }
    }
}

/// Converged when the only reported PG state is `active+clean` and it
/// covers every PG.
pub fn check_pgs_active_and_clean(output: &str) -> Verdict {
    if output.trim().is_empty() {
        return Verdict::NotConverged;
    }
    match parse_pg_stat(output) {
        Some(PgStat { total, states }) => Verdict::from_bool(matches!(
            states.as_slice(),
            [(count, state)] if state == ACTIVE_CLEAN && *count == total
        )),
        None => {
            tracing::warn!("pg stat format may have changed: {:?}", output.trim());
            Verdict::Indeterminate
        }
    }
}

/// Render pools the way `osd lspools` prints them.
pub fn format_pools<'a>(pools: impl IntoIterator<Item = (u32, &'a str)>) -> String {
    pools
        .into_iter()
        .map(|(id, name)| format!("{id} {name},"))
        .collect()
}
