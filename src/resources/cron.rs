//! @acp:module "Cron Jobs"
//! @acp:summary "Recognizes cron.NewJob declarations and normalizes their schedules"
//! @acp:domain parser
//! @acp:layer service

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::naming;
use super::usage::{find_usages, package_var_filter, Usage};
use super::{Resource, ResourceContext, ResourceKind, ResourceParser, ResourceSite};
use crate::ast::QualifiedName;
use crate::diag::{ErrorList, Position};
use crate::literals::{decode, FieldKind, FieldSpec};

pub const CRON_PKG: &str = "encore.dev/cron";

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Every interval, in minutes, that evenly divides a day.
const ALLOWED_INTERVALS: &[i64] = &[
    1, 2, 3, 4, 5, 6, 8, 9, 10, 12, 15, 16, 18, 20, 24, 30, 32, 36, 40, 45, 48, 60, 72, 80, 90,
    96, 120, 144, 160, 180, 240, 288, 360, 480, 720, 1440,
];

static CRON_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[0-9A-Za-z]+(-[0-9A-Za-z]+)?)(/\d+)?(,(\*|[0-9A-Za-z]+(-[0-9A-Za-z]+)?)(/\d+)?)*$")
        .unwrap()
});

const MONTHS: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A schedule field: its name, value range and the symbolic names it accepts,
/// counted from the range minimum.
struct CronField {
    what: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

/// Minute, hour, day of month, month, day of week.
const CRON_FIELDS: [CronField; 5] = [
    CronField { what: "minute", min: 0, max: 59, names: &[] },
    CronField { what: "hour", min: 0, max: 23, names: &[] },
    CronField { what: "day of month", min: 1, max: 31, names: &[] },
    CronField { what: "month", min: 1, max: 12, names: MONTHS },
    CronField { what: "day of week", min: 0, max: 6, names: WEEKDAYS },
];

/// @acp:summary "A scheduled invocation of an API endpoint"
#[derive(Debug, Clone, Serialize)]
pub struct CronJob {
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// `every:<minutes>` or `schedule:<cron expression>`
    pub schedule: String,
    pub endpoint: QualifiedName,
    #[serde(flatten)]
    pub site: ResourceSite,
}

const JOB_CONFIG: &[FieldSpec] = &[
    FieldSpec::optional("Title", FieldKind::String),
    FieldSpec::dynamic("Endpoint", true),
    FieldSpec::optional("Every", FieldKind::Int),
    FieldSpec::optional("Schedule", FieldKind::String),
];

pub struct CronJobParser;

impl ResourceParser for CronJobParser {
    fn kind(&self) -> ResourceKind {
        ResourceKind::CronJob
    }

    fn required_imports(&self) -> &'static [&'static str] {
        &[CRON_PKG]
    }

    fn run(&self, cx: &ResourceContext<'_>) -> Vec<Resource> {
        find_usages(cx.errs, cx.pkg, &[(CRON_PKG, "NewJob")], &package_var_filter())
            .iter()
            .filter_map(|u| parse_job(cx, u))
            .map(Resource::CronJob)
            .collect()
    }
}

fn parse_job(cx: &ResourceContext<'_>, u: &Usage<'_>) -> Option<CronJob> {
    let args = u.args(cx.errs, 2)?;
    let name = cx.const_string(u.file, &args[0], "cron job name")?;
    let name_ok = naming::kebab_case(cx.errs, &args[0].pos, "cron job", &name);

    let lit = cx.struct_lit(u.file, &args[1])?;
    let cfg = decode(cx.errs, &lit, JOB_CONFIG)?;

    let endpoint_expr = cfg.expr("Endpoint")?;
    let endpoint = cx.binding_ref(u.file, endpoint_expr);
    if endpoint.is_none() {
        cx.errs.add(
            &endpoint_expr.pos,
            "Endpoint must reference an API endpoint, like svc.Func",
        );
    }

    // An Every of zero is the Go zero value and counts as unset.
    let every = cfg.int("Every").filter(|v| *v != 0);
    let schedule = match (every, cfg.string("Schedule")) {
        (Some(_), Some(_)) => {
            cx.errs.add(&lit.pos, "cron job cannot set both Every and Schedule");
            None
        }
        (Some(secs), None) => {
            let pos = cfg.pos("Every").unwrap_or(&lit.pos);
            every_minutes(cx.errs, pos, secs).map(|m| format!("every:{}", m))
        }
        (None, Some(expr)) => {
            let pos = cfg.pos("Schedule").unwrap_or(&lit.pos);
            check_schedule(cx.errs, pos, expr).then(|| format!("schedule:{}", expr))
        }
        (None, None) => {
            cx.errs.add(&lit.pos, "cron job must set either Every or Schedule");
            None
        }
    };

    if !name_ok {
        return None;
    }
    Some(CronJob {
        title: cfg.string("Title").unwrap_or(&name).to_string(),
        name,
        doc: u.doc.clone(),
        schedule: schedule?,
        endpoint: endpoint?,
        site: ResourceSite::from_usage(cx.pkg, u),
    })
}

/// Validate an `Every` interval in seconds, returning it in minutes.
fn every_minutes(errs: &ErrorList, pos: &Position, secs: i64) -> Option<i64> {
    if secs < 0 || secs % 60 != 0 {
        errs.add(pos, "Every must be a positive integer number of minutes");
        return None;
    }
    let minutes = secs / 60;
    if minutes > MINUTES_PER_DAY {
        errs.add(pos, "Every must not exceed 24 hours");
        return None;
    }
    if MINUTES_PER_DAY % minutes != 0 {
        let (lower, higher) = nearest_intervals(minutes);
        errs.add(
            pos,
            format!(
                "Every of {} minutes does not evenly divide 24 hours; use {} or {} minutes instead",
                minutes, lower, higher
            ),
        );
        return None;
    }
    Some(minutes)
}

/// The allowed intervals directly below and above `minutes`.
fn nearest_intervals(minutes: i64) -> (i64, i64) {
    let idx = ALLOWED_INTERVALS.partition_point(|&m| m < minutes);
    let higher = ALLOWED_INTERVALS[idx.min(ALLOWED_INTERVALS.len() - 1)];
    let lower = ALLOWED_INTERVALS[idx.saturating_sub(1)];
    (lower, higher)
}

fn check_schedule(errs: &ErrorList, pos: &Position, expr: &str) -> bool {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != CRON_FIELDS.len() {
        errs.add(
            pos,
            format!(
                "invalid Schedule {:?}: expected 5 fields, got {}",
                expr,
                fields.len()
            ),
        );
        return false;
    }

    for (field, spec) in fields.iter().zip(&CRON_FIELDS) {
        let numbers = CRON_FIELD
            .is_match(field)
            .then(|| field_numbers(field, spec))
            .flatten();
        let Some(numbers) = numbers else {
            errs.add(pos, format!("invalid Schedule {:?}: bad {} field", expr, spec.what));
            return false;
        };
        let out_of_range = numbers
            .into_iter()
            .any(|(n, is_step)| !is_step && (n < spec.min || n > spec.max));
        if out_of_range {
            errs.add(
                pos,
                format!(
                    "invalid Schedule {:?}: {} must be between {} and {}",
                    expr, spec.what, spec.min, spec.max
                ),
            );
            return false;
        }
    }
    true
}

/// Values in a cron field, each flagged if it is a step value (follows `/`).
/// Symbolic names are mapped to their number; `None` if a name is unknown.
fn field_numbers(field: &str, spec: &CronField) -> Option<Vec<(u32, bool)>> {
    let mut out = Vec::new();
    let mut rest = field;
    let mut after_slash = false;
    while !rest.is_empty() {
        let len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        if len == 0 {
            after_slash = rest.starts_with('/');
            rest = &rest[1..];
            continue;
        }
        let token = &rest[..len];
        let value = match token.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                let idx = spec
                    .names
                    .iter()
                    .position(|name| name.eq_ignore_ascii_case(token))?;
                spec.min + idx as u32
            }
        };
        out.push((value, after_slash));
        rest = &rest[len..];
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::parse_one;
    use super::*;

    fn jobs(config: &str) -> (Vec<CronJob>, Vec<String>) {
        let src = format!(
            "package svc\n\nimport \"encore.dev/cron\"\n\nvar _ = cron.NewJob(\"cleanup\", cron.JobConfig{{\n    Endpoint: Cleanup,\n{}\n}})\n",
            config
        );
        let (resources, msgs) = parse_one(&src);
        let found = resources
            .into_iter()
            .filter_map(|r| match r {
                Resource::CronJob(j) => Some(j),
                _ => None,
            })
            .collect();
        (found, msgs)
    }

    #[test]
    fn test_every_is_normalized_to_minutes() {
        let (found, msgs) = jobs("    Title: \"Clean up\",\n    Every: 2 * cron.Hour,");
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found[0].schedule, "every:120");
        assert_eq!(found[0].title, "Clean up");
        assert_eq!(found[0].endpoint, QualifiedName::new("app/svc", "Cleanup"));

        let (found, msgs) = jobs("    Every: 24 * cron.Hour,");
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found[0].schedule, "every:1440");
        assert_eq!(found[0].title, "cleanup");
    }

    #[test]
    fn test_every_must_divide_a_day() {
        let (found, msgs) = jobs("    Every: 7 * cron.Minute,");
        assert!(found.is_empty());
        assert_eq!(
            msgs,
            vec!["Every of 7 minutes does not evenly divide 24 hours; use 6 or 8 minutes instead"]
        );

        let (_, msgs) = jobs("    Every: 90,");
        assert_eq!(msgs, vec!["Every must be a positive integer number of minutes"]);

        let (_, msgs) = jobs("    Every: 48 * cron.Hour,");
        assert_eq!(msgs, vec!["Every must not exceed 24 hours"]);
    }

    #[test]
    fn test_every_and_schedule_are_exclusive() {
        let (found, msgs) = jobs("    Every: cron.Hour,\n    Schedule: \"0 * * * *\",");
        assert!(found.is_empty());
        assert_eq!(msgs, vec!["cron job cannot set both Every and Schedule"]);

        let (found, msgs) = jobs("    Every: 0,");
        assert!(found.is_empty());
        assert_eq!(msgs, vec!["cron job must set either Every or Schedule"]);
    }

    #[test]
    fn test_schedule_expressions() {
        let (found, msgs) = jobs("    Schedule: \"*/15 9-17 * * 1,2,3\",");
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found[0].schedule, "schedule:*/15 9-17 * * 1,2,3");

        let (_, msgs) = jobs("    Schedule: \"0 0 * *\",");
        assert_eq!(msgs, vec!["invalid Schedule \"0 0 * *\": expected 5 fields, got 4"]);

        let (_, msgs) = jobs("    Schedule: \"0 25 * * *\",");
        assert_eq!(
            msgs,
            vec!["invalid Schedule \"0 25 * * *\": hour must be between 0 and 23"]
        );

        let (_, msgs) = jobs("    Schedule: \"x * * * *\",");
        assert_eq!(msgs, vec!["invalid Schedule \"x * * * *\": bad minute field"]);
    }

    #[test]
    fn test_field_numbers() {
        let [minute, _, _, month, weekday] = &CRON_FIELDS;
        assert_eq!(field_numbers("*/15", minute), Some(vec![(15, true)]));
        assert_eq!(
            field_numbers("1-5,10", minute),
            Some(vec![(1, false), (5, false), (10, false)])
        );
        assert_eq!(field_numbers("jan,DEC", month), Some(vec![(1, false), (12, false)]));
        assert_eq!(field_numbers("MON-FRI", weekday), Some(vec![(1, false), (5, false)]));
        assert_eq!(field_numbers("MON", minute), None);
    }

    #[test]
    fn test_schedule_accepts_month_and_weekday_names() {
        let (found, msgs) = jobs("    Schedule: \"0 9 * JAN-MAR MON-FRI\",");
        assert!(msgs.is_empty(), "{:?}", msgs);
        assert_eq!(found[0].schedule, "schedule:0 9 * JAN-MAR MON-FRI");

        let (_, msgs) = jobs("    Schedule: \"0 9 * * FOO\",");
        assert_eq!(
            msgs,
            vec!["invalid Schedule \"0 9 * * FOO\": bad day of week field"]
        );
    }

    #[test]
    fn test_nearest_intervals() {
        assert_eq!(nearest_intervals(7), (6, 8));
        assert_eq!(nearest_intervals(100), (96, 120));
        assert_eq!(nearest_intervals(1000), (720, 1440));
    }

    #[test]
    fn test_endpoint_must_be_a_reference() {
        let src = "package svc\n\nimport \"encore.dev/cron\"\n\nvar _ = cron.NewJob(\"j\", cron.JobConfig{Endpoint: 42, Every: cron.Hour})\n";
        let (resources, msgs) = parse_one(src);
        assert!(resources.is_empty());
        assert_eq!(msgs, vec!["Endpoint must reference an API endpoint, like svc.Func"]);
    }
}
