//! Check strings (`path op value`) parsed once at load time and evaluated
//! against the world snapshot every time their step runs

use crate::error::ScenarioError;
use crate::harness::assertions::{check_bool, check_f32, check_u64};
use crate::harness::{AssertionFailure, Comparison};
use crate::sandbox::WorldSnapshot;

/// Property of a labelled body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyField {
    X,
    Y,
    VelocityX,
    VelocityY,
    Grounded,
}

impl BodyField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "x" => Some(BodyField::X),
            "y" => Some(BodyField::Y),
            "velocity_x" => Some(BodyField::VelocityX),
            "velocity_y" => Some(BodyField::VelocityY),
            "grounded" => Some(BodyField::Grounded),
            _ => None,
        }
    }
}

/// What a check reads from the snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `items.count`, `items.<kind>.count`
    Items { kind: Option<String> },
    /// `near(x, y, r).count`, `near(x, y, r).<kind>.count`
    Near {
        x: f32,
        y: f32,
        radius: f32,
        kind: Option<String>,
    },
    /// `<id>.x`, `<id>.grounded`, ...
    Body { id: String, field: BodyField },
    /// `<collector>.collected`, `<collector>.collected.<kind>`
    Collected { id: String, kind: Option<String> },
    /// `signal.<cell>`
    Signal { cell: i32 },
}

/// Expected value, typed by the target it is compared against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected {
    Count(u64),
    Number(f32),
    Flag(bool),
}

/// One parsed check
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    /// Left-hand side as written, for messages
    pub path: String,
    pub target: Target,
    pub op: Comparison,
    pub expected: Expected,
}

/// Split a check into (path, operator, value)
fn split_check(check: &str) -> Option<(&str, &str, &str)> {
    // Longer operators first so `>=` is not read as `>`
    for op in [">=", "<=", "!=", "==", "=", ">", "<"] {
        if let Some(idx) = check.find(op) {
            let path = check[..idx].trim();
            let value = check[idx + op.len()..].trim();
            return Some((path, op, value));
        }
    }
    None
}

fn invalid(check: &str, reason: impl Into<String>) -> ScenarioError {
    ScenarioError::InvalidCheck {
        check: check.to_string(),
        reason: reason.into(),
    }
}

impl Check {
    pub fn parse(check: &str) -> Result<Self, ScenarioError> {
        let (path, op_token, value) = split_check(check)
            .ok_or_else(|| invalid(check, "expected 'path op value', e.g. 'hopper.collected >= 1'"))?;
        if path.is_empty() || value.is_empty() {
            return Err(invalid(check, "missing path or value"));
        }
        let op = Comparison::parse(op_token)
            .ok_or_else(|| invalid(check, format!("unknown operator '{}'", op_token)))?;

        let target = parse_target(check, path)?;
        let expected = parse_expected(check, &target, op, value)?;

        Ok(Self {
            path: path.to_string(),
            target,
            op,
            expected,
        })
    }

    /// Evaluate against a snapshot
    pub fn evaluate(&self, snapshot: &WorldSnapshot) -> Result<(), AssertionFailure> {
        match (&self.target, self.expected) {
            (Target::Items { kind }, Expected::Count(expected)) => {
                let actual = snapshot.items_count(kind.as_deref());
                check_u64(&self.path, actual, self.op, expected)
            }
            (
                Target::Near {
                    x,
                    y,
                    radius,
                    kind,
                },
                Expected::Count(expected),
            ) => {
                let actual = snapshot.items_within(*x, *y, *radius, kind.as_deref());
                check_u64(&self.path, actual, self.op, expected)
            }
            (Target::Signal { cell }, Expected::Count(expected)) => {
                let actual = snapshot.signal_level(*cell) as u64;
                check_u64(&self.path, actual, self.op, expected)
            }
            (Target::Collected { id, kind }, Expected::Count(expected)) => {
                let collector = snapshot.collector(id).ok_or_else(|| {
                    let mut available: Vec<&String> = snapshot.collectors.keys().collect();
                    available.sort();
                    AssertionFailure::mismatch(
                        format!("Collector '{}' not found", id),
                        format!("collector '{}'", id),
                        format!("available: {:?}", available),
                    )
                })?;
                let actual = match kind {
                    Some(kind) => collector.by_kind.get(kind).copied().unwrap_or(0),
                    None => collector.collected,
                };
                check_u64(&self.path, actual as u64, self.op, expected)
            }
            (Target::Body { id, field }, expected) => {
                let body = snapshot.body(id).ok_or_else(|| {
                    let mut available: Vec<&String> = snapshot.bodies.keys().collect();
                    available.sort();
                    AssertionFailure::mismatch(
                        format!("Entity '{}' not found", id),
                        format!("entity '{}'", id),
                        format!("available: {:?}", available),
                    )
                })?;
                match (field, expected) {
                    (BodyField::Grounded, Expected::Flag(flag)) => {
                        check_bool(&self.path, body.grounded, self.op, flag)
                    }
                    (BodyField::X, Expected::Number(value)) => {
                        check_f32(&self.path, body.x, self.op, value)
                    }
                    (BodyField::Y, Expected::Number(value)) => {
                        check_f32(&self.path, body.y, self.op, value)
                    }
                    (BodyField::VelocityX, Expected::Number(value)) => {
                        check_f32(&self.path, body.velocity_x, self.op, value)
                    }
                    (BodyField::VelocityY, Expected::Number(value)) => {
                        check_f32(&self.path, body.velocity_y, self.op, value)
                    }
                    _ => Err(AssertionFailure::new(format!(
                        "Check '{}' compares against the wrong kind of value",
                        self.path
                    ))),
                }
            }
            _ => Err(AssertionFailure::new(format!(
                "Check '{}' compares against the wrong kind of value",
                self.path
            ))),
        }
    }
}

/// Every check must hold; the first one that does not is the failure
pub fn all_hold(checks: &[Check], snapshot: &WorldSnapshot) -> Result<(), AssertionFailure> {
    for check in checks {
        check.evaluate(snapshot)?;
    }
    Ok(())
}

/// Parse a list of check strings, rejecting an empty list
pub fn parse_checks(checks: &[String]) -> Result<Vec<Check>, ScenarioError> {
    if checks.is_empty() {
        return Err(invalid("", "an assertion needs at least one check"));
    }
    checks.iter().map(|check| Check::parse(check)).collect()
}

fn parse_target(check: &str, path: &str) -> Result<Target, ScenarioError> {
    if let Some(rest) = path.strip_prefix("near(") {
        return parse_near(check, rest);
    }

    let parts: Vec<&str> = path.split('.').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(invalid(check, "empty path segment"));
    }

    match parts.as_slice() {
        ["items", "count"] => Ok(Target::Items { kind: None }),
        ["items", kind, "count"] => Ok(Target::Items {
            kind: Some(kind.to_string()),
        }),
        ["signal", cell] => {
            let cell = cell
                .parse()
                .map_err(|_| invalid(check, format!("'{}' is not a cell index", cell)))?;
            Ok(Target::Signal { cell })
        }
        [id, "collected"] => Ok(Target::Collected {
            id: id.to_string(),
            kind: None,
        }),
        [id, "collected", kind] => Ok(Target::Collected {
            id: id.to_string(),
            kind: Some(kind.to_string()),
        }),
        [id, field] => {
            let field = BodyField::parse(field)
                .ok_or_else(|| invalid(check, format!("unknown property '{}'", field)))?;
            Ok(Target::Body {
                id: id.to_string(),
                field,
            })
        }
        _ => Err(invalid(check, format!("unrecognised path '{}'", path))),
    }
}

/// `x, y, r).count` or `x, y, r).<kind>.count`
fn parse_near(check: &str, rest: &str) -> Result<Target, ScenarioError> {
    let (args, tail) = rest
        .split_once(')')
        .ok_or_else(|| invalid(check, "unclosed near("))?;

    let numbers: Vec<f32> = args
        .split(',')
        .map(|arg| arg.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid(check, "near() takes three numbers: x, y, radius"))?;
    let [x, y, radius] = numbers[..] else {
        return Err(invalid(check, "near() takes three numbers: x, y, radius"));
    };

    let kind = match tail.split('.').collect::<Vec<_>>().as_slice() {
        ["", "count"] => None,
        ["", kind, "count"] if !kind.is_empty() => Some(kind.to_string()),
        _ => {
            return Err(invalid(
                check,
                "near(...) must be followed by '.count' or '.<kind>.count'",
            ));
        }
    };

    Ok(Target::Near { x, y, radius, kind })
}

fn parse_expected(
    check: &str,
    target: &Target,
    op: Comparison,
    value: &str,
) -> Result<Expected, ScenarioError> {
    match target {
        Target::Body {
            field: BodyField::Grounded,
            ..
        } => {
            if !matches!(op, Comparison::Eq | Comparison::Ne) {
                return Err(invalid(check, "flags only support = and !="));
            }
            match value {
                "true" => Ok(Expected::Flag(true)),
                "false" => Ok(Expected::Flag(false)),
                _ => Err(invalid(check, format!("expected true or false, got '{}'", value))),
            }
        }
        Target::Body { .. } => value
            .parse()
            .map(Expected::Number)
            .map_err(|_| invalid(check, format!("expected a number, got '{}'", value))),
        _ => value
            .parse()
            .map(Expected::Count)
            .map_err(|_| invalid(check, format!("expected a whole number, got '{}'", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{BodyState, CollectorState, ItemState};
    use std::collections::BTreeMap;

    fn snapshot() -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::default();
        snapshot.items.push(ItemState {
            kind: "apple".to_string(),
            count: 3,
            x: 1.0,
            y: 0.0,
            id: None,
        });
        snapshot.items.push(ItemState {
            kind: "stone".to_string(),
            count: 1,
            x: 8.0,
            y: 0.0,
            id: None,
        });
        snapshot.bodies.insert(
            "ball".to_string(),
            BodyState {
                x: 2.04,
                y: 0.0,
                velocity_x: 0.0,
                velocity_y: 0.0,
                grounded: true,
            },
        );
        snapshot.collectors.insert(
            "hopper".to_string(),
            CollectorState {
                x: 0.0,
                y: 0.0,
                radius: 1.5,
                collected: 2,
                by_kind: BTreeMap::from([("apple".to_string(), 2)]),
            },
        );
        snapshot.signals.insert(4, 11);
        snapshot
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            Check::parse("items.apple.count >= 2").unwrap().target,
            Target::Items {
                kind: Some("apple".to_string())
            }
        );
        assert_eq!(
            Check::parse("near(0, 0, 2.5).count = 3").unwrap().target,
            Target::Near {
                x: 0.0,
                y: 0.0,
                radius: 2.5,
                kind: None
            }
        );
        assert_eq!(
            Check::parse("signal.-2 = 0").unwrap().target,
            Target::Signal { cell: -2 }
        );
        let check = Check::parse("ball.grounded != false").unwrap();
        assert_eq!(check.op, Comparison::Ne);
        assert_eq!(check.expected, Expected::Flag(false));
    }

    #[test]
    fn test_parse_rejects_bad_checks() {
        for bad in [
            "hopper collected 1",
            "ball.spin = 1",
            "signal.left = 3",
            "items.count = many",
            "near(1, 2).count = 1",
            "ball.grounded > true",
            "a.b.c.d = 1",
        ] {
            assert!(
                matches!(Check::parse(bad), Err(ScenarioError::InvalidCheck { .. })),
                "{} should be rejected",
                bad
            );
        }
        assert!(parse_checks(&[]).is_err());
    }

    #[test]
    fn test_evaluate_against_snapshot() {
        let snapshot = snapshot();
        let passing = parse_checks(&[
            "items.count = 4".to_string(),
            "near(0, 0, 2).apple.count == 3".to_string(),
            "ball.x = 2.0".to_string(),
            "ball.grounded = true".to_string(),
            "hopper.collected >= 2".to_string(),
            "hopper.collected.apple = 2".to_string(),
            "hopper.collected.stone = 0".to_string(),
            "signal.4 > 10".to_string(),
            "signal.5 = 0".to_string(),
        ])
        .unwrap();
        assert!(all_hold(&passing, &snapshot).is_ok());
    }

    #[test]
    fn test_first_failing_check_is_reported() {
        let snapshot = snapshot();
        let checks = parse_checks(&[
            "items.count = 4".to_string(),
            "hopper.collected >= 5".to_string(),
            "ball.x = 100".to_string(),
        ])
        .unwrap();
        let failure = all_hold(&checks, &snapshot).unwrap_err();
        assert_eq!(failure.expected.as_deref(), Some("hopper.collected >= 5"));
        assert_eq!(failure.actual.as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_entity_lists_available() {
        let failure = Check::parse("crate.y < 1")
            .unwrap()
            .evaluate(&snapshot())
            .unwrap_err();
        assert!(failure.message.contains("crate"));
        assert!(failure.actual.unwrap().contains("ball"));
    }
}
