//! Parameter definitions and the parameter space of an experiment.
//!
//! Every definition maps its domain onto the unit interval (`warp_in`) and
//! back (`warp_out`), so search strategies can work in a uniform `[0, 1]`
//! hypercube regardless of the parameter kind.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::errors::{HlResult, ParameterError};
use crate::{config_error, invalid_candidate};

/// A concrete parameter value, either proposed by a strategy or reported by a
/// worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Float(f64),
    Text(String),
    Bool(bool),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A point in parameter space: one value per parameter name.
pub type ParameterPoint = HashMap<String, ParameterValue>;

/// Domain, normalization and distance for a single named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDefinition {
    /// Unordered categories. Distance is 0 for equal values, 1 otherwise.
    Nominal { values: Vec<ParameterValue> },
    /// Categories ordered by their position in `values`.
    Ordinal { values: Vec<ParameterValue> },
    /// Continuous range `[lower_bound, upper_bound]`, warped linearly.
    MinMaxNumeric { lower_bound: f64, upper_bound: f64 },
    /// Continuous range between a fixed `border` (warped to 0) and an
    /// `asymptotic_border` (warped to 1). Each factor of ten closer to the
    /// asymptote halves the remaining distance to 1 in warped space.
    Asymptotic { border: f64, asymptotic_border: f64 },
    /// Discrete values placed at explicit, strictly increasing positions.
    Position {
        values: Vec<ParameterValue>,
        positions: Vec<f64>,
    },
}

impl ParameterDefinition {
    pub fn nominal<V: Into<ParameterValue>>(
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, ParameterError> {
        let definition = Self::Nominal {
            values: values.into_iter().map(Into::into).collect(),
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn ordinal<V: Into<ParameterValue>>(
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, ParameterError> {
        let definition = Self::Ordinal {
            values: values.into_iter().map(Into::into).collect(),
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn min_max(lower_bound: f64, upper_bound: f64) -> Result<Self, ParameterError> {
        let definition = Self::MinMaxNumeric {
            lower_bound,
            upper_bound,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// A learning rate in `(0, 1]` is `asymptotic(1.0, 0.0)`; a decay factor
    /// close to 1 is `asymptotic(0.0, 1.0)`.
    pub fn asymptotic(border: f64, asymptotic_border: f64) -> Result<Self, ParameterError> {
        let definition = Self::Asymptotic {
            border,
            asymptotic_border,
        };
        definition.validate()?;
        Ok(definition)
    }

    pub fn position<V: Into<ParameterValue>>(
        values: impl IntoIterator<Item = V>,
        positions: Vec<f64>,
    ) -> Result<Self, ParameterError> {
        let definition = Self::Position {
            values: values.into_iter().map(Into::into).collect(),
            positions,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Numeric values that act as their own positions.
    pub fn fixed_value(values: Vec<f64>) -> Result<Self, ParameterError> {
        let positions = values.clone();
        Self::position(values, positions)
    }

    /// Values spread evenly over `[0, 1]` in the given order.
    pub fn equidistant_position<V: Into<ParameterValue>>(
        values: Vec<V>,
    ) -> Result<Self, ParameterError> {
        let count = values.len();
        let positions = (0..count)
            .map(|i| {
                if count > 1 {
                    i as f64 / (count - 1) as f64
                } else {
                    0.0
                }
            })
            .collect();
        Self::position(values, positions)
    }

    /// Check the structural invariants of the definition. Called by every
    /// constructor and again after deserialization.
    pub fn validate(&self) -> Result<(), ParameterError> {
        match self {
            Self::Nominal { values } | Self::Ordinal { values } => {
                if values.is_empty() {
                    return Err(ParameterError::EmptyValues);
                }
                check_distinct(values)?;
            }
            Self::MinMaxNumeric {
                lower_bound,
                upper_bound,
            } => {
                if !lower_bound.is_finite() || !upper_bound.is_finite() {
                    return Err(ParameterError::NonFiniteBounds {
                        lower: *lower_bound,
                        upper: *upper_bound,
                    });
                }
                if lower_bound >= upper_bound {
                    return Err(ParameterError::UnorderedBounds {
                        lower: *lower_bound,
                        upper: *upper_bound,
                    });
                }
            }
            Self::Asymptotic {
                border,
                asymptotic_border,
            } => {
                if !border.is_finite() || !asymptotic_border.is_finite() {
                    return Err(ParameterError::NonFiniteBounds {
                        lower: *border,
                        upper: *asymptotic_border,
                    });
                }
                if border == asymptotic_border {
                    return Err(ParameterError::UnorderedBounds {
                        lower: *border,
                        upper: *asymptotic_border,
                    });
                }
            }
            Self::Position { values, positions } => {
                if values.is_empty() {
                    return Err(ParameterError::EmptyValues);
                }
                check_distinct(values)?;
                if values.len() != positions.len() {
                    return Err(ParameterError::PositionCountMismatch {
                        values: values.len(),
                        positions: positions.len(),
                    });
                }
                let increasing = positions.windows(2).all(|w| w[0] < w[1]);
                if !increasing || positions.iter().any(|p| !p.is_finite()) {
                    return Err(ParameterError::UnorderedPositions);
                }
            }
        }
        Ok(())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nominal { .. } => "nominal",
            Self::Ordinal { .. } => "ordinal",
            Self::MinMaxNumeric { .. } => "min_max_numeric",
            Self::Asymptotic { .. } => "asymptotic",
            Self::Position { .. } => "position",
        }
    }

    /// The explicit value list of a discrete definition.
    pub fn values(&self) -> Option<&[ParameterValue]> {
        match self {
            Self::Nominal { values } | Self::Ordinal { values } | Self::Position { values, .. } => {
                Some(values)
            }
            Self::MinMaxNumeric { .. } | Self::Asymptotic { .. } => None,
        }
    }

    /// Whether strategies should sample this parameter by choosing among its
    /// listed values rather than by warping out a uniform draw.
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Nominal { .. } | Self::Ordinal { .. })
    }

    pub fn is_in_domain(&self, value: &ParameterValue) -> bool {
        match self {
            Self::Nominal { values } | Self::Ordinal { values } | Self::Position { values, .. } => {
                values.contains(value)
            }
            Self::MinMaxNumeric {
                lower_bound,
                upper_bound,
            } => value
                .as_f64()
                .is_some_and(|v| *lower_bound <= v && v <= *upper_bound),
            Self::Asymptotic {
                border,
                asymptotic_border,
            } => value
                .as_f64()
                .is_some_and(|v| border.min(*asymptotic_border) <= v && v <= border.max(*asymptotic_border)),
        }
    }

    /// Map a value into `[0, 1]`. Numeric values outside the bounds are
    /// clamped to the nearest bound.
    pub fn warp_in(&self, value: &ParameterValue) -> Result<f64, ParameterError> {
        match self {
            Self::Nominal { values } | Self::Ordinal { values } => {
                let index = index_of(values, value)?;
                Ok((index as f64 + 0.5) / values.len() as f64)
            }
            Self::MinMaxNumeric {
                lower_bound,
                upper_bound,
            } => {
                let v = self.numeric(value)?.clamp(*lower_bound, *upper_bound);
                Ok((v - lower_bound) / (upper_bound - lower_bound))
            }
            Self::Asymptotic {
                border,
                asymptotic_border,
            } => {
                let v = self
                    .numeric(value)?
                    .clamp(border.min(*asymptotic_border), border.max(*asymptotic_border));
                let ratio = (v - asymptotic_border).abs() / (border - asymptotic_border).abs();
                if ratio >= 1.0 {
                    Ok(0.0)
                } else if ratio <= 0.0 {
                    Ok(1.0)
                } else {
                    Ok((1.0 - ratio.log10().exp2()).clamp(0.0, 1.0))
                }
            }
            Self::Position { values, positions } => {
                let position = positions[index_of(values, value)?];
                Ok(normalize_position(positions, position))
            }
        }
    }

    /// Map a point of `[0, 1]` back to a domain value. Inputs outside the
    /// unit interval are clamped first.
    pub fn warp_out(&self, warped: f64) -> ParameterValue {
        let u = if warped.is_nan() {
            0.0
        } else {
            warped.clamp(0.0, 1.0)
        };

        match self {
            Self::Nominal { values } | Self::Ordinal { values } => {
                let index = ((u * values.len() as f64).floor() as usize).min(values.len() - 1);
                values[index].clone()
            }
            Self::MinMaxNumeric {
                lower_bound,
                upper_bound,
            } => ParameterValue::Float(
                (u * (upper_bound - lower_bound) + lower_bound).clamp(*lower_bound, *upper_bound),
            ),
            Self::Asymptotic {
                border,
                asymptotic_border,
            } => {
                if u >= 1.0 {
                    return ParameterValue::Float(*asymptotic_border);
                }
                if u <= 0.0 {
                    return ParameterValue::Float(*border);
                }
                let ratio = 10f64.powf((1.0 - u).log2());
                let value = asymptotic_border + ratio * (border - asymptotic_border);
                ParameterValue::Float(
                    value.clamp(border.min(*asymptotic_border), border.max(*asymptotic_border)),
                )
            }
            Self::Position { values, positions } => {
                let first = positions[0];
                let last = positions[positions.len() - 1];
                let target = first + u * (last - first);
                let nearest = positions
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                values[nearest].clone()
            }
        }
    }

    /// Symmetric, non-negative distance between two values.
    pub fn distance(&self, a: &ParameterValue, b: &ParameterValue) -> Result<f64, ParameterError> {
        match self {
            Self::Nominal { .. } => Ok(if a == b { 0.0 } else { 1.0 }),
            Self::Ordinal { values } => {
                let diff = index_of(values, a)?.abs_diff(index_of(values, b)?);
                Ok(diff as f64 / values.len() as f64)
            }
            Self::MinMaxNumeric { .. } | Self::Asymptotic { .. } => {
                Ok((self.warp_in(a)? - self.warp_in(b)?).abs())
            }
            Self::Position { values, positions } => {
                let pos_a = positions[index_of(values, a)?];
                let pos_b = positions[index_of(values, b)?];
                Ok((pos_a - pos_b).abs())
            }
        }
    }

    /// Order two values of an ordered definition.
    pub fn compare(&self, a: &ParameterValue, b: &ParameterValue) -> Result<Ordering, ParameterError> {
        match self {
            Self::Nominal { .. } => Err(ParameterError::NotComparable {
                definition: self.type_name(),
            }),
            Self::Ordinal { values } | Self::Position { values, .. } => {
                Ok(index_of(values, a)?.cmp(&index_of(values, b)?))
            }
            Self::MinMaxNumeric { .. } | Self::Asymptotic { .. } => {
                Ok(self.numeric(a)?.total_cmp(&self.numeric(b)?))
            }
        }
    }

    fn numeric(&self, value: &ParameterValue) -> Result<f64, ParameterError> {
        match value.as_f64() {
            Some(v) if !v.is_nan() => Ok(v),
            _ => Err(ParameterError::WrongKind {
                value: value.to_string(),
                definition: self.type_name(),
            }),
        }
    }
}

fn check_distinct(values: &[ParameterValue]) -> Result<(), ParameterError> {
    for (i, value) in values.iter().enumerate() {
        if values[..i].contains(value) {
            return Err(ParameterError::DuplicateValue {
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn index_of(values: &[ParameterValue], value: &ParameterValue) -> Result<usize, ParameterError> {
    values
        .iter()
        .position(|v| v == value)
        .ok_or_else(|| ParameterError::NotInDomain {
            value: value.to_string(),
        })
}

fn normalize_position(positions: &[f64], position: f64) -> f64 {
    let first = positions[0];
    let last = positions[positions.len() - 1];
    if last > first {
        (position - first) / (last - first)
    } else {
        0.0
    }
}

/// The full parameter space of an experiment: named definitions in a stable
/// (sorted) order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    parameters: BTreeMap<String, ParameterDefinition>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a space from untrusted definitions (e.g. deserialized config),
    /// validating each one.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = (String, ParameterDefinition)>,
    ) -> Result<Self, ParameterError> {
        let mut space = Self::new();
        for (name, definition) in definitions {
            definition.validate()?;
            space.parameters.insert(name, definition);
        }
        Ok(space)
    }

    pub fn add(mut self, name: impl Into<String>, definition: ParameterDefinition) -> Self {
        self.parameters.insert(name.into(), definition);
        self
    }

    pub fn add_min_max(
        self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, ParameterError> {
        Ok(self.add(name, ParameterDefinition::min_max(lower_bound, upper_bound)?))
    }

    pub fn add_nominal<V: Into<ParameterValue>>(
        self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, ParameterError> {
        Ok(self.add(name, ParameterDefinition::nominal(values)?))
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDefinition)> {
        self.parameters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.parameters.keys()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Re-check every definition, e.g. after deserialization, which does not
    /// go through the validating constructors.
    pub fn validate(&self) -> HlResult<()> {
        for (name, definition) in &self.parameters {
            definition
                .validate()
                .map_err(|e| config_error!("parameter {name}: {e}"))?;
        }
        Ok(())
    }

    /// Check that `params` names exactly the parameters of this space and that
    /// every value lies in its parameter's domain.
    pub fn check_point(&self, params: &ParameterPoint) -> HlResult<()> {
        if params.len() != self.parameters.len() {
            return Err(invalid_candidate!(
                "expected {} parameters, got {}",
                self.parameters.len(),
                params.len()
            ));
        }
        for (name, value) in params {
            let definition = self
                .parameters
                .get(name)
                .ok_or_else(|| invalid_candidate!("unknown parameter {name}"))?;
            if !definition.is_in_domain(value) {
                return Err(invalid_candidate!(
                    "value {value} of parameter {name} is outside its {} domain",
                    definition.type_name()
                ));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, params: &ParameterPoint) -> bool {
        self.check_point(params).is_ok()
    }

    pub fn warp_point_in(&self, params: &ParameterPoint) -> HlResult<BTreeMap<String, f64>> {
        params
            .iter()
            .map(|(name, value)| -> HlResult<(String, f64)> {
                let definition = self
                    .parameters
                    .get(name)
                    .ok_or_else(|| invalid_candidate!("unknown parameter {name}"))?;
                let warped = definition
                    .warp_in(value)
                    .map_err(|e| invalid_candidate!("parameter {name}: {e}"))?;
                Ok((name.clone(), warped))
            })
            .collect()
    }

    pub fn warp_point_out(&self, warped: &BTreeMap<String, f64>) -> HlResult<ParameterPoint> {
        warped
            .iter()
            .map(|(name, u)| -> HlResult<(String, ParameterValue)> {
                let definition = self
                    .parameters
                    .get(name)
                    .ok_or_else(|| invalid_candidate!("unknown parameter {name}"))?;
                Ok((name.clone(), definition.warp_out(*u)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn float(value: &ParameterValue) -> f64 {
        value.as_f64().unwrap()
    }

    #[test]
    fn nominal_domain_membership() {
        let def = ParameterDefinition::nominal(["A", "B"]).unwrap();
        assert!(def.is_in_domain(&"A".into()));
        assert!(!def.is_in_domain(&"C".into()));
        assert!(!def.is_in_domain(&1.0.into()));
    }

    #[test]
    fn nominal_distance_is_binary() {
        let def = ParameterDefinition::nominal(["A", "B", "C"]).unwrap();
        assert_eq!(def.distance(&"A".into(), &"A".into()).unwrap(), 0.0);
        assert_eq!(def.distance(&"A".into(), &"C".into()).unwrap(), 1.0);
        assert!(def.compare(&"A".into(), &"B".into()).is_err());
    }

    #[test]
    fn empty_value_lists_are_rejected() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(
            ParameterDefinition::nominal(empty.clone()),
            Err(ParameterError::EmptyValues)
        );
        assert_eq!(
            ParameterDefinition::ordinal(empty),
            Err(ParameterError::EmptyValues)
        );
    }

    #[test]
    fn duplicate_values_are_rejected() {
        assert_eq!(
            ParameterDefinition::nominal(["A", "B", "A"]),
            Err(ParameterError::DuplicateValue {
                value: "\"A\"".to_string()
            })
        );
        assert!(matches!(
            ParameterDefinition::ordinal(["lo", "hi", "lo"]),
            Err(ParameterError::DuplicateValue { .. })
        ));
        assert!(matches!(
            ParameterDefinition::position(["a", "b", "a"], vec![0.0, 1.0, 2.0]),
            Err(ParameterError::DuplicateValue { .. })
        ));
        assert!(matches!(
            ParameterDefinition::fixed_value(vec![1.0, 2.0, 2.0]),
            Err(ParameterError::DuplicateValue { .. })
        ));

        let deserialized: ParameterDefinition = serde_json::from_value(serde_json::json!({
            "type": "ordinal",
            "values": [1, 2, 1]
        }))
        .unwrap();
        assert!(matches!(
            deserialized.validate(),
            Err(ParameterError::DuplicateValue { .. })
        ));
    }

    #[test]
    fn ordinal_distance_and_order_follow_index() {
        let def = ParameterDefinition::ordinal(["low", "mid", "high", "max"]).unwrap();
        assert_eq!(def.distance(&"low".into(), &"high".into()).unwrap(), 0.5);
        assert_eq!(
            def.distance(&"high".into(), &"low".into()).unwrap(),
            def.distance(&"low".into(), &"high".into()).unwrap()
        );
        assert_eq!(
            def.compare(&"mid".into(), &"max".into()).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            def.compare(&"mid".into(), &"mid".into()).unwrap(),
            Ordering::Equal
        );
        assert!(matches!(
            def.distance(&"low".into(), &"unknown".into()),
            Err(ParameterError::NotInDomain { .. })
        ));
    }

    #[test]
    fn discrete_warp_round_trips() {
        let def = ParameterDefinition::ordinal([1, 5, 3]).unwrap();
        for value in def.values().unwrap().to_vec() {
            let u = def.warp_in(&value).unwrap();
            assert!((0.0..=1.0).contains(&u));
            assert_eq!(def.warp_out(u), value);
        }
        assert_eq!(def.warp_out(0.0), ParameterValue::Float(1.0));
        assert_eq!(def.warp_out(1.0), ParameterValue::Float(3.0));
    }

    #[test]
    fn min_max_warp() {
        let def = ParameterDefinition::min_max(-2.0, 6.0).unwrap();
        assert_eq!(def.warp_in(&2.0.into()).unwrap(), 0.5);
        assert_eq!(float(&def.warp_out(0.25)), 0.0);
        for x in [-2.0, -1.5, 0.0, 3.3, 6.0] {
            let back = float(&def.warp_out(def.warp_in(&x.into()).unwrap()));
            assert!((back - x).abs() < TOLERANCE, "{x} -> {back}");
        }
        for u in [0.0, 0.1, 0.5, 0.99, 1.0] {
            let back = def.warp_in(&def.warp_out(u)).unwrap();
            assert!((back - u).abs() < TOLERANCE, "{u} -> {back}");
        }
    }

    #[test]
    fn min_max_clamps_instead_of_failing() {
        let def = ParameterDefinition::min_max(0.0, 1.0).unwrap();
        assert!(!def.is_in_domain(&1.5.into()));
        assert_eq!(def.warp_in(&1.5.into()).unwrap(), 1.0);
        assert_eq!(def.warp_in(&(-3.0).into()).unwrap(), 0.0);
        assert_eq!(float(&def.warp_out(7.0)), 1.0);
        assert_eq!(float(&def.warp_out(f64::NAN)), 0.0);
        assert!(matches!(
            def.warp_in(&"x".into()),
            Err(ParameterError::WrongKind { .. })
        ));
    }

    #[test]
    fn min_max_rejects_bad_bounds() {
        assert!(matches!(
            ParameterDefinition::min_max(1.0, 1.0),
            Err(ParameterError::UnorderedBounds { .. })
        ));
        assert!(matches!(
            ParameterDefinition::min_max(0.0, f64::INFINITY),
            Err(ParameterError::NonFiniteBounds { .. })
        ));
    }

    #[test]
    fn asymptotic_halves_per_decade() {
        let def = ParameterDefinition::asymptotic(1.0, 0.0).unwrap();
        assert_eq!(def.warp_in(&1.0.into()).unwrap(), 0.0);
        assert_eq!(def.warp_in(&0.0.into()).unwrap(), 1.0);
        assert!((def.warp_in(&0.1.into()).unwrap() - 0.5).abs() < TOLERANCE);
        assert!((def.warp_in(&0.01.into()).unwrap() - 0.75).abs() < TOLERANCE);
        assert!((float(&def.warp_out(0.5)) - 0.1).abs() < TOLERANCE);
        assert_eq!(float(&def.warp_out(1.0)), 0.0);
        assert_eq!(float(&def.warp_out(0.0)), 1.0);
    }

    #[test]
    fn asymptotic_towards_upper_border() {
        let def = ParameterDefinition::asymptotic(0.0, 1.0).unwrap();
        assert!(def.is_in_domain(&0.999.into()));
        assert!(!def.is_in_domain(&1.2.into()));
        assert!((def.warp_in(&0.9.into()).unwrap() - 0.5).abs() < TOLERANCE);
        for x in [0.0, 0.3, 0.9, 0.99, 1.0] {
            let back = float(&def.warp_out(def.warp_in(&x.into()).unwrap()));
            assert!((back - x).abs() < 1e-7, "{x} -> {back}");
        }
        assert_eq!(def.warp_in(&5.0.into()).unwrap(), 1.0);
    }

    #[test]
    fn position_warp_and_distance() {
        let def = ParameterDefinition::position(["a", "b", "c"], vec![0.0, 1.0, 4.0]).unwrap();
        assert_eq!(def.warp_in(&"b".into()).unwrap(), 0.25);
        assert_eq!(def.warp_out(0.25), "b".into());
        assert_eq!(def.warp_out(0.9), "c".into());
        assert_eq!(def.warp_out(0.1), "a".into());
        assert_eq!(def.distance(&"a".into(), &"c".into()).unwrap(), 4.0);
        assert_eq!(def.distance(&"c".into(), &"b".into()).unwrap(), 3.0);
        assert_eq!(
            def.compare(&"c".into(), &"a".into()).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn position_rejects_malformed_positions() {
        assert_eq!(
            ParameterDefinition::position(["a", "b"], vec![0.0]),
            Err(ParameterError::PositionCountMismatch {
                values: 2,
                positions: 1
            })
        );
        assert_eq!(
            ParameterDefinition::position(["a", "b"], vec![1.0, 0.0]),
            Err(ParameterError::UnorderedPositions)
        );
    }

    #[test]
    fn fixed_value_uses_values_as_positions() {
        let def = ParameterDefinition::fixed_value(vec![1.0, 2.0, 8.0]).unwrap();
        assert!(def.is_in_domain(&2.0.into()));
        assert!(!def.is_in_domain(&3.0.into()));
        assert_eq!(def.distance(&1.0.into(), &8.0.into()).unwrap(), 7.0);
        assert_eq!(def.warp_out(0.6), 8.0.into());
    }

    #[test]
    fn equidistant_positions() {
        let def = ParameterDefinition::equidistant_position(vec!["x", "y", "z"]).unwrap();
        assert_eq!(def.warp_in(&"y".into()).unwrap(), 0.5);
        assert_eq!(def.warp_in(&"z".into()).unwrap(), 1.0);

        let single = ParameterDefinition::equidistant_position(vec!["only"]).unwrap();
        assert_eq!(single.warp_in(&"only".into()).unwrap(), 0.0);
        assert_eq!(single.warp_out(0.7), "only".into());
    }

    #[test]
    fn definition_serde_uses_type_tag() {
        let json = serde_json::json!({
            "type": "min_max_numeric",
            "lower_bound": 0,
            "upper_bound": 10
        });
        let def: ParameterDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def, ParameterDefinition::min_max(0.0, 10.0).unwrap());

        let nominal = ParameterDefinition::nominal(["A", "B"]).unwrap();
        let value = serde_json::to_value(&nominal).unwrap();
        assert_eq!(value["type"], "nominal");
        assert_eq!(value["values"], serde_json::json!(["A", "B"]));
    }

    #[test]
    fn parameter_value_untagged_serde() {
        let values: Vec<ParameterValue> = serde_json::from_str(r#"[3, 0.5, "A", true]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParameterValue::Float(3.0),
                ParameterValue::Float(0.5),
                ParameterValue::Text("A".into()),
                ParameterValue::Bool(true),
            ]
        );
    }

    fn sample_space() -> ParameterSpace {
        ParameterSpace::new()
            .add_min_max("x", 0.0, 1.0)
            .unwrap()
            .add_nominal("name", ["A", "B", "C"])
            .unwrap()
    }

    #[test]
    fn space_checks_names_and_domains() {
        let space = sample_space();

        let mut params = ParameterPoint::new();
        params.insert("x".into(), 0.3.into());
        params.insert("name".into(), "B".into());
        assert!(space.is_valid(&params));

        params.insert("name".into(), "Z".into());
        assert!(!space.is_valid(&params));

        params.insert("name".into(), "A".into());
        params.insert("extra".into(), 1.0.into());
        assert!(space.check_point(&params).is_err());

        params.remove("extra");
        params.remove("x");
        assert!(!space.is_valid(&params));
    }

    #[test]
    fn space_warps_points() {
        let space = sample_space();
        let mut params = ParameterPoint::new();
        params.insert("x".into(), 0.75.into());
        params.insert("name".into(), "C".into());

        let warped = space.warp_point_in(&params).unwrap();
        assert_eq!(warped["x"], 0.75);
        let back = space.warp_point_out(&warped).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn space_validate_catches_deserialized_definitions() {
        let space: ParameterSpace = serde_json::from_value(serde_json::json!({
            "x": {"type": "min_max_numeric", "lower_bound": 0, "upper_bound": 1},
            "layer": {"type": "position", "values": ["a", "b"], "positions": []}
        }))
        .unwrap();
        match space.validate() {
            Err(crate::errors::HlError::Config(message)) => assert!(message.contains("layer")),
            other => panic!("expected config error, got {other:?}"),
        }
        assert!(sample_space().validate().is_ok());
    }

    #[test]
    fn space_from_definitions_validates() {
        let bad = vec![(
            "x".to_string(),
            ParameterDefinition::MinMaxNumeric {
                lower_bound: 2.0,
                upper_bound: 1.0,
            },
        )];
        assert!(ParameterSpace::from_definitions(bad).is_err());
    }
}
