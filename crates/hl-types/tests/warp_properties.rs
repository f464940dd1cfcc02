use hl_types::*;
use proptest::prelude::*;

fn nominal_ab() -> ParameterDefinition {
    ParameterDefinition::nominal(["A", "B"]).unwrap()
}

#[test]
fn nominal_membership() {
    let def = nominal_ab();
    assert!(def.is_in_domain(&"A".into()));
    assert!(!def.is_in_domain(&"C".into()));
}

fn continuous_definition() -> impl Strategy<Value = ParameterDefinition> {
    prop_oneof![
        (-1e3f64..1e3, 1e-3f64..1e3)
            .prop_map(|(lower, width)| ParameterDefinition::min_max(lower, lower + width).unwrap()),
        (-10f64..10.0, 1e-2f64..10.0, any::<bool>()).prop_map(|(border, width, upward)| {
            let asymptote = if upward { border + width } else { border - width };
            ParameterDefinition::asymptotic(border, asymptote).unwrap()
        }),
    ]
}

/// A continuous definition together with a point inside its domain and the
/// magnitude the round-trip error is measured against.
fn continuous_point() -> impl Strategy<Value = (ParameterDefinition, f64, f64)> {
    prop_oneof![
        (-1e3f64..1e3, 1e-3f64..1e3, 0.0f64..=1.0).prop_map(|(lower, width, t)| {
            let def = ParameterDefinition::min_max(lower, lower + width).unwrap();
            let x = (lower + t * width).clamp(lower, lower + width);
            (def, x, lower.abs() + width)
        }),
        // Points closer than 1% of the width to the asymptote lose precision.
        (-10f64..10.0, 1e-2f64..10.0, any::<bool>(), 0.01f64..=1.0).prop_map(
            |(border, width, upward, t)| {
                let asymptote = if upward { border + width } else { border - width };
                let def = ParameterDefinition::asymptotic(border, asymptote).unwrap();
                let x = (asymptote + t * (border - asymptote))
                    .clamp(border.min(asymptote), border.max(asymptote));
                (def, x, border.abs() + width)
            }
        ),
    ]
}

proptest! {
    #[test]
    fn continuous_value_round_trip((def, x, scale) in continuous_point()) {
        prop_assert!(def.is_in_domain(&x.into()), "{x} outside {def:?}");
        let back = def.warp_out(def.warp_in(&x.into()).unwrap());
        let back = back.as_f64().unwrap();
        prop_assert!((back - x).abs() <= 1e-9 * (1.0 + scale), "{x} -> {back} in {def:?}");
    }


    #[test]
    fn continuous_warp_out_stays_in_domain(def in continuous_definition(), u in -0.5f64..1.5) {
        let value = def.warp_out(u);
        prop_assert!(def.is_in_domain(&value), "{value} outside {def:?}");
    }

    #[test]
    fn continuous_warp_round_trip(def in continuous_definition(), u in 0.0f64..0.99) {
        let back = def.warp_in(&def.warp_out(u)).unwrap();
        prop_assert!((back - u).abs() < 1e-6, "{u} -> {back}");
    }

    #[test]
    fn warp_in_stays_in_unit_interval(def in continuous_definition(), x in -1e4f64..1e4) {
        let u = def.warp_in(&x.into()).unwrap();
        prop_assert!((0.0..=1.0).contains(&u));
    }

    #[test]
    fn numeric_distance_is_symmetric(def in continuous_definition(), a in 0.0f64..1.0, b in 0.0f64..1.0) {
        let x = def.warp_out(a);
        let y = def.warp_out(b);
        let forward = def.distance(&x, &y).unwrap();
        let backward = def.distance(&y, &x).unwrap();
        prop_assert!(forward >= 0.0);
        prop_assert!((forward - backward).abs() < 1e-12);
        prop_assert_eq!(def.distance(&x, &x).unwrap(), 0.0);
    }

    #[test]
    fn discrete_warp_out_returns_listed_values(count in 1usize..12, u in -1.0f64..2.0) {
        let values: Vec<String> = (0..count).map(|i| format!("v{i}")).collect();
        for def in [
            ParameterDefinition::nominal(values.clone()).unwrap(),
            ParameterDefinition::ordinal(values.clone()).unwrap(),
            ParameterDefinition::equidistant_position(values.clone()).unwrap(),
        ] {
            let value = def.warp_out(u);
            prop_assert!(def.is_in_domain(&value));
            let lattice = def.warp_in(&value).unwrap();
            prop_assert_eq!(def.warp_out(lattice), value);
        }
    }

    #[test]
    fn ordinal_distance_is_symmetric(count in 2usize..10, i in 0usize..10, j in 0usize..10) {
        let def = ParameterDefinition::ordinal(0..count as i32).unwrap();
        let a = ParameterValue::from((i % count) as i32);
        let b = ParameterValue::from((j % count) as i32);
        let d = def.distance(&a, &b).unwrap();
        prop_assert!((0.0..1.0).contains(&d));
        prop_assert_eq!(d, def.distance(&b, &a).unwrap());
        prop_assert_eq!(d == 0.0, a == b);
    }
}
