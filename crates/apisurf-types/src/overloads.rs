//! Constructor overloads implied by defaulted parameters.

use crate::item::{CallableData, DefaultValue};

/// The overloads a constructor with defaulted parameters implies.
///
/// The k-th overload drops the last k defaulted parameters, keeping every
/// parameter without a default. Remaining parameters lose their defaults,
/// since a caller of the overload always passes them. Returns an empty list
/// when no parameter has a default.
pub fn constructor_overloads(data: &CallableData) -> Vec<CallableData> {
    let defaulted: Vec<usize> = data
        .parameters
        .iter()
        .enumerate()
        .filter(|(_, p)| p.default.is_present())
        .map(|(i, _)| i)
        .collect();

    (1..=defaulted.len())
        .map(|dropped| {
            let cut = &defaulted[defaulted.len() - dropped..];
            let parameters = data
                .parameters
                .iter()
                .enumerate()
                .filter(|(i, _)| !cut.contains(i))
                .map(|(_, p)| {
                    let mut p = p.clone();
                    p.default = DefaultValue::Absent;
                    p
                })
                .collect();
            CallableData {
                parameters,
                ..data.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parameter, TypeRef};

    fn param(ty: &str, name: &str, default: DefaultValue) -> Parameter {
        Parameter::new(TypeRef::new(ty)).named(name).with_default(default)
    }

    fn shapes(overloads: &[CallableData]) -> Vec<Vec<String>> {
        overloads
            .iter()
            .map(|o| o.parameters.iter().filter_map(|p| p.name.clone()).collect())
            .collect()
    }

    #[test]
    fn drops_trailing_defaults_one_at_a_time() {
        let data = CallableData::constructor(vec![
            param("int", "a", DefaultValue::Absent),
            param("int", "b", DefaultValue::expression("1")),
            param("java.lang.String", "c", DefaultValue::Unknown),
        ]);
        let overloads = constructor_overloads(&data);
        assert_eq!(shapes(&overloads), vec![vec!["a", "b"], vec!["a"]]);
        assert!(overloads
            .iter()
            .flat_map(|o| &o.parameters)
            .all(|p| !p.default.is_present()));
    }

    #[test]
    fn defaults_in_the_middle_are_dropped_before_required_tail() {
        let data = CallableData::constructor(vec![
            param("int", "a", DefaultValue::expression("0")),
            param("int", "b", DefaultValue::Absent),
        ]);
        assert_eq!(shapes(&constructor_overloads(&data)), vec![vec!["b"]]);
    }

    #[test]
    fn nothing_without_defaults() {
        let data = CallableData::constructor(vec![param("int", "a", DefaultValue::Absent)]);
        assert!(constructor_overloads(&data).is_empty());
    }
}
