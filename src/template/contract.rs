//! Parameter contract enforcement between declared and supplied parameters

use std::collections::HashSet;

use super::types::{Bindings, InvalidArgumentsReason, ParameterSet, ParameterValue};

/// Decide whether the supplied parameters satisfy the declared contract.
///
/// Checks run in a fixed order and the first failure wins: duplicate
/// names, then missing required parameters, then undeclared parameters.
pub fn check(
    declared: &ParameterSet,
    supplied: &[ParameterValue],
) -> Result<Bindings, InvalidArgumentsReason> {
    let mut supplied_names = HashSet::with_capacity(supplied.len());
    for parameter in supplied {
        if !supplied_names.insert(parameter.name.as_str()) {
            return Err(InvalidArgumentsReason::Duplicate);
        }
    }

    let missing_required = declared
        .iter()
        .filter(|p| p.required)
        .any(|p| !supplied_names.contains(p.name.as_str()));
    if missing_required {
        return Err(InvalidArgumentsReason::MissingRequiredParameters);
    }

    if supplied_names.iter().any(|name| !declared.contains(name)) {
        return Err(InvalidArgumentsReason::ExtraParameters);
    }

    Ok(supplied
        .iter()
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ParameterSpec;

    fn declared() -> ParameterSet {
        vec![
            ParameterSpec::required("param1"),
            ParameterSpec::required("param2"),
            ParameterSpec::optional("param3"),
        ]
        .into()
    }

    fn supplied(names: &[&str]) -> Vec<ParameterValue> {
        names
            .iter()
            .map(|name| ParameterValue::new(*name, format!("{}-value", name)))
            .collect()
    }

    #[test]
    fn test_duplicate() {
        assert_eq!(
            check(&declared(), &supplied(&["param1", "param2", "param2"])),
            Err(InvalidArgumentsReason::Duplicate)
        );
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            check(&declared(), &supplied(&["param1"])),
            Err(InvalidArgumentsReason::MissingRequiredParameters)
        );
    }

    #[test]
    fn test_extra_parameters() {
        assert_eq!(
            check(&declared(), &supplied(&["param1", "param2", "param3", "param4"])),
            Err(InvalidArgumentsReason::ExtraParameters)
        );
    }

    #[test]
    fn test_duplicate_wins_over_missing() {
        assert_eq!(
            check(&declared(), &supplied(&["param3", "param3"])),
            Err(InvalidArgumentsReason::Duplicate)
        );
    }

    #[test]
    fn test_missing_wins_over_extra() {
        assert_eq!(
            check(&declared(), &supplied(&["param1", "param9"])),
            Err(InvalidArgumentsReason::MissingRequiredParameters)
        );
    }

    #[test]
    fn test_required_only_is_admissible() {
        let bindings = check(&declared(), &supplied(&["param2", "param1"])).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings["param1"], "param1-value");
    }

    #[test]
    fn test_empty_contract() {
        assert!(check(&ParameterSet::new(), &[]).unwrap().is_empty());
        assert_eq!(
            check(&ParameterSet::new(), &supplied(&["anything"])),
            Err(InvalidArgumentsReason::ExtraParameters)
        );
    }
}
